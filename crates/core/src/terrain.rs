//! Terrain storage and the erosion tool
//!
//! [`TerrainStore`] is the seam to whatever holds the terrain (an engine
//! terrain, a file, memory). [`ErosionTool`] drives shaping, texture painting
//! and the rain simulation against two stores: the ground and a water overlay.

use crate::classifier::{paint_alpha_map, AlphaMap, Thresholds};
use crate::error::{ErosionError, Result};
use crate::grid::Grid;
use crate::kernel::{create_step_kernel, StepKernel};
use crate::settings::{ErosionSettings, ShapingSettings, WatershedParams};
use crate::shaping::shape_in_place;
use crate::simulation::SimState;
use crate::surface::{water_surface, WaterStats};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Heightmap plus texture weights of one terrain
pub trait TerrainStore {
    fn heights(&self) -> &Grid<f32>;

    /// # Errors
    ///
    /// Implementations may reject heightmaps they cannot hold
    fn set_heights(&mut self, heights: Grid<f32>) -> Result<()>;

    fn alpha_weights(&self) -> Option<&AlphaMap>;

    /// # Errors
    ///
    /// `DimensionMismatch` if `weights` differs in shape from the heightmap
    fn set_alpha_weights(&mut self, weights: AlphaMap) -> Result<()>;

    /// World distance between neighbouring height samples
    fn cell_width(&self) -> f32;
}

/// Terrain held in memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InMemoryTerrain {
    heights: Grid<f32>,
    alpha_weights: Option<AlphaMap>,
    cell_width: f32,
}

impl InMemoryTerrain {
    /// Flat terrain at height `fill`
    ///
    /// # Errors
    ///
    /// `EmptyGrid` for a zero dimension, `InvalidSettings` for a non-positive
    /// `cell_width`
    pub fn flat(width: usize, length: usize, fill: f32, cell_width: f32) -> Result<Self> {
        Self::from_heights(Grid::new(width, length, fill)?, cell_width)
    }

    /// # Errors
    ///
    /// `InvalidSettings` for a non-positive `cell_width`
    pub fn from_heights(heights: Grid<f32>, cell_width: f32) -> Result<Self> {
        if !(cell_width.is_finite() && cell_width > 0.0) {
            return Err(ErosionError::invalid(
                "cell_width",
                format!("must be positive and finite, got {cell_width}"),
            ));
        }
        Ok(Self {
            heights,
            alpha_weights: None,
            cell_width,
        })
    }
}

impl TerrainStore for InMemoryTerrain {
    fn heights(&self) -> &Grid<f32> {
        &self.heights
    }

    fn set_heights(&mut self, heights: Grid<f32>) -> Result<()> {
        // Weights painted for another resolution no longer line up
        if !heights.same_shape(&self.heights) {
            self.alpha_weights = None;
        }
        self.heights = heights;
        Ok(())
    }

    fn alpha_weights(&self) -> Option<&AlphaMap> {
        self.alpha_weights.as_ref()
    }

    fn set_alpha_weights(&mut self, weights: AlphaMap) -> Result<()> {
        if !weights.same_shape(&self.heights) {
            return Err(ErosionError::mismatch(
                self.heights.dimensions(),
                weights.dimensions(),
            ));
        }
        self.alpha_weights = Some(weights);
        Ok(())
    }

    fn cell_width(&self) -> f32 {
        self.cell_width
    }
}

/// Everything the tool is configured with
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub erosion: ErosionSettings,
    pub watershed: WatershedParams,
    pub shaping: ShapingSettings,
    pub thresholds: Thresholds,
}

impl ToolConfig {
    /// # Errors
    ///
    /// `InvalidSettings` naming the first bad field
    pub fn validate(&self) -> Result<()> {
        self.erosion.validate()?;
        self.watershed.validate()?;
        self.shaping.validate()
    }
}

/// Shapes terrain, paints textures and runs the rain simulation
pub struct ErosionTool {
    config: ToolConfig,
    kernel: Box<dyn StepKernel>,
    simulation: Option<SimState>,
}

impl std::fmt::Debug for ErosionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErosionTool")
            .field("config", &self.config)
            .field("kernel", &self.kernel.name())
            .field("simulation", &self.simulation.as_ref().map(SimState::iterations))
            .finish()
    }
}

impl ErosionTool {
    /// Tool with the best available kernel
    ///
    /// # Errors
    ///
    /// `InvalidSettings` if `config` fails validation
    pub fn new(config: ToolConfig) -> Result<Self> {
        config.validate()?;
        let kernel = create_step_kernel(config.watershed)?;
        Ok(Self::with_kernel(config, kernel))
    }

    /// Tool with a caller-supplied kernel
    ///
    /// `config.watershed` is not applied to `kernel`.
    pub fn with_kernel(config: ToolConfig, kernel: Box<dyn StepKernel>) -> Self {
        Self {
            config,
            kernel,
            simulation: None,
        }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn kernel_name(&self) -> &str {
        self.kernel.name()
    }

    /// Running simulation, if rain has started
    pub fn simulation(&self) -> Option<&SimState> {
        self.simulation.as_ref()
    }

    /// Shape the heightmap and repaint the texture weights
    ///
    /// # Errors
    ///
    /// `InvalidSettings` for bad shaping settings, or a store error
    pub fn apply<S: TerrainStore + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        let mut heights = store.heights().clone();
        shape_in_place(&mut heights, &self.config.shaping)?;
        let alpha = paint_alpha_map(&heights, &self.config.thresholds);
        store.set_heights(heights)?;
        store.set_alpha_weights(alpha)?;
        info!(
            width = store.heights().width(),
            length = store.heights().length(),
            "Applied terrain shaping"
        );
        Ok(())
    }

    /// Repaint the texture weights from the current heights
    ///
    /// # Errors
    ///
    /// A store error
    pub fn paint<S: TerrainStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        let alpha = paint_alpha_map(store.heights(), &self.config.thresholds);
        store.set_alpha_weights(alpha)
    }

    /// Start the rain simulation over from the store's heights
    ///
    /// # Errors
    ///
    /// `EmptyGrid` if the store has no cells
    pub fn restart_rain<S: TerrainStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        self.simulation = Some(SimState::restart(store.heights())?);
        Ok(())
    }

    /// One rain step
    ///
    /// See [`rain`](Self::rain).
    ///
    /// # Errors
    ///
    /// As for [`rain`](Self::rain)
    pub fn rain_once<S, W>(&mut self, store: &S, water: &mut W) -> Result<WaterStats>
    where
        S: TerrainStore + ?Sized,
        W: TerrainStore + ?Sized,
    {
        self.rain(store, water, 1)
    }

    /// Run `iterations` rain steps and publish the water surface
    ///
    /// Restarts first if no simulation is running or the store's resolution
    /// changed. After the batch, `water` receives the display surface of the
    /// current buffer.
    ///
    /// # Errors
    ///
    /// `InvalidSettings`, kernel failures, or a store error
    pub fn rain<S, W>(&mut self, store: &S, water: &mut W, iterations: usize) -> Result<WaterStats>
    where
        S: TerrainStore + ?Sized,
        W: TerrainStore + ?Sized,
    {
        let dimensions = store.heights().dimensions();
        let stale = match &self.simulation {
            Some(sim) => sim.dimensions() != dimensions,
            None => true,
        };
        if stale {
            debug!(?dimensions, "No matching simulation, restarting rain");
            self.restart_rain(store)?;
        }

        let Some(sim) = self.simulation.as_mut() else {
            return Err(ErosionError::EmptyGrid);
        };
        sim.run_batch(&self.config.erosion, iterations, self.kernel.as_mut())?;

        let min_display = self.config.erosion.min_water_depth_display;
        let current = sim.current();
        water.set_heights(water_surface(current, min_display))?;
        Ok(WaterStats::from_cells(current, min_display))
    }
}
