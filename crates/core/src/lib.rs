//! Terrain Erosion Core Library
//!
//! Hydraulic erosion for game terrain heightmaps. A double-buffered rain
//! simulation moves water downhill and carries sediment with it; the results
//! feed a water overlay terrain and a five-band texture classifier.
//!
//! ## Overview
//!
//! - [`simulation`]: ping-pong driver owning both cell buffers
//! - [`kernel`]: the per-step math on the CPU (Rayon) or GPU (wgpu)
//! - [`classifier`]: elevation → texture weights with smooth band overlaps
//! - [`shaping`]: noise, contrast and flat-area shaping of heightmaps
//! - [`terrain`]: storage seam and the tool tying everything together
//!
//! ## Example
//!
//! ```ignore
//! use terrain_erosion_core::{ErosionTool, InMemoryTerrain, ToolConfig};
//!
//! let mut ground = InMemoryTerrain::flat(256, 256, 0.5, 1.0)?;
//! let mut water = ground.clone();
//! let mut tool = ErosionTool::new(ToolConfig::default())?;
//! tool.apply(&mut ground)?;
//! let stats = tool.rain(&ground, &mut water, 100)?;
//! ```

pub mod classifier;
pub mod error;
pub mod grid;
pub mod kernel;
pub mod settings;
pub mod shaping;
pub mod simulation;
pub mod surface;
pub mod terrain;

pub use classifier::{normalize_weights, paint_alpha_map, AlphaMap, Thresholds, BAND_COUNT};
pub use error::{ErosionError, Result};
pub use grid::{Grid, TerrainCell};
pub use kernel::{create_step_kernel, CpuWatershedKernel, IdentityKernel, StepKernel};
pub use settings::{ErosionSettings, FlatArea, NoiseLayer, ShapingSettings, WatershedParams};
pub use shaping::{shape_heights, shape_in_place};
pub use simulation::{BufferSlot, SimState, StepFailure};
pub use surface::{compute_normals, water_surface, WaterStats};
pub use terrain::{ErosionTool, InMemoryTerrain, TerrainStore, ToolConfig};
