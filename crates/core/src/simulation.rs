//! Double-buffered simulation driver
//!
//! `SimState` owns two cell grids and an explicit active slot. Each step hands
//! the active buffer to a [`StepKernel`] as read-only input and the other
//! buffer as output, then makes the output current. The buffers never trade
//! roles mid-step, so every cell of a step sees the same previous state.

use crate::error::{ErosionError, Result};
use crate::grid::{Grid, TerrainCell};
use crate::kernel::StepKernel;
use crate::settings::ErosionSettings;
use std::time::Instant;
use tracing::{debug, info};

/// Which of the two buffers holds the latest state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferSlot {
    #[default]
    A,
    B,
}

impl BufferSlot {
    /// Position in the buffer pair (`A` = 0, `B` = 1)
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// A failed [`SimState::stepped`] call
///
/// Carries the state back unchanged so the caller keeps the last good
/// buffer.
#[derive(Debug, thiserror::Error)]
#[error("simulation step failed: {error}")]
pub struct StepFailure {
    pub state: Box<SimState>,
    #[source]
    pub error: ErosionError,
}

impl StepFailure {
    pub fn into_state(self) -> SimState {
        *self.state
    }
}

/// Ping-pong simulation state
#[derive(Debug, Clone, PartialEq)]
pub struct SimState {
    buffers: [Grid<TerrainCell>; 2],
    active: BufferSlot,
    iterations: u64,
}

fn initial_cells(heights: &Grid<f32>) -> Result<Grid<TerrainCell>> {
    if heights.is_empty() {
        return Err(ErosionError::EmptyGrid);
    }
    Ok(heights.map(|&h| TerrainCell::dry(h)))
}

impl SimState {
    /// Build a fresh simulation from a heightmap
    ///
    /// Both buffers start dry with upward normals; slot `A` is current and
    /// the iteration counter is zero.
    ///
    /// # Errors
    ///
    /// `EmptyGrid` if `initial_heights` has no cells
    pub fn restart(initial_heights: &Grid<f32>) -> Result<Self> {
        let cells = initial_cells(initial_heights)?;
        info!(
            width = cells.width(),
            length = cells.length(),
            "Restarted erosion simulation"
        );
        Ok(Self {
            buffers: [cells.clone(), cells],
            active: BufferSlot::A,
            iterations: 0,
        })
    }

    /// Restart in place, replacing both buffers
    ///
    /// # Errors
    ///
    /// `EmptyGrid` if `heights` has no cells; the state is left untouched
    pub fn reset(&mut self, heights: &Grid<f32>) -> Result<()> {
        *self = Self::restart(heights)?;
        Ok(())
    }

    /// Advance one step
    ///
    /// The active slot flips and the counter increments only if the kernel
    /// succeeds.
    ///
    /// # Errors
    ///
    /// `InvalidSettings` for bad settings, or whatever the kernel returns
    pub fn step(&mut self, settings: &ErosionSettings, kernel: &mut dyn StepKernel) -> Result<()> {
        settings.validate()?;
        self.step_unchecked(settings, kernel)
    }

    fn step_unchecked(
        &mut self,
        settings: &ErosionSettings,
        kernel: &mut dyn StepKernel,
    ) -> Result<()> {
        let [a, b] = &mut self.buffers;
        let (read, write) = match self.active {
            BufferSlot::A => (&*a, b),
            BufferSlot::B => (&*b, a),
        };
        kernel.step(read, write, settings)?;

        self.active = self.active.other();
        self.iterations += 1;
        Ok(())
    }

    /// Run `iterations` steps
    ///
    /// Equivalent to calling [`step`](Self::step) `iterations` times. Stops at
    /// the first failing step, leaving the state after the last success.
    ///
    /// # Errors
    ///
    /// `InvalidSettings` for bad settings, or the first kernel error
    pub fn run_batch(
        &mut self,
        settings: &ErosionSettings,
        iterations: usize,
        kernel: &mut dyn StepKernel,
    ) -> Result<()> {
        if iterations == 0 {
            return Ok(());
        }
        settings.validate()?;

        let start = Instant::now();
        for _ in 0..iterations {
            self.step_unchecked(settings, kernel)?;
        }
        debug!(
            iterations,
            kernel = kernel.name(),
            total = self.iterations,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Ran erosion batch"
        );
        Ok(())
    }

    /// Step by value
    ///
    /// # Errors
    ///
    /// A [`StepFailure`] holding the unchanged state and the cause
    pub fn stepped(
        mut self,
        settings: &ErosionSettings,
        kernel: &mut dyn StepKernel,
    ) -> std::result::Result<Self, StepFailure> {
        match self.step(settings, kernel) {
            Ok(()) => Ok(self),
            Err(error) => Err(StepFailure {
                state: Box::new(self),
                error,
            }),
        }
    }

    /// Buffer holding the latest state
    #[must_use]
    pub fn current(&self) -> &Grid<TerrainCell> {
        &self.buffers[self.active.index()]
    }

    #[must_use]
    pub fn buffer(&self, slot: BufferSlot) -> &Grid<TerrainCell> {
        &self.buffers[slot.index()]
    }

    #[must_use]
    pub fn active_slot(&self) -> BufferSlot {
        self.active
    }

    /// Successful steps since the last restart
    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// `(width, length)` of both buffers
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        self.buffers[0].dimensions()
    }

    #[must_use]
    pub fn into_current(self) -> Grid<TerrainCell> {
        let [a, b] = self.buffers;
        match self.active {
            BufferSlot::A => a,
            BufferSlot::B => b,
        }
    }
}
