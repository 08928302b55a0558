//! Step kernel trait definition
//!
//! A `StepKernel` computes one watershed step: it reads every cell of the
//! current buffer and fully overwrites the other one. Both the CPU and GPU
//! kernels implement it, and the simulation driver only ever talks to this
//! trait.

use crate::error::{ErosionError, Result};
use crate::grid::{Grid, TerrainCell};
use crate::settings::ErosionSettings;

/// Backend-agnostic interface for one double-buffered simulation step
pub trait StepKernel: Send {
    /// Compute `write` from `read`
    ///
    /// Every output cell may depend only on `read` (its neighbourhood), never
    /// on other cells of `write`. Implementations must overwrite all of
    /// `write`.
    ///
    /// # Arguments
    ///
    /// * `read` - Buffer holding the latest state
    /// * `write` - Buffer receiving the next state
    /// * `settings` - Rain and water-loss parameters for this run
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the buffers differ in shape, `Gpu` for device failures
    fn step(
        &mut self,
        read: &Grid<TerrainCell>,
        write: &mut Grid<TerrainCell>,
        settings: &ErosionSettings,
    ) -> Result<()>;

    /// Short backend name for logging
    fn name(&self) -> &str;

    /// `true` if the step runs on a GPU
    fn is_gpu_accelerated(&self) -> bool {
        false
    }
}

impl<K: StepKernel + ?Sized> StepKernel for Box<K> {
    fn step(
        &mut self,
        read: &Grid<TerrainCell>,
        write: &mut Grid<TerrainCell>,
        settings: &ErosionSettings,
    ) -> Result<()> {
        (**self).step(read, write, settings)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_gpu_accelerated(&self) -> bool {
        (**self).is_gpu_accelerated()
    }
}

/// Fail with `DimensionMismatch` unless both buffers have the same shape
///
/// # Errors
///
/// `DimensionMismatch` naming `read`'s shape as expected
pub fn ensure_same_shape(read: &Grid<TerrainCell>, write: &Grid<TerrainCell>) -> Result<()> {
    if read.same_shape(write) {
        Ok(())
    } else {
        Err(ErosionError::mismatch(read.dimensions(), write.dimensions()))
    }
}

/// Kernel that copies `read` into `write` unchanged
///
/// Useful for exercising buffer bookkeeping without any physics.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityKernel;

impl StepKernel for IdentityKernel {
    fn step(
        &mut self,
        read: &Grid<TerrainCell>,
        write: &mut Grid<TerrainCell>,
        _settings: &ErosionSettings,
    ) -> Result<()> {
        ensure_same_shape(read, write)?;
        write.as_mut_slice().copy_from_slice(read.as_slice());
        Ok(())
    }

    fn name(&self) -> &str {
        "identity"
    }
}
