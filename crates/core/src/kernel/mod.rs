//! Step kernels for the double-buffered simulation
//!
//! This module provides a trait-based abstraction over CPU and GPU step
//! implementations, allowing automatic backend selection based on hardware.
//!
//! # Backends
//!
//! - **CPU**: Always available, Rayon-parallel over grid rows
//! - **GPU**: Uses wgpu compute shaders, requires the `gpu` feature
//!
//! # Usage
//!
//! ```ignore
//! use terrain_erosion_core::kernel::create_step_kernel;
//!
//! let mut kernel = create_step_kernel(WatershedParams::default())?;
//! println!("Using {} backend", kernel.name());
//! ```

mod context;
mod cpu;
#[cfg(feature = "gpu")]
mod gpu;
mod r#trait;

pub use context::GpuInitResult;
#[cfg(feature = "gpu")]
pub use context::GpuContext;
pub use cpu::CpuWatershedKernel;
#[cfg(feature = "gpu")]
pub use gpu::GpuWatershedKernel;
pub use r#trait::{ensure_same_shape, IdentityKernel, StepKernel};

use crate::error::Result;
use crate::settings::WatershedParams;
use tracing::info;
#[cfg(feature = "gpu")]
use tracing::warn;

/// Create the best available watershed kernel
///
/// Tries the GPU first when the `gpu` feature is enabled and falls back to
/// the CPU kernel if no adapter is found or the device fails to initialize.
///
/// # Errors
///
/// `InvalidSettings` if `params` fail validation
pub fn create_step_kernel(params: WatershedParams) -> Result<Box<dyn StepKernel>> {
    params.validate()?;

    #[cfg(feature = "gpu")]
    {
        match GpuContext::new() {
            GpuInitResult::Success(gpu_context) => {
                info!("Using GPU backend: {}", gpu_context.adapter_name());
                return Ok(Box::new(GpuWatershedKernel::new(gpu_context, params)?));
            }
            GpuInitResult::NoGpuFound => {
                info!("No GPU found, using CPU backend");
            }
            GpuInitResult::InitFailed {
                adapter_name,
                error,
            } => {
                warn!(
                    "GPU '{}' found but failed to initialize: {}. Falling back to CPU.",
                    adapter_name, error
                );
            }
        }
    }

    #[cfg(not(feature = "gpu"))]
    info!("GPU feature disabled, using CPU backend");

    Ok(Box::new(CpuWatershedKernel::new(params)?))
}

/// Create the CPU watershed kernel regardless of available hardware
///
/// # Errors
///
/// `InvalidSettings` if `params` fail validation
pub fn create_cpu_kernel(params: WatershedParams) -> Result<Box<dyn StepKernel>> {
    Ok(Box::new(CpuWatershedKernel::new(params)?))
}
