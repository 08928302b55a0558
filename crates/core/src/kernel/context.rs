//! Headless wgpu device setup for the erosion kernel
//!
//! Distinguishes a machine without any adapter from an adapter whose device
//! request failed, so callers can fall back silently in the first case and
//! warn in the second.

/// Outcome of [`GpuContext::new`]
#[derive(Debug)]
pub enum GpuInitResult {
    /// Device and queue are ready
    #[cfg(feature = "gpu")]
    Success(GpuContext),
    /// No compatible adapter on this machine
    NoGpuFound,
    /// An adapter exists but refused to hand out a device
    InitFailed {
        adapter_name: String,
        error: String,
    },
}

#[cfg(feature = "gpu")]
mod device {
    use super::GpuInitResult;
    use crate::grid::TerrainCell;
    use tracing::{debug, info};

    /// wgpu device, queue and the adapter they came from
    #[derive(Debug)]
    pub struct GpuContext {
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter_info: wgpu::AdapterInfo,
    }

    async fn find_adapter() -> Option<wgpu::Adapter> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
    }

    async fn open_device(
        adapter: &wgpu::Adapter,
    ) -> Result<(wgpu::Device, wgpu::Queue), wgpu::RequestDeviceError> {
        // Compute only: the default limits cover storage buffers and no
        // optional features are needed
        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("terrain-erosion-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
    }

    /// Whether a `width × length` cell grid fits `limits`
    ///
    /// Checks the storage binding and buffer size of one cell buffer and the
    /// workgroup count of the 8×8 dispatch on each axis.
    pub(crate) fn grid_fits(limits: &wgpu::Limits, width: u32, length: u32) -> bool {
        let bytes =
            u64::from(width) * u64::from(length) * std::mem::size_of::<TerrainCell>() as u64;
        let groups = width.div_ceil(8).max(length.div_ceil(8));

        bytes <= u64::from(limits.max_storage_buffer_binding_size)
            && bytes <= limits.max_buffer_size
            && groups <= limits.max_compute_workgroups_per_dimension
    }

    impl GpuContext {
        /// Probe for an adapter and open a compute device on it
        #[allow(clippy::new_ret_no_self)]
        pub fn new() -> GpuInitResult {
            pollster::block_on(Self::init())
        }

        async fn init() -> GpuInitResult {
            let Some(adapter) = find_adapter().await else {
                debug!("wgpu reported no adapters");
                return GpuInitResult::NoGpuFound;
            };
            let adapter_info = adapter.get_info();
            debug!(adapter = %adapter_info.name, backend = ?adapter_info.backend, "Found adapter");

            match open_device(&adapter).await {
                Ok((device, queue)) => {
                    info!(adapter = %adapter_info.name, "GPU device ready");
                    GpuInitResult::Success(Self {
                        device,
                        queue,
                        adapter_info,
                    })
                }
                Err(e) => GpuInitResult::InitFailed {
                    adapter_name: adapter_info.name,
                    error: e.to_string(),
                },
            }
        }

        #[must_use]
        pub fn adapter_name(&self) -> &str {
            &self.adapter_info.name
        }

        /// Whether a `width × length` cell grid fits the device limits
        #[must_use]
        pub fn can_allocate(&self, width: u32, length: u32) -> bool {
            grid_fits(&self.device.limits(), width, length)
        }

        pub(crate) fn into_parts(self) -> (wgpu::Device, wgpu::Queue, wgpu::AdapterInfo) {
            (self.device, self.queue, self.adapter_info)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_init_result_is_consistent() {
            // The variant depends on the machine
            match GpuContext::new() {
                GpuInitResult::Success(ctx) => assert!(ctx.can_allocate(1, 1)),
                GpuInitResult::NoGpuFound => {}
                GpuInitResult::InitFailed { error, .. } => assert!(!error.is_empty()),
            }
        }

        #[test]
        fn test_grid_fits_default_limits() {
            let limits = wgpu::Limits::default();
            assert!(grid_fits(&limits, 512, 512));
            // 8 * 65535 columns is the widest single-row dispatch
            assert!(grid_fits(&limits, 8 * 65_535, 1));
            assert!(!grid_fits(&limits, 8 * 65_535 + 1, 1));
            assert!(!grid_fits(&limits, 1, 600_000));
            // 4096 * 4096 * 24 bytes exceeds the 128 MiB binding limit
            assert!(!grid_fits(&limits, 4096, 4096));
        }

        #[test]
        fn test_allocation_limits() {
            let GpuInitResult::Success(ctx) = GpuContext::new() else {
                return;
            };
            assert!(ctx.can_allocate(256, 256));
            // 2^32 cells of 24 bytes exceed any binding limit
            assert!(!ctx.can_allocate(1 << 16, 1 << 16));
        }
    }
}

#[cfg(feature = "gpu")]
pub use device::GpuContext;
#[cfg(feature = "gpu")]
pub(crate) use device::grid_fits;
