//! GPU watershed kernel using wgpu compute shaders
//!
//! Each step uploads the read buffer, dispatches `shaders/watershed.wgsl` over
//! the grid in 8×8 workgroups and reads the result back into the write
//! buffer. Device buffers are sized for one grid and only recreated when the
//! grid dimensions change.

use super::context::{grid_fits, GpuContext};
use super::r#trait::{ensure_same_shape, StepKernel};
use crate::error::{ErosionError, Result};
use crate::grid::{Grid, TerrainCell};
use crate::settings::{ErosionSettings, WatershedParams};
use bytemuck::{Pod, Zeroable};
use tracing::{debug, info};
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 8;

/// Uniform block matching `Params` in the shader
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct StepUniforms {
    width: u32,
    length: u32,
    cell_width: f32,
    flow_rate: f32,
    erosion_rate: f32,
    rain: f32,
    loss: f32,
    _padding: f32,
}

/// Device buffers for one grid size
struct GridBuffers {
    width: u32,
    length: u32,
    cells_in: wgpu::Buffer,
    cells_out: wgpu::Buffer,
    staging: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GridBuffers {
    fn byte_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.length) * std::mem::size_of::<TerrainCell>() as u64
    }
}

/// GPU watershed kernel
pub struct GpuWatershedKernel {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    limits: wgpu::Limits,
    params: WatershedParams,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    buffers: Option<GridBuffers>,
}

impl std::fmt::Debug for GpuWatershedKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuWatershedKernel")
            .field("adapter_name", &self.adapter_name)
            .field("params", &self.params)
            .field(
                "grid",
                &self.buffers.as_ref().map(|b| (b.width, b.length)),
            )
            .finish_non_exhaustive()
    }
}

impl GpuWatershedKernel {
    /// Build the compute pipeline on an initialized context
    ///
    /// # Errors
    ///
    /// `InvalidSettings` if `params` fail validation
    pub fn new(context: GpuContext, params: WatershedParams) -> Result<Self> {
        params.validate()?;
        let (device, queue, adapter_info) = context.into_parts();
        let limits = device.limits();

        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/watershed.wgsl"));

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Watershed Bind Group Layout"),
            entries: &[
                // params (binding 0)
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // cells_in (binding 1)
                storage_entry(1, true),
                // cells_out (binding 2)
                storage_entry(2, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Watershed Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Watershed Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Watershed Params"),
            contents: bytemuck::bytes_of(&StepUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "Created GPU watershed kernel"
        );

        Ok(Self {
            device,
            queue,
            adapter_name: adapter_info.name,
            limits,
            params,
            pipeline,
            bind_group_layout,
            uniforms,
            buffers: None,
        })
    }

    pub fn params(&self) -> &WatershedParams {
        &self.params
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Make sure device buffers match `width × length`, recreating them if not
    fn ensure_buffers(&mut self, width: u32, length: u32) -> Result<()> {
        if let Some(b) = &self.buffers {
            if b.width == width && b.length == length {
                return Ok(());
            }
        }

        let size = u64::from(width) * u64::from(length) * std::mem::size_of::<TerrainCell>() as u64;
        if !grid_fits(&self.limits, width, length) {
            return Err(ErosionError::Gpu(format!(
                "{width}×{length} grid ({size} bytes) exceeds the device limits: \
                 binding {} bytes, buffer {} bytes, {} workgroups per dimension",
                self.limits.max_storage_buffer_binding_size,
                self.limits.max_buffer_size,
                self.limits.max_compute_workgroups_per_dimension
            )));
        }
        debug!(width, length, bytes = size, "Allocating GPU cell buffers");

        let cells_in = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cells In"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let cells_out = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cells Out"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cells Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Watershed Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: cells_in.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: cells_out.as_entire_binding(),
                },
            ],
        });

        self.buffers = Some(GridBuffers {
            width,
            length,
            cells_in,
            cells_out,
            staging,
            bind_group,
        });
        Ok(())
    }
}

fn gpu_dim(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ErosionError::Gpu(format!("grid dimension {value} exceeds u32")))
}

impl StepKernel for GpuWatershedKernel {
    fn step(
        &mut self,
        read: &Grid<TerrainCell>,
        write: &mut Grid<TerrainCell>,
        settings: &ErosionSettings,
    ) -> Result<()> {
        ensure_same_shape(read, write)?;
        let width = gpu_dim(read.width())?;
        let length = gpu_dim(read.length())?;
        self.ensure_buffers(width, length)?;
        let Some(buffers) = self.buffers.as_ref() else {
            return Err(ErosionError::Gpu("cell buffers not allocated".into()));
        };

        let uniforms = StepUniforms {
            width,
            length,
            cell_width: self.params.cell_width,
            flow_rate: self.params.flow_rate,
            erosion_rate: self.params.erosion_rate,
            rain: settings.rain_per_step(),
            loss: settings.loss_per_step(),
            _padding: 0.0,
        };
        self.queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));
        self.queue
            .write_buffer(&buffers.cells_in, 0, bytemuck::cast_slice(read.as_slice()));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Watershed Step Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Watershed Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &buffers.bind_group, &[]);
            pass.dispatch_workgroups(
                width.div_ceil(WORKGROUP_SIZE),
                length.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        encoder.copy_buffer_to_buffer(
            &buffers.cells_out,
            0,
            &buffers.staging,
            0,
            buffers.byte_size(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        // Map and read
        let buffer_slice = buffers.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| ErosionError::Gpu(format!("readback channel closed: {e}")))?
            .map_err(|e| ErosionError::Gpu(format!("failed to map staging buffer: {e}")))?;

        {
            let data = buffer_slice.get_mapped_range();
            write
                .as_mut_slice()
                .copy_from_slice(bytemuck::cast_slice(&data));
        }
        buffers.staging.unmap();

        Ok(())
    }

    fn name(&self) -> &str {
        "gpu"
    }

    fn is_gpu_accelerated(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{CpuWatershedKernel, GpuInitResult};
    use approx::assert_relative_eq;

    fn gpu_kernel(params: WatershedParams) -> Option<GpuWatershedKernel> {
        match GpuContext::new() {
            GpuInitResult::Success(ctx) => Some(GpuWatershedKernel::new(ctx, params).unwrap()),
            _ => None,
        }
    }

    fn sloped_grid(width: usize, length: usize) -> Grid<TerrainCell> {
        let mut grid = Grid::new(width, length, TerrainCell::dry(0.0)).unwrap();
        for j in 0..length {
            for i in 0..width {
                let c = grid.get_mut(i, j);
                c.height = ((i * 5 + j * 11) % 7) as f32 * 0.05;
                c.water_depth = ((i + 2 * j) % 4) as f32 * 0.02;
            }
        }
        grid
    }

    #[test]
    fn test_uniforms_layout() {
        assert_eq!(std::mem::size_of::<StepUniforms>(), 32);
    }

    #[test]
    fn test_gpu_matches_cpu() {
        let params = WatershedParams {
            cell_width: 0.5,
            flow_rate: 0.5,
            erosion_rate: 0.05,
        };
        let Some(mut gpu) = gpu_kernel(params) else {
            return;
        };
        let mut cpu = CpuWatershedKernel::new(params).unwrap();
        let settings = ErosionSettings::default();

        // Not a multiple of the workgroup size on purpose
        let read = sloped_grid(13, 9);
        let mut gpu_out = read.clone();
        let mut cpu_out = read.clone();
        gpu.step(&read, &mut gpu_out, &settings).unwrap();
        cpu.step(&read, &mut cpu_out, &settings).unwrap();

        for (g, c) in gpu_out.as_slice().iter().zip(cpu_out.as_slice()) {
            assert_relative_eq!(g.height, c.height, epsilon = 1e-5);
            assert_relative_eq!(g.water_depth, c.water_depth, epsilon = 1e-5);
            assert_relative_eq!(g.normal_vec(), c.normal_vec(), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_buffers_follow_grid_size() {
        let Some(mut gpu) = gpu_kernel(WatershedParams::default()) else {
            return;
        };
        let settings = ErosionSettings::default();

        for (w, l) in [(4, 4), (4, 4), (16, 3)] {
            let read = sloped_grid(w, l);
            let mut write = read.clone();
            gpu.step(&read, &mut write, &settings).unwrap();
            let b = gpu.buffers.as_ref().unwrap();
            assert_eq!((b.width as usize, b.length as usize), (w, l));
        }
    }

    #[test]
    fn test_oversized_dispatch_is_rejected() {
        let Some(mut gpu) = gpu_kernel(WatershedParams::default()) else {
            return;
        };
        let settings = ErosionSettings::default();

        // 75000 workgroups along x, past the 65535 per-dimension limit
        let read = Grid::new(600_000, 1, TerrainCell::dry(0.0)).unwrap();
        let mut write = read.clone();
        let err = gpu.step(&read, &mut write, &settings).unwrap_err();
        assert!(matches!(err, ErosionError::Gpu(_)), "{err}");
        assert!(gpu.buffers.is_none());

        // The kernel stays usable after the rejection
        let read = sloped_grid(8, 8);
        let mut write = read.clone();
        gpu.step(&read, &mut write, &settings).unwrap();
    }
}
