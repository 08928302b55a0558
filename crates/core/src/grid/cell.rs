use bytemuck::{Pod, Zeroable};
use nalgebra::Vector3;

/// One simulation grid point
///
/// Layout is `#[repr(C)]` and must match the `TerrainCell` struct in
/// `kernel/shaders/watershed.wgsl` (six tightly packed `f32`s, 24 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TerrainCell {
    /// Elevation (normalized heightmap units)
    pub height: f32,
    /// Surface normal, `y` is up
    pub normal: [f32; 3],
    /// Accumulated surface water depth
    pub water_depth: f32,
    /// Scratch diagnostic, the CPU and GPU kernels store net water flux here
    pub debug: f32,
}

impl TerrainCell {
    /// Dry cell at `height` with an upward normal
    #[must_use]
    pub const fn dry(height: f32) -> Self {
        Self {
            height,
            normal: [0.0, 1.0, 0.0],
            water_depth: 0.0,
            debug: 0.0,
        }
    }

    /// Water surface elevation (`height + water_depth`)
    #[inline]
    pub fn surface(&self) -> f32 {
        self.height + self.water_depth
    }

    pub fn normal_vec(&self) -> Vector3<f32> {
        Vector3::from(self.normal)
    }
}
