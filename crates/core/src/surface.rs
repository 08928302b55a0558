//! Derived terrain surfaces: normals, the displayed water surface and
//! water statistics.

use crate::grid::{Grid, TerrainCell};
use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Surface normal at `(i, j)` from central differences of `height`
///
/// One-sided differences are used on the grid edges; a dimension of size 1
/// contributes no slope. `y` is up.
#[inline]
pub(crate) fn normal_at<F>(
    height: F,
    i: usize,
    j: usize,
    width: usize,
    length: usize,
    cell_width: f32,
) -> Vector3<f32>
where
    F: Fn(usize, usize) -> f32,
{
    let i0 = i.saturating_sub(1);
    let i1 = (i + 1).min(width - 1);
    let j0 = j.saturating_sub(1);
    let j1 = (j + 1).min(length - 1);

    let dhdx = if i1 > i0 {
        (height(i1, j) - height(i0, j)) / ((i1 - i0) as f32 * cell_width)
    } else {
        0.0
    };
    let dhdz = if j1 > j0 {
        (height(i, j1) - height(i, j0)) / ((j1 - j0) as f32 * cell_width)
    } else {
        0.0
    };

    Vector3::new(-dhdx, 1.0, -dhdz).normalize()
}

/// Surface normals for a heightmap
///
/// Heights and `cell_width` must share units for the slopes to be meaningful.
pub fn compute_normals(heights: &Grid<f32>, cell_width: f32) -> Grid<Vector3<f32>> {
    let (width, length) = heights.dimensions();
    let h = |i: usize, j: usize| *heights.get(i, j);

    let data: Vec<Vector3<f32>> = (0..heights.len())
        .into_par_iter()
        .map(|idx| normal_at(h, idx % width, idx / width, width, length, cell_width))
        .collect();

    heights.with_data(data)
}

/// Heightmap for a water overlay terrain
///
/// Cells shallower than `min_water_depth_display` sink just below the ground
/// (`max(0.01, height - 0.01)`) so the overlay hides; wet cells sit at
/// `height + water_depth / 10`.
pub fn water_surface(cells: &Grid<TerrainCell>, min_water_depth_display: f32) -> Grid<f32> {
    let data: Vec<f32> = cells
        .as_slice()
        .par_iter()
        .map(|c| {
            if c.water_depth < min_water_depth_display {
                (c.height - 0.01).max(0.01)
            } else {
                c.height + c.water_depth / 10.0
            }
        })
        .collect();

    cells.with_data(data)
}

/// Aggregate water and elevation figures for a cell grid
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WaterStats {
    /// Sum of water depth over all cells
    pub total_water: f64,
    /// Deepest cell
    pub max_depth: f32,
    /// Cells with water at or above the display threshold
    pub wet_cells: usize,
    /// Sum of cell heights (conserved by erosion)
    pub total_height: f64,
}

impl WaterStats {
    pub fn from_cells(cells: &Grid<TerrainCell>, min_water_depth_display: f32) -> Self {
        cells.as_slice().iter().fold(Self::default(), |mut acc, c| {
            acc.total_water += f64::from(c.water_depth);
            acc.total_height += f64::from(c.height);
            acc.max_depth = acc.max_depth.max(c.water_depth);
            if c.water_depth >= min_water_depth_display && c.water_depth > 0.0 {
                acc.wet_cells += 1;
            }
            acc
        })
    }
}
