//! CPU watershed kernel
//!
//! Reference implementation of the watershed step using Rayon over grid rows.
//! This backend is always available and is the fallback when no GPU can be
//! initialised. `shaders/watershed.wgsl` implements the same math.
//!
//! # Step
//!
//! For a cell `c` with surface `s = height + water_depth`, the water moved to
//! each lower 4-neighbour `n` is
//!
//! ```text
//! t(c→n) = min(max(s_c − s_n, 0) · flow_rate / 2, water_c / 4)
//! ```
//!
//! Both `t(c→n)` and `t(n→c)` depend only on the two read cells, so every
//! output cell is a pure function of its read neighbourhood. The cap of a
//! quarter of the cell's water per neighbour keeps depths non-negative.

use super::r#trait::{ensure_same_shape, StepKernel};
use crate::error::Result;
use crate::grid::{Grid, TerrainCell};
use crate::settings::{ErosionSettings, WatershedParams};
use crate::surface::normal_at;
use rayon::prelude::*;
use tracing::info;

/// Water moved from `from` to `to` in one step
#[inline]
pub(crate) fn transfer(from: &TerrainCell, to: &TerrainCell, flow_rate: f32) -> f32 {
    let drop = (from.surface() - to.surface()).max(0.0);
    (drop * flow_rate * 0.5).min(from.water_depth * 0.25)
}

/// Next state of cell `(i, j)` computed from the read buffer only
fn step_cell(
    read: &Grid<TerrainCell>,
    i: usize,
    j: usize,
    params: &WatershedParams,
    rain: f32,
    loss: f32,
) -> TerrainCell {
    let (width, length) = read.dimensions();
    let cell = read.get(i, j);

    let mut outflow = 0.0_f32;
    let mut inflow = 0.0_f32;
    let mut visit = |n: &TerrainCell| {
        outflow += transfer(cell, n, params.flow_rate);
        inflow += transfer(n, cell, params.flow_rate);
    };
    if i > 0 {
        visit(read.get(i - 1, j));
    }
    if i + 1 < width {
        visit(read.get(i + 1, j));
    }
    if j > 0 {
        visit(read.get(i, j - 1));
    }
    if j + 1 < length {
        visit(read.get(i, j + 1));
    }

    let water = (cell.water_depth - outflow + inflow + rain - loss).max(0.0);
    let height = cell.height + params.erosion_rate * (inflow - outflow);
    let normal = normal_at(
        |x, z| read.get(x, z).height,
        i,
        j,
        width,
        length,
        params.cell_width,
    );

    TerrainCell {
        height,
        normal: normal.into(),
        water_depth: water,
        debug: inflow - outflow,
    }
}

/// CPU watershed kernel using Rayon for parallelism
#[derive(Debug, Clone)]
pub struct CpuWatershedKernel {
    params: WatershedParams,
}

impl CpuWatershedKernel {
    /// # Errors
    ///
    /// `InvalidSettings` if `params` fail validation
    pub fn new(params: WatershedParams) -> Result<Self> {
        params.validate()?;
        info!(
            cell_width = params.cell_width,
            flow_rate = params.flow_rate,
            erosion_rate = params.erosion_rate,
            "Created CPU watershed kernel"
        );
        Ok(Self { params })
    }

    pub fn params(&self) -> &WatershedParams {
        &self.params
    }
}

impl StepKernel for CpuWatershedKernel {
    fn step(
        &mut self,
        read: &Grid<TerrainCell>,
        write: &mut Grid<TerrainCell>,
        settings: &ErosionSettings,
    ) -> Result<()> {
        ensure_same_shape(read, write)?;

        let width = read.width();
        let rain = settings.rain_per_step();
        let loss = settings.loss_per_step();
        let params = self.params;

        write
            .as_mut_slice()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(j, row)| {
                for (i, out) in row.iter_mut().enumerate() {
                    *out = step_cell(read, i, j, &params, rain, loss);
                }
            });

        Ok(())
    }

    fn name(&self) -> &str {
        "cpu"
    }
}
