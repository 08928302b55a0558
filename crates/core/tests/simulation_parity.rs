//! Double-buffer bookkeeping through the public API
//!
//! Runs the CPU watershed kernel through `SimState` and checks that the
//! current buffer always follows the iteration parity, batches match single
//! steps, and a failing kernel never exposes a half-written buffer.

use approx::assert_relative_eq;
use terrain_erosion_core::{
    BufferSlot, CpuWatershedKernel, ErosionError, ErosionSettings, Grid, SimState, StepKernel,
    TerrainCell, WatershedParams,
};

#[ctor::ctor]
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn bowl(size: usize) -> Grid<f32> {
    let c = (size as f32 - 1.0) / 2.0;
    let mut grid = Grid::new(size, size, 0.0_f32).unwrap();
    for j in 0..size {
        for i in 0..size {
            let dx = (i as f32 - c) / c;
            let dz = (j as f32 - c) / c;
            *grid.get_mut(i, j) = 0.2 + 0.4 * (dx * dx + dz * dz);
        }
    }
    grid
}

fn kernel() -> CpuWatershedKernel {
    CpuWatershedKernel::new(WatershedParams {
        cell_width: 1.0,
        flow_rate: 0.5,
        erosion_rate: 0.02,
    })
    .unwrap()
}

fn rainy() -> ErosionSettings {
    ErosionSettings {
        rain_rate: 0.002,
        step_duration: 1.0,
        water_loss_per_second: 0.0,
        min_water_depth_display: 0.001,
    }
}

/// Kernel that succeeds a fixed number of times, then fails
struct FlakyKernel {
    inner: CpuWatershedKernel,
    remaining: usize,
}

impl StepKernel for FlakyKernel {
    fn step(
        &mut self,
        read: &Grid<TerrainCell>,
        write: &mut Grid<TerrainCell>,
        settings: &ErosionSettings,
    ) -> terrain_erosion_core::Result<()> {
        if self.remaining == 0 {
            write.as_mut_slice().fill(TerrainCell::default());
            return Err(ErosionError::Gpu("simulated device loss".into()));
        }
        self.remaining -= 1;
        self.inner.step(read, write, settings)
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[test]
fn test_parity_after_k_steps() {
    let mut k = kernel();
    for steps in 0..6_u64 {
        let mut state = SimState::restart(&bowl(9)).unwrap();
        for _ in 0..steps {
            state.step(&rainy(), &mut k).unwrap();
        }
        assert_eq!(state.iterations(), steps);
        let expected = if steps % 2 == 0 {
            BufferSlot::A
        } else {
            BufferSlot::B
        };
        assert_eq!(state.active_slot(), expected);
        assert!(std::ptr::eq(state.current(), state.buffer(expected)));
    }
}

#[test]
fn test_batch_equals_repeated_steps() {
    let mut batched = SimState::restart(&bowl(12)).unwrap();
    let mut stepped = batched.clone();

    batched.run_batch(&rainy(), 10, &mut kernel()).unwrap();
    let mut k = kernel();
    for _ in 0..10 {
        stepped.step(&rainy(), &mut k).unwrap();
    }

    assert_eq!(batched.iterations(), 10);
    assert_eq!(batched.active_slot(), BufferSlot::A);
    assert_eq!(batched.current(), stepped.current());
}

#[test]
fn test_water_collects_in_the_bowl() {
    let mut state = SimState::restart(&bowl(15)).unwrap();
    state.run_batch(&rainy(), 200, &mut kernel()).unwrap();

    let current = state.current();
    let center = current.get(7, 7).water_depth;
    let corner = current.get(0, 0).water_depth;
    assert!(center > corner, "center {center} should be wetter than corner {corner}");

    let total: f64 = current
        .as_slice()
        .iter()
        .map(|c| f64::from(c.water_depth))
        .sum();
    let rained = 200.0 * 0.002 * 15.0 * 15.0;
    assert_relative_eq!(total, rained, max_relative = 1e-3);
}

#[test]
fn test_failure_mid_batch_keeps_last_good_state() {
    let settings = rainy();
    let mut reference = SimState::restart(&bowl(8)).unwrap();
    reference.run_batch(&settings, 3, &mut kernel()).unwrap();

    let mut state = SimState::restart(&bowl(8)).unwrap();
    let mut flaky = FlakyKernel {
        inner: kernel(),
        remaining: 3,
    };
    let err = state.run_batch(&settings, 10, &mut flaky).unwrap_err();

    assert!(matches!(err, ErosionError::Gpu(_)));
    assert_eq!(state.iterations(), 3);
    assert_eq!(state.active_slot(), BufferSlot::B);
    assert_eq!(state.current(), reference.current());
}

#[test]
fn test_grid_construction_guards_restart() {
    // Grids cannot be empty, so restart only sees valid input
    assert!(matches!(
        Grid::<f32>::from_rows::<Vec<f32>>(&[]),
        Err(ErosionError::EmptyGrid)
    ));
    assert!(matches!(
        Grid::from_rows(&[vec![0.0_f32, 1.0], vec![0.5]]),
        Err(ErosionError::RaggedGrid { row: 1, .. })
    ));

    let state = SimState::restart(&Grid::new(1, 1, 0.5).unwrap()).unwrap();
    assert_eq!(state.dimensions(), (1, 1));
}
