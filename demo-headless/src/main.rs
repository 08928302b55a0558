use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use terrain_erosion_core::kernel::{create_cpu_kernel, create_step_kernel};
use terrain_erosion_core::{
    ErosionTool, InMemoryTerrain, SimState, TerrainStore, ToolConfig, WaterStats, BAND_COUNT,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Headless terrain erosion driver
#[derive(Parser, Debug)]
#[command(name = "terrain-erosion-demo")]
#[command(about = "Shape a heightmap, paint texture bands and run rain erosion", long_about = None)]
struct Args {
    /// JSON tool configuration (missing fields use defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long, global = true)]
    print_config: bool,

    /// JSON terrain to start from instead of a flat one
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Write the resulting ground terrain as JSON
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Flat terrain width in samples
    #[arg(long, default_value_t = 128, global = true)]
    width: usize,

    /// Flat terrain length in samples
    #[arg(long, default_value_t = 128, global = true)]
    length: usize,

    /// Terrain size along the width in world units
    #[arg(long, default_value_t = 128.0, global = true)]
    size: f32,

    /// Shaping seed (overrides the config file)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Skip GPU detection
    #[arg(long, global = true)]
    cpu: bool,

    /// Print a JSON report instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Shape the heightmap and paint texture weights
    Apply,
    /// Rain on the terrain, optionally shaping it first
    Rain {
        /// Total rain steps
        #[arg(short = 'n', long, default_value_t = 1000)]
        iterations: usize,

        /// Steps per reported batch
        #[arg(short, long, default_value_t = 100)]
        batch: usize,

        /// Shape the terrain before raining
        #[arg(long)]
        shape: bool,
    },
}

/// Summary printed at the end of a run
#[derive(Debug, Serialize)]
struct Report {
    kernel: String,
    width: usize,
    length: usize,
    min_height: f32,
    max_height: f32,
    band_coverage: [f32; BAND_COUNT],
    iterations: u64,
    water: Option<WaterStats>,
}

fn load_config(args: &Args) -> Result<ToolConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => ToolConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.shaping.seed = seed;
    }
    Ok(config)
}

fn load_terrain(args: &Args) -> Result<InMemoryTerrain, Box<dyn std::error::Error>> {
    if let Some(path) = &args.input {
        return Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?);
    }
    let cell_width = args.size / args.width as f32;
    Ok(InMemoryTerrain::flat(args.width, args.length, 0.5, cell_width)?)
}

fn write_terrain(path: &Path, terrain: &InMemoryTerrain) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, serde_json::to_string(terrain)?)?;
    info!("Wrote terrain to {}", path.display());
    Ok(())
}

fn report(tool: &ErosionTool, ground: &InMemoryTerrain, water: Option<WaterStats>) -> Report {
    let heights = ground.heights().as_slice();
    let (min_height, max_height) = heights
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)));

    let mut band_coverage = [0.0_f32; BAND_COUNT];
    if let Some(alpha) = ground.alpha_weights() {
        for w in alpha.as_slice() {
            for (acc, x) in band_coverage.iter_mut().zip(w) {
                *acc += x;
            }
        }
        for acc in &mut band_coverage {
            *acc /= alpha.len() as f32;
        }
    }

    Report {
        kernel: tool.kernel_name().to_string(),
        width: ground.heights().width(),
        length: ground.heights().length(),
        min_height,
        max_height,
        band_coverage,
        iterations: tool.simulation().map_or(0, SimState::iterations),
        water,
    }
}

fn print_report(report: &Report) {
    println!("=== Terrain Erosion ===");
    println!("Kernel: {}", report.kernel);
    println!("Grid: {}x{}", report.width, report.length);
    println!(
        "Height range: {:.3} .. {:.3}",
        report.min_height, report.max_height
    );
    print!("Band coverage:");
    for (band, coverage) in report.band_coverage.iter().enumerate() {
        print!(" {}={:.1}%", band, coverage * 100.0);
    }
    println!();
    if let Some(water) = &report.water {
        println!("Rain steps: {}", report.iterations);
        println!(
            "Water: total {:.3}, max depth {:.4}, {} wet cells",
            water.total_water, water.max_depth, water.wet_cells
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = load_config(&args)?;
    let mut ground = load_terrain(&args)?;
    config.watershed.cell_width = ground.cell_width();

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let kernel = if args.cpu {
        create_cpu_kernel(config.watershed)?
    } else {
        create_step_kernel(config.watershed)?
    };
    let mut tool = ErosionTool::with_kernel(config, kernel);

    let water_stats = match args.command.unwrap_or(Command::Apply) {
        Command::Apply => {
            tool.apply(&mut ground)?;
            None
        }
        Command::Rain {
            iterations,
            batch,
            shape,
        } => {
            if shape {
                tool.apply(&mut ground)?;
            } else {
                tool.paint(&mut ground)?;
            }
            let mut water = ground.clone();
            tool.restart_rain(&ground)?;

            let batch = batch.max(1);
            let mut remaining = iterations;
            let mut stats = tool.rain(&ground, &mut water, 0)?;
            while remaining > 0 {
                let n = remaining.min(batch);
                stats = tool.rain(&ground, &mut water, n)?;
                remaining -= n;
                info!(
                    step = iterations - remaining,
                    total_water = stats.total_water,
                    max_depth = stats.max_depth,
                    "Rain batch complete"
                );
            }
            Some(stats)
        }
    };

    let report = report(&tool, &ground, water_stats);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(path) = &args.output {
        write_terrain(path, &ground)?;
    }
    Ok(())
}
