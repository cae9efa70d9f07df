// src/main.rs
//
// Headless driver: builds an engine from the command line, optionally stamps
// the brush, then steps a fixed number of generations and logs a status line.

use std::str::FromStr;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use torus_life::{Backend, Brush, Engine, EngineConfig, PaintMode};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    Cpu,
    Gpu,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Cpu => Backend::Cpu,
            BackendArg::Gpu => Backend::Accelerator,
        }
    }
}

/// A `ROW,COL,RADIUS` brush stamp.
#[derive(Copy, Clone, Debug)]
struct Stamp {
    row: i64,
    col: i64,
    radius: u32,
}

impl FromStr for Stamp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [row, col, radius] = parts.as_slice() else {
            return Err(format!("expected ROW,COL,RADIUS, got {s:?}"));
        };
        Ok(Self {
            row: row.parse().map_err(|e| format!("row: {e}"))?,
            col: col.parse().map_err(|e| format!("col: {e}"))?,
            radius: radius.parse().map_err(|e| format!("radius: {e}"))?,
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "torus-life", about = "Headless toroidal Game of Life runner")]
struct Args {
    #[arg(long, default_value_t = 800)]
    width: usize,
    #[arg(long, default_value_t = 440)]
    height: usize,
    #[arg(long, default_value_t = 0.41)]
    density: f64,
    #[arg(long, default_value_t = 4)]
    clusters: usize,
    #[arg(long, default_value_t = 345.0)]
    cluster_radius: f64,
    #[arg(long, default_value_t = 30)]
    max_brush: u32,
    #[arg(long)]
    seed: Option<u64>,

    /// Never probe for a GPU.
    #[arg(long)]
    cpu_only: bool,
    /// Backend to run on; defaults to the GPU when one is found.
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    #[arg(long, default_value_t = 600)]
    generations: u64,
    /// Log a status line every N generations.
    #[arg(long, default_value_t = 60)]
    report_every: u64,

    /// Set-mode brush stamp applied before the first step, e.g. `220,400,12`.
    #[arg(long)]
    paint: Vec<Stamp>,
}

impl Args {
    fn config(&self) -> EngineConfig {
        let mut cfg = EngineConfig::for_grid(self.width, self.height)
            .with_density(self.density)
            .with_clusters(self.clusters, self.cluster_radius)
            .with_max_brush_radius(self.max_brush);
        cfg.seed = self.seed;
        if self.cpu_only {
            cfg = cfg.cpu_only();
        }
        cfg
    }
}

fn status_line(engine: &Engine, compute_ms: f64) -> String {
    format!(
        "device {} | compute {:.3} ms | gen {} | alive {} ({:.1}%) | {}",
        engine.device_name(),
        compute_ms,
        engine.generation(),
        engine.alive_count(),
        engine.alive_fraction() * 100.0,
        if engine.is_paused() { "paused" } else { "running" },
    )
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut engine = Engine::new(args.config()).context("building engine")?;

    if let Some(b) = args.backend {
        let backend = Backend::from(b);
        if !engine.set_backend(backend) {
            bail!("{} backend is not available on this machine", backend.label());
        }
    }

    for s in &args.paint {
        let brush = Brush::new(s.radius, args.max_brush, PaintMode::Set);
        let stamped = engine.paint(s.row, s.col, brush.radius(), brush.mode);
        log::info!("stamped {stamped} cells at ({},{}) r={}", s.row, s.col, brush.radius());
    }

    let report_every = args.report_every.max(1);
    let started = Instant::now();
    let mut total_ms = 0.0;

    for _ in 0..args.generations {
        let ms = engine
            .step()
            .with_context(|| format!("stepping generation {}", engine.generation() + 1))?
            .unwrap_or(0.0);
        total_ms += ms;
        if engine.generation() % report_every == 0 {
            log::info!("{}", status_line(&engine, ms));
        }
    }

    let wall = started.elapsed().as_secs_f64();
    let gens = engine.generation().max(1) as f64;
    log::info!(
        "{} generations in {:.2} s ({:.1} gen/s, mean kernel {:.3} ms)",
        engine.generation(),
        wall,
        gens / wall.max(f64::EPSILON),
        total_ms / gens
    );
    Ok(())
}
