//! Toroidal Game of Life engine.
//!
//! A fixed-size B3/S23 grid that wraps at every edge, stepped either by a
//! row-parallel CPU kernel or, when an adapter is found, by a wgpu compute
//! kernel. Both backends produce identical generations; [`Engine`] switches
//! between them without losing state and keeps the device copy in sync with
//! brush edits, resets and clears.
//!
//! ```no_run
//! use torus_life::{Engine, EngineConfig, PaintMode};
//!
//! let mut engine = Engine::new(EngineConfig::default().with_seed(7))?;
//! engine.paint(220, 400, 5, PaintMode::Set);
//! let ms = engine.step()?;
//! println!("gen {} in {:?} ms, {} alive", engine.generation(), ms, engine.alive_count());
//! # Ok::<(), torus_life::EngineError>(())
//! ```

pub mod brush;
pub mod config;
pub mod cpu;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod grid;
pub mod seed;

pub use brush::{Brush, PaintMode};
pub use config::EngineConfig;
pub use cpu::{CpuKernel, LifeRule};
pub use dispatch::{Accelerator, Backend, BackendStatus, DeviceDispatcher, StepReport};
pub use engine::Engine;
pub use error::{ConfigError, EngineError, GpuError};
pub use gpu::{GpuContext, GpuMirror};
pub use grid::GridBuffer;
pub use seed::InitialStateGenerator;
