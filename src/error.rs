// src/error.rs

use thiserror::Error;

/// Rejected [`EngineConfig`](crate::EngineConfig) values. Never clamped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("grid dimensions must be positive (got {width}x{height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("grid of {cells} cells exceeds the addressable range")]
    GridTooLarge { cells: usize },

    #[error("initial density must lie strictly between 0 and 1 (got {0})")]
    InvalidDensity(f64),

    #[error("cluster count must be at least 1")]
    NoClusters,

    #[error("cluster radius must be positive and finite (got {0})")]
    InvalidClusterRadius(f64),

    #[error("maximum brush radius must be at least 1")]
    InvalidBrushRadius,

    #[error("dispatcher steps {got:?} grids but the config asks for {expected:?}")]
    DispatcherMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
}

/// Failures of the wgpu accelerator backend.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("failed to request GPU adapter: {0}")]
    AdapterNotFound(String),

    #[error("failed to request GPU device: {0}")]
    DeviceRequestFailed(#[from] wgpu::RequestDeviceError),

    #[error("adapter cannot run the life kernel: {0}")]
    Unsupported(String),

    #[error("shader compilation error: {0}")]
    Shader(String),

    #[error("device allocation failed: {0}")]
    Allocation(String),

    #[error("kernel launch failed: {0}")]
    Launch(String),

    #[error("buffer readback failed: {0}")]
    Readback(String),

    #[error("grid is {got:?} but the device mirror holds {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
}

pub type GpuResult<T> = Result<T, GpuError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("accelerator failure: {0}")]
    Gpu(#[from] GpuError),

    #[error("step failed on every backend: {0}")]
    StepFailed(String),
}
