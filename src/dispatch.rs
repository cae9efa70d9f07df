// src/dispatch.rs
//
// Backend selection and the host/device double-buffering discipline.
//
// The host grid handed to `step` is authoritative. The CPU path computes into
// a back buffer and swaps; the accelerator path downloads into the same back
// buffer and swaps only once the readback succeeded. Either way the caller's
// grid is untouched by a failed step.

use std::time::{Duration, Instant};

use crate::cpu::CpuKernel;
use crate::error::{EngineError, GpuResult};
use crate::gpu::GpuContext;
use crate::grid::GridBuffer;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    Cpu,
    Accelerator,
}

impl Backend {
    pub fn label(self) -> &'static str {
        match self {
            Backend::Cpu => "CPU",
            Backend::Accelerator => "GPU",
        }
    }
}

/// What the query surface reports: the active backend, or that the session
/// is on the CPU because no accelerator was detected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BackendStatus {
    Cpu,
    Accelerator,
    AcceleratorUnavailable,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StepReport {
    /// Backend that actually produced the generation.
    pub backend: Backend,
    /// Kernel time only; excludes host-side bookkeeping.
    pub elapsed: Duration,
}

impl StepReport {
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// A device that keeps its own copy of the grid and steps it.
///
/// `step` must write `out` only with the finished generation; the dispatcher
/// discards `out` whenever an error comes back.
pub trait Accelerator {
    /// Device-resident state for one grid.
    type Mirror;

    fn name(&self) -> &str;
    fn allocate(&self, host: &GridBuffer) -> GpuResult<Self::Mirror>;
    fn upload(&self, mirror: &mut Self::Mirror, host: &GridBuffer) -> GpuResult<()>;
    fn step(&self, mirror: &mut Self::Mirror, out: &mut GridBuffer) -> GpuResult<Duration>;
}

pub struct DeviceDispatcher<A: Accelerator = GpuContext> {
    active: Backend,
    cpu: CpuKernel,
    back: GridBuffer,

    gpu: Option<A>,
    mirror: Option<A::Mirror>,
}

impl DeviceDispatcher {
    /// Starts on the CPU. `gpu` is the result of probing at startup.
    pub fn new(width: usize, height: usize, gpu: Option<GpuContext>) -> Self {
        Self::with_accelerator(width, height, gpu)
    }

    pub fn cpu_only(width: usize, height: usize) -> Self {
        Self::with_accelerator(width, height, None)
    }
}

impl<A: Accelerator> DeviceDispatcher<A> {
    pub fn with_accelerator(width: usize, height: usize, gpu: Option<A>) -> Self {
        Self {
            active: Backend::Cpu,
            cpu: CpuKernel::new(),
            back: GridBuffer::new(width, height),
            gpu,
            mirror: None,
        }
    }

    /// `(width, height)` of the grids this dispatcher steps.
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.back.width(), self.back.height())
    }

    #[inline]
    pub fn accelerator_available(&self) -> bool {
        self.gpu.is_some()
    }

    #[inline]
    pub fn active(&self) -> Backend {
        self.active
    }

    pub fn status(&self) -> BackendStatus {
        match (self.active, self.gpu.is_some()) {
            (Backend::Accelerator, _) => BackendStatus::Accelerator,
            (Backend::Cpu, true) => BackendStatus::Cpu,
            (Backend::Cpu, false) => BackendStatus::AcceleratorUnavailable,
        }
    }

    /// Adapter name while the accelerator is active, otherwise "CPU".
    pub fn device_name(&self) -> &str {
        match (&self.gpu, self.active) {
            (Some(dev), Backend::Accelerator) => dev.name(),
            _ => Backend::Cpu.label(),
        }
    }

    /// Switches backend between steps. Returns `false` when the request was
    /// rejected; the previous backend then stays active.
    pub fn select_backend(&mut self, backend: Backend, host: &GridBuffer) -> bool {
        if backend == self.active {
            return true;
        }
        match backend {
            Backend::Cpu => {
                self.mirror = None;
                self.active = Backend::Cpu;
                log::info!("switched to CPU backend");
                true
            }
            Backend::Accelerator => {
                let Some(dev) = &self.gpu else {
                    log::warn!("accelerator requested but none was detected; staying on CPU");
                    return false;
                };
                if (host.width(), host.height()) != self.dimensions() {
                    log::warn!("host grid does not match the dispatcher; staying on CPU");
                    return false;
                }
                match dev.allocate(host) {
                    Ok(mirror) => {
                        log::info!("switched to GPU backend ({})", dev.name());
                        self.mirror = Some(mirror);
                        self.active = Backend::Accelerator;
                        true
                    }
                    Err(e) => {
                        log::warn!("could not allocate device mirror: {e}; staying on CPU");
                        false
                    }
                }
            }
        }
    }

    /// Re-uploads `host` after an edit made outside `step`.
    pub fn notify_host_edited(&mut self, host: &GridBuffer) {
        let (Some(dev), Some(mirror)) = (&self.gpu, self.mirror.as_mut()) else {
            return;
        };
        if let Err(e) = dev.upload(mirror, host) {
            self.fall_back(&e.to_string());
        }
    }

    /// Advances `host` by one generation on the active backend.
    ///
    /// A grid of the wrong shape is rejected before either backend runs. An
    /// accelerator failure drops the device mirror, switches to the CPU until
    /// the accelerator is selected again, and recomputes this generation there.
    pub fn step(&mut self, host: &mut GridBuffer) -> Result<StepReport, EngineError> {
        let got = (host.width(), host.height());
        if got != self.dimensions() {
            return Err(EngineError::StepFailed(format!(
                "host grid is {got:?}, dispatcher was built for {:?}",
                self.dimensions()
            )));
        }

        if let (Some(dev), Some(mirror)) = (&self.gpu, self.mirror.as_mut()) {
            match dev.step(mirror, &mut self.back) {
                Ok(elapsed) => {
                    std::mem::swap(host, &mut self.back);
                    return Ok(StepReport {
                        backend: Backend::Accelerator,
                        elapsed,
                    });
                }
                Err(e) => self.fall_back(&e.to_string()),
            }
        }
        Ok(self.step_cpu(host))
    }

    fn step_cpu(&mut self, host: &mut GridBuffer) -> StepReport {
        let started = Instant::now();
        self.cpu.step(host, &mut self.back);
        let elapsed = started.elapsed();

        std::mem::swap(host, &mut self.back);
        StepReport {
            backend: Backend::Cpu,
            elapsed,
        }
    }

    fn fall_back(&mut self, reason: &str) {
        log::warn!("accelerator failed ({reason}); falling back to CPU");
        self.mirror = None;
        self.active = Backend::Cpu;
    }
}
