// src/engine.rs
//
// The command surface the view/input shell talks to. Owns the authoritative
// host grid, the generation counter, the pause flag and the seeded RNG, and
// routes every mutation through the dispatcher so device mirrors follow.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::brush::{self, PaintMode};
use crate::config::EngineConfig;
use crate::dispatch::{Backend, BackendStatus, DeviceDispatcher};
use crate::error::{ConfigError, EngineError};
use crate::gpu::GpuContext;
use crate::grid::GridBuffer;
use crate::seed::InitialStateGenerator;

pub struct Engine {
    config: EngineConfig,
    generator: InitialStateGenerator,
    rng: StdRng,

    grid: GridBuffer,
    generation: u64,
    paused: bool,
    last_compute_ms: f64,

    dispatcher: DeviceDispatcher,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let generator = InitialStateGenerator::from_config(&config)?;
        let gpu = if config.enable_accelerator {
            GpuContext::probe()
        } else {
            None
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let dispatcher = DeviceDispatcher::new(config.width, config.height, gpu);
        Ok(Self::assemble(config, generator, rng, dispatcher))
    }

    /// Builds an engine around an explicit RNG and dispatcher; never probes
    /// for a device on its own.
    pub fn with_parts(
        config: EngineConfig,
        rng: StdRng,
        dispatcher: DeviceDispatcher,
    ) -> Result<Self, EngineError> {
        let generator = InitialStateGenerator::from_config(&config)?;
        let expected = (config.width, config.height);
        if dispatcher.dimensions() != expected {
            return Err(ConfigError::DispatcherMismatch {
                expected,
                got: dispatcher.dimensions(),
            }
            .into());
        }
        Ok(Self::assemble(config, generator, rng, dispatcher))
    }

    fn assemble(
        config: EngineConfig,
        generator: InitialStateGenerator,
        mut rng: StdRng,
        mut dispatcher: DeviceDispatcher,
    ) -> Self {
        let grid = generator.generate(&mut rng);
        if config.prefer_accelerator && dispatcher.accelerator_available() {
            dispatcher.select_backend(Backend::Accelerator, &grid);
        }
        log::info!(
            "engine ready: {}x{} grid, {} alive, backend {}",
            config.width,
            config.height,
            grid.count_alive(),
            dispatcher.device_name()
        );
        Self {
            config,
            generator,
            rng,
            grid,
            generation: 0,
            paused: false,
            last_compute_ms: 0.0,
            dispatcher,
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn current_grid(&self) -> &GridBuffer {
        &self.grid
    }

    /// Advances one generation unless paused. Returns the compute time in
    /// milliseconds, or `None` when paused.
    pub fn step(&mut self) -> Result<Option<f64>, EngineError> {
        if self.paused {
            return Ok(None);
        }
        let report = self.dispatcher.step(&mut self.grid)?;
        self.generation += 1;
        self.last_compute_ms = report.elapsed_ms();
        log::debug!(
            "generation {} on {} in {:.3} ms",
            self.generation,
            report.backend.label(),
            self.last_compute_ms
        );
        Ok(Some(self.last_compute_ms))
    }

    /// New clustered population; generation back to 0 and running again.
    pub fn reset(&mut self) {
        self.grid = self.generator.generate(&mut self.rng);
        self.generation = 0;
        self.paused = false;
        self.dispatcher.notify_host_edited(&self.grid);
        log::info!("reset: {} cells alive", self.grid.count_alive());
    }

    pub fn clear(&mut self) {
        self.grid = GridBuffer::new(self.config.width, self.config.height);
        self.generation = 0;
        self.dispatcher.notify_host_edited(&self.grid);
        log::info!("cleared grid");
    }

    /// Stamps the brush at `(row, col)`. `radius` is clamped to
    /// `[1, max_brush_radius]`.
    pub fn paint(&mut self, row: i64, col: i64, radius: u32, mode: PaintMode) -> usize {
        let radius = radius.clamp(1, self.config.max_brush_radius);
        let stamped = brush::apply(&mut self.grid, row, col, radius, mode);
        self.dispatcher.notify_host_edited(&self.grid);
        log::debug!("{mode:?} brush r={radius} at ({row},{col}): {stamped} cells");
        stamped
    }

    pub fn set_backend(&mut self, backend: Backend) -> bool {
        self.dispatcher.select_backend(backend, &self.grid)
    }

    #[inline]
    pub fn current_backend(&self) -> BackendStatus {
        self.dispatcher.status()
    }

    pub fn device_name(&self) -> &str {
        self.dispatcher.device_name()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn alive_count(&self) -> usize {
        self.grid.count_alive()
    }

    pub fn alive_fraction(&self) -> f64 {
        self.alive_count() as f64 / self.grid.len() as f64
    }

    #[inline]
    pub fn last_compute_ms(&self) -> f64 {
        self.last_compute_ms
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(w: usize, h: usize) -> Engine {
        let cfg = EngineConfig::for_grid(w, h)
            .with_clusters(3, 6.0)
            .with_seed(9)
            .cpu_only();
        Engine::new(cfg).unwrap()
    }

    #[test]
    fn starts_with_exact_density_at_generation_zero() {
        let e = engine(60, 40);
        assert_eq!(e.generation(), 0);
        assert_eq!(e.alive_count(), e.config().target_alive());
        assert_eq!(e.current_backend(), BackendStatus::AcceleratorUnavailable);
    }

    #[test]
    fn generation_counts_steps_and_pauses() {
        let mut e = engine(30, 30);
        for n in 1..=5 {
            assert!(e.step().unwrap().is_some());
            assert_eq!(e.generation(), n);
        }
        assert!(e.toggle_pause());
        let frozen = e.current_grid().clone();
        assert_eq!(e.step().unwrap(), None);
        assert_eq!(e.generation(), 5);
        assert_eq!(e.current_grid(), &frozen);
        e.set_paused(false);
        e.step().unwrap();
        assert_eq!(e.generation(), 6);
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut e = engine(25, 20);
        e.step().unwrap();
        e.clear();
        assert_eq!(e.alive_count(), 0);
        assert_eq!(e.generation(), 0);
        e.step().unwrap();
        assert_eq!(e.alive_count(), 0);
    }

    #[test]
    fn reset_reseeds_and_unpauses() {
        let mut e = engine(40, 32);
        e.step().unwrap();
        e.step().unwrap();
        e.set_paused(true);
        e.reset();
        assert_eq!(e.generation(), 0);
        assert!(!e.is_paused());
        assert_eq!(e.alive_count(), e.config().target_alive());
    }

    #[test]
    fn paint_clamps_radius() {
        let cfg = EngineConfig::for_grid(64, 64)
            .with_max_brush_radius(2)
            .with_seed(1)
            .cpu_only();
        let mut e = Engine::new(cfg).unwrap();
        e.clear();
        // radius 2 covers the 3x3 box, whatever was asked for
        assert_eq!(e.paint(30, 30, 50, PaintMode::Set), 9);
        assert_eq!(e.alive_count(), 9);
        assert_eq!(e.paint(0, 0, 0, PaintMode::Set), 1);
    }

    #[test]
    fn same_seed_same_history() {
        let mut a = engine(32, 24);
        let mut b = engine(32, 24);
        for _ in 0..8 {
            a.step().unwrap();
            b.step().unwrap();
        }
        assert_eq!(a.current_grid(), b.current_grid());
    }

    #[test]
    fn injected_rng_drives_the_seed() {
        let cfg = EngineConfig::for_grid(24, 24).with_clusters(2, 4.0);
        let build = || {
            Engine::with_parts(
                cfg.clone(),
                StdRng::seed_from_u64(4),
                DeviceDispatcher::cpu_only(24, 24),
            )
            .unwrap()
        };
        assert_eq!(build().current_grid(), build().current_grid());
    }

    #[test]
    fn dispatcher_must_match_the_grid() {
        let cfg = EngineConfig::for_grid(24, 24);
        let res = Engine::with_parts(
            cfg,
            StdRng::seed_from_u64(4),
            DeviceDispatcher::cpu_only(24, 23),
        );
        assert!(matches!(
            res,
            Err(EngineError::Config(ConfigError::DispatcherMismatch {
                expected: (24, 24),
                got: (24, 23),
            }))
        ));
    }

    #[test]
    fn bad_config_is_reported() {
        let cfg = EngineConfig::for_grid(10, 10).with_density(1.5).cpu_only();
        assert!(matches!(Engine::new(cfg), Err(EngineError::Config(_))));
    }
}
