// src/config.rs
//
// The engine's control panel: everything that shapes a session is fixed here
// at construction and never changes afterwards.

use crate::error::ConfigError;

/// Largest grid the device kernel can address with `u32` indices.
pub const MAX_CELLS: usize = u32::MAX as usize;

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Grid width in cells (columns).
    pub width: usize,
    /// Grid height in cells (rows).
    pub height: usize,

    /// Fraction of cells alive after a reset, strictly inside (0, 1).
    pub initial_density: f64,
    /// How many cluster centres the initial population is grown around.
    pub cluster_count: usize,
    /// Standard deviation (in cells) of each live cell's offset from its centre.
    pub cluster_radius: f64,

    /// Upper bound for brush radii passed to `Engine::paint`.
    pub max_brush_radius: u32,

    /// Fixed RNG seed. `None` draws one from the OS.
    pub seed: Option<u64>,

    /// Probe for a GPU adapter at startup.
    pub enable_accelerator: bool,
    /// Start on the accelerator when one was found.
    pub prefer_accelerator: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 440,
            initial_density: 0.41,
            cluster_count: 4,
            cluster_radius: 345.0,
            max_brush_radius: 30,
            seed: None,
            enable_accelerator: true,
            prefer_accelerator: true,
        }
    }
}

impl EngineConfig {
    /// Default knobs on a custom grid size.
    pub fn for_grid(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.initial_density = density;
        self
    }

    pub fn with_clusters(mut self, count: usize, radius: f64) -> Self {
        self.cluster_count = count;
        self.cluster_radius = radius;
        self
    }

    pub fn with_max_brush_radius(mut self, radius: u32) -> Self {
        self.max_brush_radius = radius;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Never probe for a GPU; the session runs on the CPU kernel only.
    pub fn cpu_only(mut self) -> Self {
        self.enable_accelerator = false;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        let cells = self
            .width
            .checked_mul(self.height)
            .ok_or(ConfigError::GridTooLarge { cells: usize::MAX })?;
        if cells > MAX_CELLS {
            return Err(ConfigError::GridTooLarge { cells });
        }
        let d = self.initial_density;
        if !(d > 0.0 && d < 1.0) {
            return Err(ConfigError::InvalidDensity(d));
        }
        if self.cluster_count == 0 {
            return Err(ConfigError::NoClusters);
        }
        let s = self.cluster_radius;
        if !(s.is_finite() && s > 0.0) {
            return Err(ConfigError::InvalidClusterRadius(s));
        }
        if self.max_brush_radius == 0 {
            return Err(ConfigError::InvalidBrushRadius);
        }
        Ok(())
    }

    /// Live cells a freshly generated grid must hold: `round(d * H * W)`.
    pub fn target_alive(&self) -> usize {
        (self.initial_density * (self.width * self.height) as f64).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_values_without_clamping() {
        let base = EngineConfig::for_grid(16, 16);
        assert_eq!(
            EngineConfig::for_grid(0, 16).validate(),
            Err(ConfigError::InvalidDimensions { width: 0, height: 16 })
        );
        assert_eq!(
            base.clone().with_density(0.0).validate(),
            Err(ConfigError::InvalidDensity(0.0))
        );
        assert_eq!(
            base.clone().with_density(1.0).validate(),
            Err(ConfigError::InvalidDensity(1.0))
        );
        assert!(matches!(
            base.clone().with_density(f64::NAN).validate(),
            Err(ConfigError::InvalidDensity(_))
        ));
        assert_eq!(
            base.clone().with_clusters(0, 3.0).validate(),
            Err(ConfigError::NoClusters)
        );
        assert_eq!(
            base.clone().with_clusters(2, -1.0).validate(),
            Err(ConfigError::InvalidClusterRadius(-1.0))
        );
        assert_eq!(
            base.with_max_brush_radius(0).validate(),
            Err(ConfigError::InvalidBrushRadius)
        );
    }

    #[test]
    fn target_alive_rounds() {
        // 0.125 * 4 * 5 = 2.5 -> 3
        let cfg = EngineConfig::for_grid(4, 5).with_density(0.125);
        assert_eq!(cfg.target_alive(), 3);
        let cfg = EngineConfig::for_grid(10, 10).with_density(0.1);
        assert_eq!(cfg.target_alive(), 10);
    }
}
