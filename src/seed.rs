// src/seed.rs
//
// Clustered initial population. Live cells are scattered around a handful of
// centres with Gaussian offsets, then topped up uniformly so the density is
// exact no matter how often the scatter collided with itself.

use rand::seq::index;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::grid::GridBuffer;

/// Attempt budget for the clustered phase, per target cell.
const ATTEMPTS_PER_CELL: usize = 10;

#[derive(Clone, Debug)]
pub struct InitialStateGenerator {
    w: usize,
    h: usize,
    target: usize,
    cluster_count: usize,
    offset: Normal<f64>,
}

impl InitialStateGenerator {
    pub fn from_config(cfg: &EngineConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let offset = Normal::new(0.0, cfg.cluster_radius)
            .map_err(|_| ConfigError::InvalidClusterRadius(cfg.cluster_radius))?;
        Ok(Self {
            w: cfg.width,
            h: cfg.height,
            target: cfg.target_alive(),
            cluster_count: cfg.cluster_count,
            offset,
        })
    }

    /// Live cells every generated grid holds.
    #[inline]
    pub fn target_alive(&self) -> usize {
        self.target
    }

    /// Cluster centres as `(row, col)`, drawn from the central half of each axis.
    pub fn cluster_centers<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<(i64, i64)> {
        (0..self.cluster_count)
            .map(|_| {
                let r = central_coord(rng, self.h);
                let c = central_coord(rng, self.w);
                (r, c)
            })
            .collect()
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> GridBuffer {
        let mut grid = GridBuffer::new(self.w, self.h);
        let centers = self.cluster_centers(rng);

        let max_attempts = self.target * ATTEMPTS_PER_CELL;
        let mut placed = 0usize;
        let mut attempts = 0usize;

        while placed < self.target && attempts < max_attempts {
            attempts += 1;
            let (cr, cc) = centers[rng.random_range(0..centers.len())];

            // Offsets truncate toward zero and are reduced onto the torus before
            // being added; a huge spread saturates the cast.
            let dr = (self.offset.sample(rng) as i64).rem_euclid(self.h as i64);
            let dc = (self.offset.sample(rng) as i64).rem_euclid(self.w as i64);

            let i = grid.index(cr + dr, cc + dc);
            let cells = grid.cells_mut();
            if cells[i] == 0 {
                cells[i] = 1;
                placed += 1;
            }
        }

        if placed < self.target {
            let deficit = self.target - placed;
            log::debug!(
                "cluster scatter placed {placed}/{} cells after {attempts} attempts; filling {deficit} uniformly",
                self.target
            );
            fill_uniform(&mut grid, rng, deficit);
        }

        grid
    }
}

/// Uniform coordinate in `[n/4, 3n/4)`, or the whole axis when that is empty.
fn central_coord<R: Rng + ?Sized>(rng: &mut R, n: usize) -> i64 {
    let lo = n / 4;
    let hi = 3 * n / 4;
    if lo < hi {
        rng.random_range(lo..hi) as i64
    } else {
        rng.random_range(0..n) as i64
    }
}

/// Brings `k` distinct dead cells to life.
fn fill_uniform<R: Rng + ?Sized>(grid: &mut GridBuffer, rng: &mut R, k: usize) {
    let dead: Vec<usize> = grid
        .cells()
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v == 0)
        .map(|(i, _)| i)
        .collect();
    let k = k.min(dead.len());

    let cells = grid.cells_mut();
    for pick in index::sample(rng, dead.len(), k).iter() {
        cells[dead[pick]] = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generator(cfg: &EngineConfig) -> InitialStateGenerator {
        InitialStateGenerator::from_config(cfg).unwrap()
    }

    #[test]
    fn density_is_exact() {
        let cfg = EngineConfig::for_grid(120, 66).with_density(0.41).with_clusters(4, 20.0);
        let mut rng = StdRng::seed_from_u64(7);
        let grid = generator(&cfg).generate(&mut rng);
        assert_eq!(grid.count_alive(), cfg.target_alive());
    }

    #[test]
    fn deficit_is_filled_when_clusters_collide() {
        // A tiny spread truncates almost every offset to 0, so the scatter phase
        // keeps hitting the single centre and the uniform fill does the work.
        let cfg = EngineConfig::for_grid(20, 20).with_density(0.5).with_clusters(1, 0.1);
        let mut rng = StdRng::seed_from_u64(3);
        let grid = generator(&cfg).generate(&mut rng);
        assert_eq!(grid.count_alive(), 200);
    }

    #[test]
    fn centers_stay_in_the_middle() {
        let cfg = EngineConfig::for_grid(80, 44).with_clusters(32, 5.0);
        let mut rng = StdRng::seed_from_u64(11);
        for (r, c) in generator(&cfg).cluster_centers(&mut rng) {
            assert!((11..33).contains(&r), "row {r}");
            assert!((20..60).contains(&c), "col {c}");
        }
    }

    #[test]
    fn same_seed_same_grid() {
        let cfg = EngineConfig::for_grid(64, 48);
        let gen = generator(&cfg);
        let a = gen.generate(&mut StdRng::seed_from_u64(42));
        let b = gen.generate(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn one_by_one_grid_still_seeds() {
        let cfg = EngineConfig::for_grid(1, 1).with_density(0.9);
        let grid = generator(&cfg).generate(&mut StdRng::seed_from_u64(0));
        assert_eq!(grid.count_alive(), 1);
    }

    #[test]
    fn enormous_spread_still_lands_on_the_grid() {
        let cfg = EngineConfig::for_grid(16, 16).with_density(0.3).with_clusters(2, 1e300);
        let mut rng = StdRng::seed_from_u64(11);
        let grid = generator(&cfg).generate(&mut rng);
        assert_eq!(grid.count_alive(), cfg.target_alive());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = EngineConfig::for_grid(8, 8).with_clusters(1, 0.0);
        assert!(InitialStateGenerator::from_config(&cfg).is_err());
    }
}
