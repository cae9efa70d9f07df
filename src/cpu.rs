// src/cpu.rs
//
// Multi-core B3/S23 step. Two row-parallel passes over a separable Moore sum:
//   1) horizontal 3-wide wrapped sums of `cur` into `hsum`
//   2) vertical sum of three `hsum` rows, minus the centre, through the rule
// Pass 2 writes disjoint rows of `next`; `cur` and `hsum` are only read.

use rayon::prelude::*;

use crate::grid::GridBuffer;

/// Birth/survival masks indexed by live-neighbour count.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LifeRule {
    survive_mask: u16,
    birth_mask: u16,
}

impl LifeRule {
    /// Conway's rule, B3/S23.
    pub const CONWAY: LifeRule = LifeRule {
        survive_mask: (1 << 2) | (1 << 3),
        birth_mask: 1 << 3,
    };

    #[inline]
    pub fn next_state(self, alive: bool, n: u8) -> u8 {
        let mask = if alive { self.survive_mask } else { self.birth_mask };
        ((mask >> n) & 1) as u8
    }
}

/// Row-parallel CPU update kernel. Owns its horizontal-sum scratch.
#[derive(Debug, Default)]
pub struct CpuKernel {
    hsum: Vec<u8>,
}

impl CpuKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the generation after `cur` into `next`.
    pub fn step(&mut self, cur: &GridBuffer, next: &mut GridBuffer) {
        assert_eq!(
            (cur.width(), cur.height()),
            (next.width(), next.height()),
            "source and destination grids differ in shape"
        );
        let w = cur.width();
        let h = cur.height();
        let src = cur.cells();

        self.hsum.resize(cur.len(), 0);
        self.hsum
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, hrow)| {
                let row = &src[y * w..(y + 1) * w];
                for x in 0..w {
                    let left = if x == 0 { w - 1 } else { x - 1 };
                    let right = if x + 1 == w { 0 } else { x + 1 };
                    hrow[x] = row[left] + row[x] + row[right];
                }
            });

        let hsum = &self.hsum;
        let rule = LifeRule::CONWAY;
        next.cells_mut()
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, nrow)| {
                let up = if y == 0 { h - 1 } else { y - 1 };
                let down = if y + 1 == h { 0 } else { y + 1 };
                let hu = &hsum[up * w..(up + 1) * w];
                let hm = &hsum[y * w..(y + 1) * w];
                let hd = &hsum[down * w..(down + 1) * w];
                let crow = &src[y * w..(y + 1) * w];

                for x in 0..w {
                    let c = crow[x];
                    let n = hu[x] + hm[x] + hd[x] - c;
                    nrow[x] = rule.next_state(c != 0, n);
                }
            });
    }

    /// Like [`step`](Self::step) but allocates the destination.
    pub fn step_into_new(&mut self, cur: &GridBuffer) -> GridBuffer {
        let mut next = GridBuffer::new(cur.width(), cur.height());
        self.step(cur, &mut next);
        next
    }
}
