// src/grid.rs
//
// Host-resident cell storage. Row-major `u8` cells, each exactly 0 or 1.
// Every coordinate is reduced with `rem_euclid`, so the grid is a torus and
// there is no such thing as an out-of-range access.

use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct GridBuffer {
    w: usize,
    h: usize,
    cells: Vec<u8>,
}

impl GridBuffer {
    /// All-dead grid of `width` columns by `height` rows.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be positive");
        Self {
            w: width,
            h: height,
            cells: vec![0; width * height],
        }
    }

    /// Wraps an existing row-major buffer. Any non-zero byte counts as alive.
    pub fn from_cells(width: usize, height: usize, mut cells: Vec<u8>) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be positive");
        assert_eq!(cells.len(), width * height, "cell buffer does not match dimensions");
        for v in &mut cells {
            *v = (*v != 0) as u8;
        }
        Self {
            w: width,
            h: height,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.w
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.h
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Flat index of a (possibly out-of-range) coordinate after wrapping.
    #[inline]
    pub fn index(&self, row: i64, col: i64) -> usize {
        let r = row.rem_euclid(self.h as i64) as usize;
        let c = col.rem_euclid(self.w as i64) as usize;
        r * self.w + c
    }

    #[inline]
    pub fn get(&self, row: i64, col: i64) -> u8 {
        self.cells[self.index(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: i64, col: i64, value: u8) {
        let i = self.index(row, col);
        self.cells[i] = (value != 0) as u8;
    }

    #[inline]
    pub fn toggle(&mut self, row: i64, col: i64) {
        let i = self.index(row, col);
        self.cells[i] ^= 1;
    }

    /// Live cells among the 8 wrapped Moore neighbours, in `0..=8`.
    pub fn neighbor_count(&self, row: i64, col: i64) -> u8 {
        let mut n = 0;
        for dr in -1..=1 {
            for dc in -1..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                n += self.get(row + dr, col + dc);
            }
        }
        n
    }

    pub fn count_alive(&self) -> usize {
        self.cells.iter().map(|&v| v as usize).sum()
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Row-major view, `width()` cells per row.
    #[inline]
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.cells.chunks_exact(self.w)
    }

    // Kernels write whole rows at a time; callers outside the crate go
    // through `set`/`toggle` so the 0/1 invariant holds.
    #[inline]
    pub(crate) fn cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }
}

impl fmt::Debug for GridBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridBuffer")
            .field("width", &self.w)
            .field("height", &self.h)
            .field("alive", &self.count_alive())
            .finish()
    }
}
