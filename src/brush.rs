// src/brush.rs
//
// Direct edits to the host grid, outside the automaton rule. A stamp covers
// the discretised disk `dr^2 + dc^2 < r^2` around the centre, wrapped
// toroidally, and touches every covered grid cell exactly once.

use crate::grid::GridBuffer;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PaintMode {
    /// Flip covered cells.
    #[default]
    Toggle,
    /// Force covered cells alive; never clears.
    Set,
}

/// User-held brush state: a radius kept within `[1, max]` and a paint mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Brush {
    radius: u32,
    max: u32,
    pub mode: PaintMode,
}

impl Brush {
    pub fn new(radius: u32, max: u32, mode: PaintMode) -> Self {
        let max = max.max(1);
        Self {
            radius: radius.clamp(1, max),
            max,
            mode,
        }
    }

    #[inline]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    #[inline]
    pub fn max_radius(&self) -> u32 {
        self.max
    }

    pub fn grow(&mut self) {
        self.radius = (self.radius + 1).min(self.max);
    }

    pub fn shrink(&mut self) {
        self.radius = self.radius.saturating_sub(1).max(1);
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            PaintMode::Toggle => PaintMode::Set,
            PaintMode::Set => PaintMode::Toggle,
        };
    }
}

impl Default for Brush {
    fn default() -> Self {
        Self::new(3, 30, PaintMode::Toggle)
    }
}

/// Stamps a disk of `radius` centred on `(center_row, center_col)`.
///
/// Returns the number of distinct cells covered. The caller is responsible
/// for telling the dispatcher the host grid changed.
pub fn apply(
    grid: &mut GridBuffer,
    center_row: i64,
    center_col: i64,
    radius: u32,
    mode: PaintMode,
) -> usize {
    let span = (2 * radius as u64).saturating_sub(1);
    if span > grid.width() as u64 || span > grid.height() as u64 {
        return apply_wrapped(grid, center_row, center_col, radius, mode);
    }

    // The box fits inside the torus, so every offset is a distinct cell.
    let r = radius as i64;
    let r2 = r * r;
    let mut stamped = 0;
    for dr in (-r + 1)..r {
        for dc in (-r + 1)..r {
            if dr * dr + dc * dc >= r2 {
                continue;
            }
            let i = grid.index(center_row + dr, center_col + dc);
            paint_cell(grid.cells_mut(), i, mode);
            stamped += 1;
        }
    }
    stamped
}

/// Disk wider than the torus: walk the grid once and test each cell by its
/// shortest toroidal offset from the centre.
fn apply_wrapped(
    grid: &mut GridBuffer,
    center_row: i64,
    center_col: i64,
    radius: u32,
    mode: PaintMode,
) -> usize {
    let (w, h) = (grid.width() as i64, grid.height() as i64);
    let r2 = (radius as i128) * (radius as i128);
    let nearest = |d: i64, n: i64| {
        let d = d.rem_euclid(n);
        d.min(n - d) as i128
    };

    let mut stamped = 0;
    for row in 0..h {
        let dr = nearest(row - center_row.rem_euclid(h), h);
        if dr * dr >= r2 {
            continue;
        }
        for col in 0..w {
            let dc = nearest(col - center_col.rem_euclid(w), w);
            if dr * dr + dc * dc >= r2 {
                continue;
            }
            let i = grid.index(row, col);
            paint_cell(grid.cells_mut(), i, mode);
            stamped += 1;
        }
    }
    stamped
}

#[inline]
fn paint_cell(cells: &mut [u8], i: usize, mode: PaintMode) {
    match mode {
        PaintMode::Set => cells[i] = 1,
        PaintMode::Toggle => cells[i] ^= 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_stamps_exactly_the_disk() {
        let mut g = GridBuffer::new(16, 16);
        let n = apply(&mut g, 5, 5, 3, PaintMode::Toggle);
        for r in 0..16i64 {
            for c in 0..16i64 {
                let d2 = (r - 5).pow(2) + (c - 5).pow(2);
                assert_eq!(g.get(r, c), (d2 < 9) as u8, "({r},{c})");
            }
        }
        // every offset in the 5x5 box has d2 <= 8 < 9
        assert_eq!(n, 25);
        assert_eq!(g.count_alive(), 25);
    }

    #[test]
    fn radius_one_is_a_single_cell() {
        let mut g = GridBuffer::new(4, 4);
        assert_eq!(apply(&mut g, 2, 2, 1, PaintMode::Set), 1);
        assert_eq!(g.get(2, 2), 1);
        assert_eq!(g.count_alive(), 1);
    }

    #[test]
    fn toggle_twice_restores() {
        let mut g = GridBuffer::new(12, 9);
        g.set(3, 3, 1);
        g.set(4, 6, 1);
        let before = g.clone();
        apply(&mut g, 4, 4, 4, PaintMode::Toggle);
        assert_ne!(g, before);
        apply(&mut g, 4, 4, 4, PaintMode::Toggle);
        assert_eq!(g, before);
    }

    #[test]
    fn set_never_clears() {
        let mut g = GridBuffer::new(10, 10);
        apply(&mut g, 5, 5, 2, PaintMode::Set);
        let alive = g.count_alive();
        apply(&mut g, 5, 5, 2, PaintMode::Set);
        assert_eq!(g.count_alive(), alive);
    }

    #[test]
    fn stamp_wraps_over_the_corner() {
        let mut g = GridBuffer::new(10, 8);
        apply(&mut g, 0, 0, 2, PaintMode::Set);
        for r in [7, 0, 1] {
            for c in [9, 0, 1] {
                assert_eq!(g.get(r, c), 1, "({r},{c})");
            }
        }
        assert_eq!(g.count_alive(), 9);

        // radius 3 covers the whole 5x5 box around the seam, nothing at offset 3
        let mut g = GridBuffer::new(10, 8);
        apply(&mut g, 0, 0, 3, PaintMode::Set);
        assert_eq!(g.get(6, 0), 1);
        assert_eq!(g.get(0, 8), 1);
        assert_eq!(g.get(6, 8), 1);
        assert_eq!(g.get(5, 0), 0);
    }

    #[test]
    fn oversized_disk_touches_each_cell_once() {
        let mut g = GridBuffer::new(3, 3);
        let n = apply(&mut g, 1, 1, 10, PaintMode::Toggle);
        assert_eq!(n, 9);
        assert_eq!(g.count_alive(), 9);
    }

    #[test]
    fn wrapped_disk_matches_deduplicated_offsets() {
        // Reference: walk every offset of the box and count each grid cell once.
        fn reference(w: usize, h: usize, row: i64, col: i64, radius: u32) -> GridBuffer {
            let mut g = GridBuffer::new(w, h);
            let r = radius as i64;
            for dr in (-r + 1)..r {
                for dc in (-r + 1)..r {
                    if dr * dr + dc * dc < r * r {
                        g.set(row + dr, col + dc, 1);
                    }
                }
            }
            g
        }

        for (w, h) in [(5, 4), (7, 3), (2, 9)] {
            for radius in 2..9 {
                for (row, col) in [(0, 0), (2, 1), (-3, 11)] {
                    let mut g = GridBuffer::new(w, h);
                    let n = apply(&mut g, row, col, radius, PaintMode::Toggle);
                    let want = reference(w, h, row, col, radius);
                    assert_eq!(g, want, "{w}x{h} r={radius} at ({row},{col})");
                    assert_eq!(n, want.count_alive());
                }
            }
        }
    }

    #[test]
    fn huge_radius_covers_the_torus_once() {
        let mut g = GridBuffer::new(4, 4);
        assert_eq!(apply(&mut g, 0, 0, u32::MAX, PaintMode::Set), 16);
        assert_eq!(g.count_alive(), 16);

        let mut g = GridBuffer::new(6, 5);
        g.set(2, 2, 1);
        assert_eq!(apply(&mut g, 1, 1, 100_000, PaintMode::Toggle), 30);
        assert_eq!(g.count_alive(), 29);
        assert_eq!(g.get(2, 2), 0);
    }

    #[test]
    fn brush_radius_is_clamped() {
        let mut b = Brush::new(0, 4, PaintMode::Set);
        assert_eq!(b.radius(), 1);
        b.shrink();
        assert_eq!(b.radius(), 1);
        for _ in 0..10 {
            b.grow();
        }
        assert_eq!(b.radius(), 4);
        b.toggle_mode();
        assert_eq!(b.mode, PaintMode::Toggle);
    }
}
