// SPDX-License-Identifier: MIT
//
// Grid — a rows × cols block of cells with per-row bookkeeping.
//
// The screen keeps two of these: what the terminal shows and what the
// application wants it to show. Each row carries flags saying why it must
// be looked at again, and a content hash used to spot rows that moved
// vertically.
//
// Cells are stored row-major in one flat vector, so a row is a contiguous
// slice and rotating a band of rows is a single `rotate_left`.
//
// Rows with fewer than two visible characters hash to `BLANK_HASH`. Nearly
// empty rows match each other too easily to be worth scrolling for, and
// treating them as blank keeps the scroll search from chasing them.

use std::hash::{Hash, Hasher};

use bitflags::bitflags;

use crate::cell::Cell;

/// The hash of every row that counts as blank.
pub const BLANK_HASH: u64 = 0;

bitflags! {
    /// Why a row of the desired grid needs attention at the next refresh.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RowFlags: u8 {
        /// Some cell was written since the last refresh.
        const TOUCHED = 1;
        /// The terminal's copy of the row cannot be trusted.
        const TRASHED = 2;
    }
}

/// Hash of a row's cells. Never collides with [`BLANK_HASH`] for a row
/// that is not blank.
#[must_use]
pub fn row_hash(cells: &[Cell]) -> u64 {
    if cells.iter().filter(|c| !c.is_space()).nth(1).is_none() {
        return BLANK_HASH;
    }
    let mut h = std::collections::hash_map::DefaultHasher::new();
    cells.hash(&mut h);
    h.finish().max(1)
}

// ─── Grid ───────────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    flags: Vec<RowFlags>,
    hashes: Vec<u64>,
}

impl Grid {
    /// A grid of blanks in color 0.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::BLANK; rows * cols],
            flags: vec![RowFlags::empty(); rows],
            hashes: vec![BLANK_HASH; rows],
        }
    }

    #[inline]
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// # Panics
    ///
    /// If `r` is out of range.
    #[inline]
    #[must_use]
    pub fn row(&self, r: usize) -> &[Cell] {
        &self.cells[r * self.cols..(r + 1) * self.cols]
    }

    /// # Panics
    ///
    /// If `r` is out of range.
    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [Cell] {
        &mut self.cells[r * self.cols..(r + 1) * self.cols]
    }

    #[inline]
    #[must_use]
    pub fn get(&self, r: usize, c: usize) -> Option<Cell> {
        (r < self.rows && c < self.cols).then(|| self.cells[r * self.cols + c])
    }

    /// Store `cell`; returns whether it changed anything. Out of range is
    /// ignored.
    pub fn set(&mut self, r: usize, c: usize, cell: Cell) -> bool {
        if r >= self.rows || c >= self.cols {
            return false;
        }
        let slot = &mut self.cells[r * self.cols + c];
        let changed = *slot != cell;
        *slot = cell;
        changed
    }

    // ── Row bookkeeping ──

    #[inline]
    #[must_use]
    pub fn flags(&self, r: usize) -> RowFlags {
        self.flags[r]
    }

    #[inline]
    pub fn mark(&mut self, r: usize, f: RowFlags) {
        self.flags[r] |= f;
    }

    #[inline]
    pub fn unmark(&mut self, r: usize, f: RowFlags) {
        self.flags[r] &= !f;
    }

    #[inline]
    pub fn clear_flags(&mut self, r: usize) {
        self.flags[r] = RowFlags::empty();
    }

    /// Flag every row.
    pub fn mark_all(&mut self, f: RowFlags) {
        for flags in &mut self.flags {
            *flags |= f;
        }
    }

    #[inline]
    #[must_use]
    pub fn hash(&self, r: usize) -> u64 {
        self.hashes[r]
    }

    #[inline]
    pub fn set_hash(&mut self, r: usize, h: u64) {
        self.hashes[r] = h;
    }

    /// Recompute the stored hash of row `r` from its cells.
    pub fn rehash(&mut self, r: usize) -> u64 {
        let h = row_hash(self.row(r));
        self.hashes[r] = h;
        h
    }

    // ── Bulk edits ──

    /// Fill row `r` with `cell`.
    pub fn fill_row(&mut self, r: usize, cell: Cell) {
        self.row_mut(r).fill(cell);
    }

    /// Copy row `r` of `other`, along with its hash.
    ///
    /// # Panics
    ///
    /// If the grids differ in width.
    pub fn copy_row(&mut self, r: usize, other: &Self) {
        self.row_mut(r).copy_from_slice(other.row(r));
        self.hashes[r] = other.hashes[r];
    }

    /// Move rows `r1..=r2` up by `n`; the `n` rows exposed at the bottom
    /// become blank.
    pub fn rotate_up(&mut self, r1: usize, r2: usize, n: usize) {
        if !self.valid_band(r1, r2, n) {
            return;
        }
        let cols = self.cols;
        self.cells[r1 * cols..(r2 + 1) * cols].rotate_left(n * cols);
        self.hashes[r1..=r2].rotate_left(n);
        for r in r2 + 1 - n..=r2 {
            self.blank(r);
        }
    }

    /// Move rows `r1..=r2` down by `n`; the `n` rows exposed at the top
    /// become blank.
    pub fn rotate_down(&mut self, r1: usize, r2: usize, n: usize) {
        if !self.valid_band(r1, r2, n) {
            return;
        }
        let cols = self.cols;
        self.cells[r1 * cols..(r2 + 1) * cols].rotate_right(n * cols);
        self.hashes[r1..=r2].rotate_right(n);
        for r in r1..r1 + n {
            self.blank(r);
        }
    }

    const fn valid_band(&self, r1: usize, r2: usize, n: usize) -> bool {
        r1 <= r2 && r2 < self.rows && n > 0 && n <= r2 - r1 + 1
    }

    fn blank(&mut self, r: usize) {
        self.fill_row(r, Cell::BLANK);
        self.hashes[r] = BLANK_HASH;
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for r in 0..self.rows {
            let text: String = self.row(r).iter().map(|c| char::from(c.ch())).collect();
            list.entry(&text);
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(g: &Grid, r: usize) -> String {
        g.row(r).iter().map(|c| char::from(c.ch())).collect()
    }

    fn put(g: &mut Grid, r: usize, s: &str) {
        for (c, b) in s.bytes().enumerate() {
            g.set(r, c, Cell::new(b, 0));
        }
        g.rehash(r);
    }

    // ── Hashing ──

    #[test]
    fn nearly_empty_rows_hash_as_blank() {
        let blank = [Cell::BLANK; 10];
        assert_eq!(row_hash(&blank), BLANK_HASH);
        let mut one = blank;
        one[4] = Cell::new(b'x', 0);
        assert_eq!(row_hash(&one), BLANK_HASH);
        // Color alone does not make a row visible.
        let colored = [Cell::blank(5); 10];
        assert_eq!(row_hash(&colored), BLANK_HASH);
    }

    #[test]
    fn content_hashes_differ_by_color() {
        let a = [Cell::new(b'a', 0), Cell::new(b'b', 0)];
        let b = [Cell::new(b'a', 1), Cell::new(b'b', 0)];
        assert_ne!(row_hash(&a), BLANK_HASH);
        assert_ne!(row_hash(&a), row_hash(&b));
        assert_eq!(row_hash(&a), row_hash(&[Cell::new(b'a', 0), Cell::new(b'b', 0)]));
    }

    // ── Cells ──

    #[test]
    fn set_reports_change_and_clips() {
        let mut g = Grid::new(2, 3);
        assert!(g.set(1, 2, Cell::new(b'z', 0)));
        assert!(!g.set(1, 2, Cell::new(b'z', 0)));
        assert!(!g.set(2, 0, Cell::new(b'z', 0)));
        assert!(!g.set(0, 3, Cell::new(b'z', 0)));
        assert_eq!(g.get(1, 2), Some(Cell::new(b'z', 0)));
        assert_eq!(g.get(5, 5), None);
    }

    #[test]
    fn flags_accumulate_until_cleared() {
        let mut g = Grid::new(3, 1);
        g.mark(1, RowFlags::TOUCHED);
        g.mark(1, RowFlags::TRASHED);
        assert_eq!(g.flags(1), RowFlags::TOUCHED | RowFlags::TRASHED);
        g.clear_flags(1);
        assert!(g.flags(1).is_empty());
        g.mark_all(RowFlags::TRASHED);
        assert!((0..3).all(|r| g.flags(r) == RowFlags::TRASHED));
    }

    // ── Rotation ──

    #[test]
    fn rotate_up_blanks_the_bottom() {
        let mut g = Grid::new(5, 2);
        for (r, s) in ["aa", "bb", "cc", "dd", "ee"].iter().enumerate() {
            put(&mut g, r, s);
        }
        let hb = g.hash(2);
        g.rotate_up(1, 3, 1);
        let rows: Vec<_> = (0..5).map(|r| text(&g, r)).collect();
        assert_eq!(rows, ["aa", "cc", "dd", "  ", "ee"]);
        assert_eq!(g.hash(1), hb);
        assert_eq!(g.hash(3), BLANK_HASH);
    }

    #[test]
    fn rotate_down_blanks_the_top() {
        let mut g = Grid::new(4, 2);
        for (r, s) in ["aa", "bb", "cc", "dd"].iter().enumerate() {
            put(&mut g, r, s);
        }
        g.rotate_down(0, 3, 2);
        let rows: Vec<_> = (0..4).map(|r| text(&g, r)).collect();
        assert_eq!(rows, ["  ", "  ", "aa", "bb"]);
        assert_eq!(g.hash(0), BLANK_HASH);
    }

    #[test]
    fn degenerate_rotations_do_nothing() {
        let mut g = Grid::new(3, 2);
        put(&mut g, 0, "xy");
        let before = g.clone();
        g.rotate_up(0, 2, 0);
        g.rotate_up(2, 1, 1);
        g.rotate_down(0, 5, 1);
        g.rotate_down(0, 0, 2);
        assert_eq!(g, before);
    }

    #[test]
    fn copy_row_carries_the_hash() {
        let mut a = Grid::new(2, 3);
        let mut b = Grid::new(2, 3);
        put(&mut b, 1, "abc");
        a.copy_row(1, &b);
        assert_eq!(text(&a, 1), "abc");
        assert_eq!(a.hash(1), b.hash(1));
    }
}
