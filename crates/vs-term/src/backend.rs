// SPDX-License-Identifier: MIT
//
// OutputBackend — what the screen engine needs from a terminal.
//
// The refresh logic never talks to a device directly. It asks a backend to
// move the cursor, pick a color, write cells, erase and scroll, and it
// reads back a handful of facts (`Features`) to decide which of those
// tricks are worth trying.
//
// Three implementations live here:
//
//   TermDriver       the real thing: capability strings into a buffered tty
//   NullBackend      accepts everything and draws nothing
//   RecordingBackend keeps a log of every call and applies each one to an
//                    emulated cell grid, so tests can check both what was
//                    sent and what the terminal would end up showing
//
// Rows passed to `goto_rc` are relative to the top of the scroll region,
// as with a real terminal in origin mode.

use std::io::Write;

use crate::acs::AcsMap;
use crate::cell::Cell;
use crate::color::ColorTable;
use crate::driver::TermDriver;
use crate::error::Result;
use crate::grid::Grid;
use crate::terminal::Size;

// ─── Features ───────────────────────────────────────────────────────────────

/// The terminal facts the refresh algorithm branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Features {
    /// Colors are drawn with ANSI color sequences rather than attributes.
    pub ansi_colors: bool,
    /// Erasing fills with the current background color.
    pub bce: bool,
    /// Writing the last column wraps, so the bottom-right cell is unsafe.
    pub auto_margins: bool,
    /// Insert mode is available.
    pub can_insert: bool,
    /// A scroll region plus line insert/delete is available.
    pub can_scroll: bool,
    /// Erase-to-beginning-of-line is available.
    pub clear_bol: bool,
}

// ─── OutputBackend ──────────────────────────────────────────────────────────

/// Terminal primitives used by [`Screen`](crate::screen::Screen).
pub trait OutputBackend {
    fn size(&self) -> Size;

    /// Re-query the device size.
    fn refresh_size(&mut self) -> Size;

    fn features(&self) -> Features;

    /// How line-drawing glyphs map onto this terminal.
    fn acs_map(&self) -> AcsMap;

    fn colors(&self) -> &ColorTable;

    fn colors_mut(&mut self) -> &mut ColorTable;

    /// Whether two cells would look the same on this terminal.
    fn cells_match(&self, a: Cell, b: Cell) -> bool {
        self.colors().cells_match(a, b, self.features().ansi_colors)
    }

    /// Whether two color objects would look the same.
    fn same_look(&self, a: u8, b: u8) -> bool {
        self.colors().same_look(a, b, self.features().ansi_colors)
    }

    fn goto_rc(&mut self, row: i32, col: i32);

    /// Advance `n` columns on absolute row `row`.
    fn forward_cursor(&mut self, n: i32, row: i32);

    fn set_color(&mut self, obj: u8);

    fn normal_video(&mut self);

    /// Write cells at the cursor.
    fn write_cells(&mut self, cells: &[Cell]);

    /// Normal video, then erase to the end of the line.
    fn clear_to_eol(&mut self);

    /// Erase to the end of the line in the current color.
    fn erase_eol(&mut self);

    /// Erase from the start of the line through the cursor. `false` when
    /// the terminal cannot.
    fn del_bol(&mut self) -> bool;

    /// Clear the whole screen and home the cursor.
    fn cls(&mut self);

    fn set_scroll_region(&mut self, top: i32, bottom: i32);

    fn reset_scroll_region(&mut self);

    fn delete_lines(&mut self, n: i32);

    fn insert_lines(&mut self, n: i32);

    fn begin_insert(&mut self);

    fn end_insert(&mut self);

    fn init_video(&mut self);

    /// # Errors
    ///
    /// A failed flush.
    fn reset_video(&mut self) -> Result<()>;

    /// # Errors
    ///
    /// A failed flush.
    fn flush(&mut self) -> Result<()>;

    /// Bytes handed to the device so far, sent or still buffered.
    fn bytes_queued(&self) -> u64;

    /// Whether the blink attribute may be emitted. Ignored by backends
    /// without attributes.
    fn set_blink_mode(&mut self, _on: bool) {}
}

// ─── TermDriver ─────────────────────────────────────────────────────────────

impl<W: Write> OutputBackend for TermDriver<W> {
    fn size(&self) -> Size {
        Self::size(self)
    }

    fn refresh_size(&mut self) -> Size {
        Self::refresh_size(self)
    }

    fn features(&self) -> Features {
        let p = self.profile();
        Features {
            ansi_colors: self.uses_ansi_colors(),
            bce: p.bce,
            auto_margins: p.auto_margins,
            can_insert: !p.cannot_insert,
            can_scroll: p.can_scroll(),
            clear_bol: p.clear_bol.is_some(),
        }
    }

    fn acs_map(&self) -> AcsMap {
        let p = self.profile();
        AcsMap::new(p.has_alt_charset, p.acs_pairs.as_deref())
    }

    fn colors(&self) -> &ColorTable {
        Self::colors(self)
    }

    fn colors_mut(&mut self) -> &mut ColorTable {
        Self::colors_mut(self)
    }

    fn goto_rc(&mut self, row: i32, col: i32) {
        Self::goto_rc(self, row, col);
    }

    fn forward_cursor(&mut self, n: i32, row: i32) {
        Self::forward_cursor(self, n, row);
    }

    fn set_color(&mut self, obj: u8) {
        Self::set_color(self, obj);
    }

    fn normal_video(&mut self) {
        Self::normal_video(self);
    }

    fn write_cells(&mut self, cells: &[Cell]) {
        Self::write_cells(self, cells);
    }

    fn clear_to_eol(&mut self) {
        Self::clear_to_eol(self);
    }

    fn erase_eol(&mut self) {
        Self::erase_eol(self);
    }

    fn del_bol(&mut self) -> bool {
        Self::del_bol(self)
    }

    fn cls(&mut self) {
        self.clear_screen();
    }

    fn set_scroll_region(&mut self, top: i32, bottom: i32) {
        self.scroll_region(top, bottom);
    }

    fn reset_scroll_region(&mut self) {
        Self::reset_scroll_region(self);
    }

    fn delete_lines(&mut self, n: i32) {
        Self::delete_lines(self, n);
    }

    fn insert_lines(&mut self, n: i32) {
        Self::insert_lines(self, n);
    }

    fn begin_insert(&mut self) {
        Self::begin_insert(self);
    }

    fn end_insert(&mut self) {
        Self::end_insert(self);
    }

    fn init_video(&mut self) {
        Self::init_video(self);
    }

    fn reset_video(&mut self) -> Result<()> {
        Self::reset_video(self)
    }

    fn flush(&mut self) -> Result<()> {
        Self::flush(self)
    }

    fn bytes_queued(&self) -> u64 {
        self.output().bytes_queued()
    }

    fn set_blink_mode(&mut self, on: bool) {
        Self::set_blink_mode(self, on);
    }
}

// ─── NullBackend ────────────────────────────────────────────────────────────

/// A backend that draws nothing. Useful for headless runs and benchmarks
/// of the virtual screen alone.
#[derive(Debug, Clone)]
pub struct NullBackend {
    size: Size,
    colors: ColorTable,
}

impl NullBackend {
    #[must_use]
    pub fn new(size: Size) -> Self {
        Self { size, colors: ColorTable::default() }
    }
}

impl OutputBackend for NullBackend {
    fn size(&self) -> Size {
        self.size
    }

    fn refresh_size(&mut self) -> Size {
        self.size
    }

    fn features(&self) -> Features {
        Features::default()
    }

    fn acs_map(&self) -> AcsMap {
        AcsMap::ascii()
    }

    fn colors(&self) -> &ColorTable {
        &self.colors
    }

    fn colors_mut(&mut self) -> &mut ColorTable {
        &mut self.colors
    }

    fn goto_rc(&mut self, _row: i32, _col: i32) {}
    fn forward_cursor(&mut self, _n: i32, _row: i32) {}
    fn set_color(&mut self, _obj: u8) {}
    fn normal_video(&mut self) {}
    fn write_cells(&mut self, _cells: &[Cell]) {}
    fn clear_to_eol(&mut self) {}
    fn erase_eol(&mut self) {}

    fn del_bol(&mut self) -> bool {
        false
    }

    fn cls(&mut self) {}
    fn set_scroll_region(&mut self, _top: i32, _bottom: i32) {}
    fn reset_scroll_region(&mut self) {}
    fn delete_lines(&mut self, _n: i32) {}
    fn insert_lines(&mut self, _n: i32) {}
    fn begin_insert(&mut self) {}
    fn end_insert(&mut self) {}
    fn init_video(&mut self) {}

    fn reset_video(&mut self) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn bytes_queued(&self) -> u64 {
        0
    }
}

// ─── RecordingBackend ───────────────────────────────────────────────────────

/// One backend call, as recorded by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Goto(i32, i32),
    Forward(i32),
    SetColor(u8),
    Write(Vec<Cell>),
    ClearToEol,
    EraseEol,
    DelBol,
    Cls,
    ScrollRegion(i32, i32),
    ResetScrollRegion,
    DeleteLines(i32),
    InsertLines(i32),
    BeginInsert,
    EndInsert,
    InitVideo,
    ResetVideo,
    Flush,
}

/// A fake terminal: every call is logged and applied to an in-memory grid.
///
/// Erasing fills with the current color when the features say the
/// terminal has background-color erase, with color 0 otherwise.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    size: Size,
    features: Features,
    colors: ColorTable,
    ops: Vec<Op>,
    grid: Grid,
    cursor: (usize, usize),
    region: (usize, usize),
    pen: u8,
    inserting: bool,
    payload: usize,
}

impl RecordingBackend {
    /// An xterm-like fake: ANSI colors, auto margins, insert mode,
    /// scrolling and erase-to-BOL, no background-color erase.
    #[must_use]
    pub fn new(size: Size) -> Self {
        let features = Features {
            ansi_colors: true,
            bce: false,
            auto_margins: true,
            can_insert: true,
            can_scroll: true,
            clear_bol: true,
        };
        let (rows, cols) = (usize::from(size.rows), usize::from(size.cols));
        Self {
            size,
            features,
            colors: ColorTable::default(),
            ops: Vec::new(),
            grid: Grid::new(rows, cols),
            cursor: (0, 0),
            region: (0, rows.saturating_sub(1)),
            pen: 0,
            inserting: false,
            payload: 0,
        }
    }

    #[must_use]
    pub const fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Change the size the next `refresh_size` reports. The emulated
    /// screen is cleared, as a real terminal would be after a resize.
    pub fn resize(&mut self, size: Size) {
        self.size = size;
        let rows = usize::from(size.rows);
        self.grid = Grid::new(rows, usize::from(size.cols));
        self.region = (0, rows.saturating_sub(1));
        self.cursor = (0, 0);
    }

    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Drain the call log and the payload counter.
    pub fn take_ops(&mut self) -> Vec<Op> {
        self.payload = 0;
        std::mem::take(&mut self.ops)
    }

    /// Cells written since the last [`take_ops`](Self::take_ops).
    #[must_use]
    pub const fn payload_cells(&self) -> usize {
        self.payload
    }

    /// What the emulated terminal shows.
    #[must_use]
    pub const fn screen(&self) -> &Grid {
        &self.grid
    }

    /// Characters of row `r` of the emulated terminal.
    #[must_use]
    pub fn text(&self, r: usize) -> String {
        self.grid.row(r).iter().map(|c| char::from(c.ch())).collect()
    }

    #[must_use]
    pub const fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    const fn erase_color(&self) -> u8 {
        if self.features.bce { self.pen } else { 0 }
    }

    fn last_row(&self) -> usize {
        self.grid.rows().saturating_sub(1)
    }

    fn put(&mut self, cell: Cell) {
        let (r, c) = self.cursor;
        let cols = self.grid.cols();
        if r >= self.grid.rows() || c >= cols {
            return;
        }
        let corner = self.features.auto_margins && r == self.last_row() && c + 1 == cols;
        if self.inserting {
            self.grid.row_mut(r)[c..].rotate_right(1);
            self.grid.set(r, c, cell);
        } else if !corner {
            self.grid.set(r, c, cell);
        }
        self.cursor.1 = c + 1;
    }

    fn erase_span(&mut self, from: usize, to: usize) {
        let r = self.cursor.0;
        if r >= self.grid.rows() {
            return;
        }
        let blank = Cell::blank(self.erase_color());
        let to = to.min(self.grid.cols());
        if from < to {
            self.grid.row_mut(r)[from..to].fill(blank);
        }
    }

    fn band_count(&self, n: i32) -> Option<(usize, usize, usize)> {
        let top = self.cursor.0;
        let bottom = self.region.1;
        if top > bottom || bottom >= self.grid.rows() {
            return None;
        }
        let n = usize::try_from(n).ok()?.min(bottom - top + 1);
        (n > 0).then_some((top, bottom, n))
    }
}

fn clamp_index(n: i32) -> usize {
    usize::try_from(n).unwrap_or(0)
}

impl OutputBackend for RecordingBackend {
    fn size(&self) -> Size {
        self.size
    }

    fn refresh_size(&mut self) -> Size {
        self.size
    }

    fn features(&self) -> Features {
        self.features
    }

    fn acs_map(&self) -> AcsMap {
        AcsMap::ascii()
    }

    fn colors(&self) -> &ColorTable {
        &self.colors
    }

    fn colors_mut(&mut self) -> &mut ColorTable {
        &mut self.colors
    }

    fn goto_rc(&mut self, row: i32, col: i32) {
        self.ops.push(Op::Goto(row, col));
        self.cursor = (self.region.0 + clamp_index(row), clamp_index(col));
    }

    fn forward_cursor(&mut self, n: i32, _row: i32) {
        self.ops.push(Op::Forward(n));
        let n = clamp_index(n);
        if n <= 4 {
            // Short hops are written as spaces in normal video.
            self.pen = 0;
            for _ in 0..n {
                self.put(Cell::BLANK);
            }
        } else {
            self.cursor.1 += n;
        }
    }

    fn set_color(&mut self, obj: u8) {
        self.ops.push(Op::SetColor(obj));
        self.pen = obj;
    }

    fn normal_video(&mut self) {
        self.set_color(0);
    }

    fn write_cells(&mut self, cells: &[Cell]) {
        self.ops.push(Op::Write(cells.to_vec()));
        self.payload += cells.len();
        for &cell in cells {
            self.pen = cell.color();
            self.put(cell);
        }
    }

    fn clear_to_eol(&mut self) {
        self.ops.push(Op::ClearToEol);
        self.pen = 0;
        self.erase_span(self.cursor.1, usize::MAX);
    }

    fn erase_eol(&mut self) {
        self.ops.push(Op::EraseEol);
        self.erase_span(self.cursor.1, usize::MAX);
    }

    fn del_bol(&mut self) -> bool {
        self.ops.push(Op::DelBol);
        if !self.features.clear_bol {
            return false;
        }
        self.erase_span(0, self.cursor.1 + 1);
        true
    }

    fn cls(&mut self) {
        self.ops.push(Op::Cls);
        self.pen = 0;
        let rows = self.grid.rows();
        for r in 0..rows {
            self.grid.fill_row(r, Cell::BLANK);
        }
        self.region = (0, rows.saturating_sub(1));
        self.cursor = (0, 0);
    }

    fn set_scroll_region(&mut self, top: i32, bottom: i32) {
        self.ops.push(Op::ScrollRegion(top, bottom));
        self.region = (clamp_index(top), clamp_index(bottom));
        self.cursor = (self.region.0, 0);
    }

    fn reset_scroll_region(&mut self) {
        self.ops.push(Op::ResetScrollRegion);
        self.region = (0, self.last_row());
        self.cursor = (0, 0);
    }

    fn delete_lines(&mut self, n: i32) {
        self.ops.push(Op::DeleteLines(n));
        if let Some((top, bottom, n)) = self.band_count(n) {
            self.grid.rotate_up(top, bottom, n);
        }
    }

    fn insert_lines(&mut self, n: i32) {
        self.ops.push(Op::InsertLines(n));
        if let Some((top, bottom, n)) = self.band_count(n) {
            self.grid.rotate_down(top, bottom, n);
        }
    }

    fn begin_insert(&mut self) {
        self.ops.push(Op::BeginInsert);
        self.inserting = self.features.can_insert;
    }

    fn end_insert(&mut self) {
        self.ops.push(Op::EndInsert);
        self.inserting = false;
    }

    fn init_video(&mut self) {
        self.ops.push(Op::InitVideo);
    }

    fn reset_video(&mut self) -> Result<()> {
        self.ops.push(Op::ResetVideo);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.ops.push(Op::Flush);
        Ok(())
    }

    fn bytes_queued(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TermConfig;
    use pretty_assertions::assert_eq;
    use vs_caps::Database;

    fn cells(s: &str, color: u8) -> Vec<Cell> {
        s.bytes().map(|b| Cell::new(b, color)).collect()
    }

    // ── RecordingBackend ──

    #[test]
    fn writes_land_at_the_cursor() {
        let mut b = RecordingBackend::new(Size::new(3, 10));
        b.goto_rc(1, 2);
        b.write_cells(&cells("abc", 0));
        assert_eq!(b.text(1), "  abc     ");
        assert_eq!(b.cursor(), (1, 5));
        assert_eq!(b.payload_cells(), 3);
        assert_eq!(b.ops()[0], Op::Goto(1, 2));
    }

    #[test]
    fn bottom_right_corner_is_never_written() {
        let mut b = RecordingBackend::new(Size::new(2, 4));
        b.goto_rc(1, 0);
        b.write_cells(&cells("wxyz", 0));
        assert_eq!(b.text(1), "wxy ");
    }

    #[test]
    fn insert_mode_shifts_the_row() {
        let mut b = RecordingBackend::new(Size::new(1, 4));
        b.goto_rc(0, 0);
        b.write_cells(&cells("abz", 0));
        b.goto_rc(0, 2);
        b.begin_insert();
        b.write_cells(&cells("c", 0));
        b.end_insert();
        assert_eq!(b.text(0), "abcz");
    }

    #[test]
    fn erase_follows_bce() {
        let mut b = RecordingBackend::new(Size::new(1, 4));
        b.goto_rc(0, 1);
        b.set_color(3);
        b.erase_eol();
        assert_eq!(b.screen().get(0, 2), Some(Cell::blank(0)));

        let f = Features { bce: true, ..b.features() };
        let mut b = RecordingBackend::new(Size::new(1, 4)).with_features(f);
        b.goto_rc(0, 1);
        b.set_color(3);
        b.erase_eol();
        assert_eq!(b.screen().get(0, 0), Some(Cell::BLANK));
        assert_eq!(b.screen().get(0, 2), Some(Cell::blank(3)));
    }

    #[test]
    fn delete_lines_inside_a_region() {
        let mut b = RecordingBackend::new(Size::new(4, 2));
        for (r, s) in ["aa", "bb", "cc", "dd"].iter().enumerate() {
            b.goto_rc(i32::try_from(r).unwrap(), 0);
            b.write_cells(&cells(s, 0));
        }
        b.set_scroll_region(1, 2);
        b.goto_rc(0, 0);
        b.delete_lines(1);
        b.reset_scroll_region();
        let rows: Vec<_> = (0..4).map(|r| b.text(r)).collect();
        assert_eq!(rows, ["aa", "cc", "  ", "d "]);
    }

    #[test]
    fn insert_lines_pushes_down() {
        let mut b = RecordingBackend::new(Size::new(3, 2));
        b.goto_rc(0, 0);
        b.write_cells(&cells("aa", 0));
        b.set_scroll_region(0, 2);
        b.goto_rc(0, 0);
        b.insert_lines(2);
        assert_eq!(b.text(2), "aa");
        assert_eq!(b.text(0), "  ");
    }

    #[test]
    fn take_ops_resets_the_payload() {
        let mut b = RecordingBackend::new(Size::new(1, 4));
        b.write_cells(&cells("ab", 0));
        assert_eq!(b.take_ops().len(), 1);
        assert_eq!(b.payload_cells(), 0);
        assert!(b.ops().is_empty());
    }

    // ── TermDriver ──

    #[test]
    fn driver_features_follow_the_profile() {
        let cfg = TermConfig::from_lookup(|_| None).with_term("vt102");
        let d = TermDriver::new(&Database::vtxxx(false), &cfg, Vec::new()).unwrap();
        let f = OutputBackend::features(&d);
        assert!(f.auto_margins);
        assert!(f.can_insert);
        assert!(f.can_scroll);
        assert!(f.clear_bol);
        assert!(!f.ansi_colors);
        assert!(!OutputBackend::acs_map(&d).is_native());
    }

    #[test]
    fn null_backend_is_inert() {
        let mut b = NullBackend::new(Size::new(5, 5));
        b.write_cells(&cells("x", 0));
        assert!(b.flush().is_ok());
        assert_eq!(b.bytes_queued(), 0);
        assert!(!b.features().can_scroll);
    }
}
