// SPDX-License-Identifier: MIT
//
// Screen — the virtual screen applications draw on.
//
// Drawing never touches the terminal. Every write lands in the desired
// grid and flags its row; `refresh` later compares that grid with what
// the terminal is known to show and sends the difference through the
// backend in one flush.
//
// Coordinates:
//
//   - The application addresses a virtual plane. `set_screen_start` moves
//     the window onto it, so a pager can draw a whole document at its own
//     row numbers and let the screen show only the visible part.
//
//   - Everything outside the window is clipped silently. A string that
//     starts left of the window still advances the cursor through the
//     hidden columns, so the visible part lands where it would have.
//
// Bytes:
//
//   - Printable ASCII is stored as-is. Control bytes show as `^X`, DEL as
//     `^?`, tabs expand to the tab width. High bytes below the eight-bit
//     threshold show as `<XX>`.
//
//   - In the alternate character set every ASCII byte is a line-drawing
//     glyph and goes through the terminal's ACS map. When the terminal has
//     no map of its own the ASCII stand-ins are stored as plain text.
//
// Full redraws:
//
//   The first refresh, a color table change, `touch_screen` and `cls` all
//   clear the physical screen and redraw every row. `touch_lines` redraws
//   selected rows from a cleared line without clearing the rest.

use std::fmt;
use std::ops::Range;

use crate::acs::{AcsMap, glyph};
use crate::backend::OutputBackend;
use crate::cell::{Cell, MAX_CELL_COLOR};
use crate::color::{Attr, ColorEntry, Style};
use crate::config::{Newline, ScreenOptions};
use crate::diff::{self, RefreshStats, coord};
use crate::error::Result;
use crate::grid::{Grid, RowFlags};
use crate::signal::SignalGuard;
use crate::terminal::Size;

/// Color object drawn by [`Screen::reverse_video`].
const REVERSE_COLOR: u8 = 1;

/// Grid indices covered by `start..start + n` on an axis of `len` cells
/// whose first cell sits at virtual coordinate `origin`. `None` when
/// nothing is visible.
fn clip(start: i32, n: i32, origin: i32, len: usize) -> Option<Range<usize>> {
    if n < 0 {
        return None;
    }
    let len = i64::try_from(len).ok()?;
    let lo = (i64::from(start) - i64::from(origin)).max(0);
    let hi = (i64::from(start) + i64::from(n) - i64::from(origin)).min(len);
    if lo >= hi {
        return None;
    }
    Some(usize::try_from(lo).ok()?..usize::try_from(hi).ok()?)
}

/// Grid index of virtual coordinate `v`, if visible.
fn axis(v: i32, origin: i32, len: usize) -> Option<usize> {
    clip(v, 1, origin, len).map(|r| r.start)
}

/// `v` on an axis of `len` cells, pulled inside it.
fn clamp_axis(v: i32, origin: i32, len: usize) -> i32 {
    v.saturating_sub(origin).clamp(0, coord(len.saturating_sub(1)))
}

fn dims(size: Size) -> (usize, usize) {
    (usize::from(size.rows), usize::from(size.cols))
}

fn hex_digits(b: u8) -> [u8; 2] {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    [HEX[usize::from(b >> 4)], HEX[usize::from(b & 0x0F)]]
}

// ─── Screen ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Screen<B: OutputBackend> {
    backend: B,
    size: Size,
    /// What the terminal shows.
    displayed: Grid,
    /// What the application wants it to show.
    desired: Grid,
    opts: ScreenOptions,
    acs: AcsMap,
    row: i32,
    col: i32,
    start_row: i32,
    start_col: i32,
    color: u8,
    alt: bool,
    cls_pending: bool,
    trashed: bool,
    suspended: bool,
    inited: bool,
}

impl<B: OutputBackend> Screen<B> {
    /// Take over the terminal with default options.
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, ScreenOptions::default())
    }

    /// Take over the terminal: initialize video and size both grids from
    /// the backend. Nothing is drawn until the first refresh, which clears
    /// the screen.
    pub fn with_options(mut backend: B, opts: ScreenOptions) -> Self {
        let _guard = SignalGuard::block();
        backend.set_blink_mode(opts.blink_mode);
        backend.init_video();
        let size = backend.size();
        let (rows, cols) = dims(size);
        let acs = backend.acs_map();
        log::debug!(
            "screen {rows}x{cols}, {} line drawing",
            if acs.is_native() { "native" } else { "ascii" }
        );
        Self {
            backend,
            size,
            displayed: Grid::new(rows, cols),
            desired: Grid::new(rows, cols),
            opts,
            acs,
            row: 0,
            col: 0,
            start_row: 0,
            start_col: 0,
            color: 0,
            alt: false,
            cls_pending: true,
            trashed: true,
            suspended: false,
            inited: true,
        }
    }

    // ── Lifecycle ──

    /// Rebuild both grids at the backend's current size, typically after
    /// a resize. The cursor, origin and color return to zero and the next
    /// refresh redraws everything.
    pub fn reinit(&mut self) {
        let _guard = SignalGuard::block();
        if !self.inited {
            self.backend.init_video();
            self.inited = true;
        }
        self.size = self.backend.refresh_size();
        let (rows, cols) = dims(self.size);
        log::debug!("screen resized to {rows}x{cols}");
        self.displayed = Grid::new(rows, cols);
        self.desired = Grid::new(rows, cols);
        self.acs = self.backend.acs_map();
        self.row = 0;
        self.col = 0;
        self.start_row = 0;
        self.start_col = 0;
        self.color = 0;
        self.alt = false;
        self.cls_pending = true;
        self.trashed = true;
    }

    /// Give the terminal back. Refreshes do nothing until
    /// [`reinit`](Self::reinit); drawing still lands in the grid.
    pub fn reset(&mut self) -> Result<()> {
        if !self.inited {
            return Ok(());
        }
        let _guard = SignalGuard::block();
        self.inited = false;
        self.backend.reset_video()
    }

    /// Restore the terminal before the process stops.
    pub fn suspend(&mut self) -> Result<()> {
        if self.suspended || !self.inited {
            return Ok(());
        }
        let _guard = SignalGuard::block();
        self.suspended = true;
        self.backend.reset_video()
    }

    /// Take the terminal back after [`suspend`](Self::suspend) and redraw
    /// it from scratch.
    pub fn resume(&mut self) -> Result<RefreshStats> {
        if !self.suspended {
            return Ok(RefreshStats::default());
        }
        let _guard = SignalGuard::block();
        self.suspended = false;
        self.backend.init_video();
        self.cls_pending = true;
        self.touch_screen();
        self.refresh()
    }

    #[inline]
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    #[inline]
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.inited
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn options(&self) -> &ScreenOptions {
        &self.opts
    }

    #[inline]
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct access to the backend. Output sent this way is not tracked
    /// by the displayed grid; call [`touch_screen`](Self::touch_screen)
    /// afterwards if it changed what the terminal shows.
    #[inline]
    pub const fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub fn into_backend(self) -> B {
        self.backend
    }

    // ── Cursor ──

    pub const fn goto_rc(&mut self, row: i32, col: i32) {
        self.row = row;
        self.col = col;
    }

    #[inline]
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    #[inline]
    #[must_use]
    pub const fn col(&self) -> i32 {
        self.col
    }

    pub const fn forward(&mut self, n: i32) {
        self.col = self.col.saturating_add(n);
    }

    /// Move the window onto the virtual plane. Returns the previous
    /// origin.
    pub const fn set_screen_start(&mut self, row: i32, col: i32) -> (i32, i32) {
        let old = (self.start_row, self.start_col);
        self.start_row = row;
        self.start_col = col;
        old
    }

    // ── Color ──

    /// Draw subsequent text with color object `obj` (0..=127).
    pub const fn set_color(&mut self, obj: u8) {
        self.color = obj & MAX_CELL_COLOR;
    }

    pub const fn normal_video(&mut self) {
        self.set_color(0);
    }

    pub const fn reverse_video(&mut self) {
        self.set_color(REVERSE_COLOR);
    }

    #[inline]
    #[must_use]
    pub const fn current_color(&self) -> u8 {
        self.color
    }

    /// Switch subsequent text to line-drawing glyphs.
    pub const fn set_char_set(&mut self, alt: bool) {
        self.alt = alt;
    }

    pub fn define_color(&mut self, obj: u8, style: Style) {
        self.backend.colors_mut().set_style(obj, style);
        self.touch_screen();
    }

    /// Define `obj` by color names (`"red"`, `"brightblue"`, `"color42"`,
    /// empty for the terminal default). Returns `false` for an unknown
    /// name.
    pub fn define_color_names(&mut self, obj: u8, fg: &str, bg: &str) -> bool {
        let known = self.backend.colors_mut().set_named(obj, fg, bg);
        if known {
            self.touch_screen();
        }
        known
    }

    /// Make `obj` emit `esc` verbatim.
    pub fn define_color_esc(&mut self, obj: u8, esc: &[u8]) {
        self.backend.colors_mut().set_escape(obj, esc);
        self.touch_screen();
    }

    /// The attributes `obj` uses on a monochrome terminal.
    pub fn define_mono(&mut self, obj: u8, attrs: Attr) {
        self.backend.colors_mut().set_mono(obj, attrs);
        self.touch_screen();
    }

    pub fn add_color_attribute(&mut self, obj: u8, attrs: Attr) {
        self.backend.colors_mut().add_attributes(obj, attrs);
        self.touch_screen();
    }

    #[must_use]
    pub fn color(&self, obj: u8) -> &ColorEntry {
        self.backend.colors().entry(obj)
    }

    // ── Writing ──

    /// Store one cell at a virtual position without moving the cursor.
    pub fn set_cell(&mut self, row: i32, col: i32, ch: u8, color: u8) {
        let (Some(r), Some(c)) = (self.grid_row(row), self.grid_col(col)) else {
            return;
        };
        self.store(r, c, Cell::new(ch, color));
    }

    /// Write bytes at the cursor, advancing it. What a newline does is
    /// set by [`ScreenOptions::newline`].
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        loop {
            let Some(r) = self.grid_row(self.row) else {
                return;
            };
            let (consumed, at_newline) = self.write_row(r, rest);
            rest = &rest[consumed..];
            if matches!(self.opts.newline, Newline::Ignored | Newline::Printable) {
                return;
            }
            if !at_newline {
                // The row filled up; the rest of this line is clipped.
                let Some(nl) = rest.iter().position(|&b| b == b'\n') else {
                    return;
                };
                rest = &rest[nl + 1..];
            }
            self.row = self.row.saturating_add(1);
            self.col = 0;
            if self.opts.newline == Newline::Scroll
                && self.row == self.start_row.saturating_add(coord(self.desired.rows()))
            {
                self.scroll_up();
            }
        }
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    pub fn write_char(&mut self, b: u8) {
        self.write_bytes(&[b]);
    }

    /// Write exactly `n` columns of `s`: truncated if longer, padded with
    /// spaces if shorter.
    pub fn write_nstr(&mut self, s: &str, n: usize) {
        let bytes = s.as_bytes();
        let width = bytes.len().min(n);
        self.write_bytes(&bytes[..width]);
        let room = i64::from(self.start_col) + i64::from(coord(self.desired.cols())) - i64::from(self.col);
        let pad = (n - width).min(usize::try_from(room).unwrap_or(0));
        if pad > 0 {
            self.write_bytes(&vec![b' '; pad]);
        }
    }

    /// Write `s` into the `dr` × `dc` box at (`row`, `col`), breaking at
    /// newlines and every `dc` bytes. With `fill`, lines that end at a
    /// newline or at the end of the string are padded to the box width.
    pub fn write_wrapped(&mut self, s: &str, row: i32, col: i32, dr: usize, dc: usize, fill: bool) {
        if dr == 0 || dc == 0 {
            return;
        }
        let bytes = s.as_bytes();
        let (mut row, mut dr) = (row, dr);
        let mut start = 0;
        let mut p = 0;
        loop {
            let ch = bytes.get(p).copied();
            if matches!(ch, None | Some(b'\n')) {
                self.goto_rc(row, col);
                self.write_bytes(&bytes[start..p]);
                let pad = dc.saturating_sub(p - start).min(self.desired.cols());
                if fill && pad > 0 {
                    self.write_bytes(&vec![b' '; pad]);
                }
                if ch.is_none() || dr == 1 {
                    break;
                }
                row = row.saturating_add(1);
                dr -= 1;
                p += 1;
                start = p;
                continue;
            }
            if p - start == dc {
                self.goto_rc(row, col);
                self.write_bytes(&bytes[start..p]);
                if dr == 1 {
                    break;
                }
                row = row.saturating_add(1);
                dr -= 1;
                start = p;
                continue;
            }
            p += 1;
        }
    }

    /// Fill the current row from the cursor. Returns the number of bytes
    /// consumed and whether writing stopped at a newline.
    fn write_row(&mut self, r: usize, bytes: &[u8]) -> (usize, bool) {
        let opts = self.opts;
        let start_col = self.start_col;
        let max_col = start_col.saturating_add(coord(self.desired.cols()));
        let color = self.color;
        let alt = self.alt;
        let acs = &self.acs;
        let acs_bit = alt && acs.is_native();
        let desired = &mut self.desired;

        let mut col = self.col;
        let mut touched = false;
        let mut consumed = 0;
        let mut at_newline = false;

        // Store `b` at `col` and advance; false once the row is full.
        let mut put = |col: &mut i32, b: u8| {
            if *col >= max_col {
                return false;
            }
            if *col >= start_col {
                let cell = if acs_bit { Cell::acs(b, color) } else { Cell::new(b, color) };
                if let Ok(c) = usize::try_from(col.abs_diff(start_col)) {
                    touched |= desired.set(r, c, cell);
                }
            }
            *col += 1;
            true
        };

        while consumed < bytes.len() {
            let ch = bytes[consumed];
            consumed += 1;
            let fits = match ch {
                _ if alt && ch < 0x80 => put(&mut col, acs.map(ch)),
                0x20..=0x7E => put(&mut col, ch),
                b'\t' if opts.tab_width > 0 => {
                    let width = coord(opts.tab_width);
                    loop {
                        if !put(&mut col, b' ') {
                            break false;
                        }
                        if col.rem_euclid(width) == 0 {
                            break true;
                        }
                    }
                }
                b'\n' if opts.newline != Newline::Printable => {
                    at_newline = true;
                    break;
                }
                0x7F => put(&mut col, b'^') && put(&mut col, b'?'),
                0x00..=0x1F => put(&mut col, b'^') && put(&mut col, ch + b'@'),
                _ if opts.wide_chars || ch >= opts.display_eight_bit => put(&mut col, ch),
                _ => {
                    let [hi, lo] = hex_digits(ch);
                    put(&mut col, b'<') && put(&mut col, hi) && put(&mut col, lo) && put(&mut col, b'>')
                }
            };
            if !fits {
                break;
            }
        }

        if touched {
            self.desired.mark(r, RowFlags::TOUCHED);
        }
        self.col = col;
        (consumed, at_newline)
    }

    /// Shift the whole desired grid up one row for a newline at the
    /// bottom.
    fn scroll_up(&mut self) {
        let rows = self.desired.rows();
        if rows == 0 {
            return;
        }
        self.desired.rotate_up(0, rows - 1, 1);
        self.desired.fill_row(rows - 1, Cell::blank(self.color));
        self.desired.mark_all(RowFlags::TOUCHED);
        self.row -= 1;
    }

    // ── Erasing ──

    /// Blank from the cursor to the end of its row in the current color.
    pub fn erase_eol(&mut self) {
        let Some(r) = self.grid_row(self.row) else {
            return;
        };
        let c = usize::try_from(i64::from(self.col) - i64::from(self.start_col)).unwrap_or(0);
        if c >= self.desired.cols() {
            return;
        }
        let blank = Cell::blank(self.color);
        self.desired.row_mut(r)[c..].fill(blank);
        self.desired.mark(r, RowFlags::TOUCHED);
    }

    /// Blank from the cursor to the end of the screen.
    pub fn erase_eos(&mut self) {
        self.erase_eol();
        let below = i64::from(self.row) - i64::from(self.start_row) + 1;
        let first = usize::try_from(below).unwrap_or(0);
        self.clear_rows(first, Cell::blank(self.color));
    }

    /// Blank the whole screen in color 0 and clear the terminal at the
    /// next refresh. The current color becomes 0.
    pub fn cls(&mut self) {
        self.color = 0;
        self.clear_rows(0, Cell::BLANK);
        self.cls_pending = true;
    }

    fn clear_rows(&mut self, first: usize, blank: Cell) {
        for r in first..self.desired.rows() {
            self.desired.fill_row(r, blank);
            self.desired.mark(r, RowFlags::TOUCHED);
        }
    }

    // ── Drawing ──

    /// Put one line-drawing glyph at (`row`, `col`). The cursor ends just
    /// right of it.
    pub fn draw_object(&mut self, row: i32, col: i32, glyph: u8) {
        self.goto_rc(row, col);
        if let Some((r, c)) = self.cursor_cell() {
            let cell = self.glyph_cell(glyph);
            self.store(r, c, cell);
        }
        self.col = col.saturating_add(1);
    }

    /// A horizontal line of `n` cells from the cursor.
    pub fn draw_hline(&mut self, n: usize) {
        let n = coord(n);
        let final_col = self.col.saturating_add(n);
        if let Some(r) = self.grid_row(self.row) {
            if let Some(cols) = clip(self.col, n, self.start_col, self.desired.cols()) {
                let cell = self.glyph_cell(glyph::HLINE);
                for c in cols {
                    self.store(r, c, cell);
                }
            }
        }
        self.col = final_col;
    }

    /// A vertical line of `n` cells from the cursor down. The column stays.
    pub fn draw_vline(&mut self, n: usize) {
        let n = coord(n);
        let final_row = self.row.saturating_add(n);
        if let Some(c) = self.grid_col(self.col) {
            if let Some(rows) = clip(self.row, n, self.start_row, self.desired.rows()) {
                let cell = self.glyph_cell(glyph::VLINE);
                for r in rows {
                    self.store(r, c, cell);
                }
            }
        }
        self.row = final_row;
    }

    /// Outline the `dr` × `dc` box whose top-left corner is (`row`, `col`).
    pub fn draw_box(&mut self, row: i32, col: i32, dr: usize, dc: usize) {
        if dr == 0 || dc == 0 {
            return;
        }
        let (dr, dc) = (dr - 1, dc - 1);
        self.goto_rc(row, col);
        self.draw_hline(dc);
        self.draw_vline(dr);
        self.goto_rc(row, col);
        self.draw_vline(dr);
        self.draw_hline(dc);
        let bottom = row.saturating_add(coord(dr));
        let right = col.saturating_add(coord(dc));
        self.draw_object(row, col, glyph::ULCORN);
        self.draw_object(row, right, glyph::URCORN);
        self.draw_object(bottom, col, glyph::LLCORN);
        self.draw_object(bottom, right, glyph::LRCORN);
        self.goto_rc(row, col);
    }

    /// Fill the `dr` × `dc` box at (`row`, `col`) with `ch` in the current
    /// color and charset. The cursor ends at the box's corner.
    pub fn fill_region(&mut self, row: i32, col: i32, dr: usize, dc: usize, ch: u8) {
        let rows = clip(row, coord(dr), self.start_row, self.desired.rows());
        let cols = clip(col, coord(dc), self.start_col, self.desired.cols());
        if let (Some(rows), Some(cols)) = (rows, cols) {
            let run = vec![ch; cols.len()];
            let first_col = self.start_col.saturating_add(coord(cols.start));
            for r in rows {
                self.goto_rc(self.start_row.saturating_add(coord(r)), first_col);
                self.write_bytes(&run);
            }
        }
        self.goto_rc(row, col);
    }

    /// Recolor the `dr` × `dc` box at (`row`, `col`), keeping its glyphs.
    pub fn set_color_in_region(&mut self, color: u8, row: i32, col: i32, dr: usize, dc: usize) {
        let rows = clip(row, coord(dr), self.start_row, self.desired.rows());
        let cols = clip(col, coord(dc), self.start_col, self.desired.cols());
        let (Some(rows), Some(cols)) = (rows, cols) else {
            return;
        };
        for r in rows {
            for cell in &mut self.desired.row_mut(r)[cols.clone()] {
                *cell = cell.with_color(color);
            }
            self.desired.mark(r, RowFlags::TOUCHED);
        }
    }

    // ── Raw access ──

    /// The cell under the cursor.
    #[must_use]
    pub fn char_at(&self) -> Option<Cell> {
        let (r, c) = self.cursor_cell()?;
        self.desired.get(r, c)
    }

    /// The desired cells of a virtual row.
    #[must_use]
    pub fn read_raw(&self, row: i32) -> Option<&[Cell]> {
        self.grid_row(row).map(|r| self.desired.row(r))
    }

    /// Store cells at the cursor without interpretation. Returns how many
    /// fit on the row. The cursor does not move.
    pub fn write_raw(&mut self, cells: &[Cell]) -> usize {
        let Some((r, c)) = self.cursor_cell() else {
            return 0;
        };
        let (n, changed) = {
            let dest = &mut self.desired.row_mut(r)[c..];
            let n = cells.len().min(dest.len());
            let changed = dest[..n] != cells[..n];
            if changed {
                dest[..n].copy_from_slice(&cells[..n]);
            }
            (n, changed)
        };
        if changed {
            self.desired.mark(r, RowFlags::TOUCHED);
        }
        n
    }

    // ── Invalidation ──

    /// Redraw rows `row..row + n` from scratch at the next refresh.
    pub fn touch_lines(&mut self, row: i32, n: usize) {
        if let Some(rows) = clip(row, coord(n), self.start_row, self.desired.rows()) {
            for r in rows {
                self.desired.mark(r, RowFlags::TRASHED);
            }
        }
    }

    /// Clear and redraw the whole terminal at the next refresh.
    pub const fn touch_screen(&mut self) {
        self.trashed = true;
    }

    // ── Refresh ──

    /// Bring the terminal up to date with the desired grid.
    pub fn refresh(&mut self) -> Result<RefreshStats> {
        if !self.inited || self.suspended {
            return Ok(RefreshStats::default());
        }
        let _guard = SignalGuard::block();
        let queued = self.backend.bytes_queued();
        let rows = self.desired.rows();
        let mut stats = RefreshStats::default();

        if self.trashed {
            self.cls_pending = true;
            self.desired.mark_all(RowFlags::TRASHED);
        }
        for r in 0..rows {
            if !self.desired.flags(r).is_empty() {
                self.desired.rehash(r);
            }
        }

        if self.cls_pending {
            self.backend.normal_video();
            self.backend.cls();
        } else if self.backend.features().can_scroll {
            stats.scrolls = diff::try_scroll(&mut self.backend, &mut self.displayed, &mut self.desired);
        }

        for r in 0..rows {
            let flags = self.desired.flags(r);
            if flags.is_empty() {
                continue;
            }
            stats.rows_examined += 1;
            if self.cls_pending || flags.contains(RowFlags::TRASHED) {
                if !self.cls_pending {
                    self.backend.goto_rc(coord(r), 0);
                    self.backend.clear_to_eol();
                }
                self.displayed.fill_row(r, Cell::BLANK);
            }
            let redrawn = diff::smart_puts(
                &mut self.backend,
                self.desired.row(r),
                self.displayed.row(r),
                r,
                rows,
                self.opts.wide_chars,
            );
            if redrawn {
                stats.rows_redrawn += 1;
            }
            self.displayed.copy_row(r, &self.desired);
            self.desired.clear_flags(r);
        }

        let row = clamp_axis(self.row, self.start_row, rows);
        let col = clamp_axis(self.col, self.start_col, self.desired.cols());
        self.backend.goto_rc(row, col);
        self.cls_pending = false;
        self.trashed = false;

        let flushed = self.backend.flush();
        stats.bytes_written = self.backend.bytes_queued().saturating_sub(queued);
        flushed?;
        log::trace!(
            "refresh: {} rows examined, {} redrawn, {} scrolls, {} bytes",
            stats.rows_examined,
            stats.rows_redrawn,
            stats.scrolls,
            stats.bytes_written
        );
        Ok(stats)
    }

    // ── Helpers ──

    fn grid_row(&self, row: i32) -> Option<usize> {
        axis(row, self.start_row, self.desired.rows())
    }

    fn grid_col(&self, col: i32) -> Option<usize> {
        axis(col, self.start_col, self.desired.cols())
    }

    fn cursor_cell(&self) -> Option<(usize, usize)> {
        Some((self.grid_row(self.row)?, self.grid_col(self.col)?))
    }

    fn glyph_cell(&self, glyph: u8) -> Cell {
        let ch = self.acs.map(glyph);
        if self.acs.is_native() { Cell::acs(ch, self.color) } else { Cell::new(ch, self.color) }
    }

    fn store(&mut self, r: usize, c: usize, cell: Cell) {
        if self.desired.set(r, c, cell) {
            self.desired.mark(r, RowFlags::TOUCHED);
        }
    }
}

/// `write!` support.
impl<B: OutputBackend> fmt::Write for Screen<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use super::*;
    use crate::backend::{Op, RecordingBackend};
    use pretty_assertions::assert_eq;

    fn screen(rows: u16, cols: u16) -> Screen<RecordingBackend> {
        Screen::new(RecordingBackend::new(Size::new(rows, cols)))
    }

    fn with_options(rows: u16, cols: u16, opts: ScreenOptions) -> Screen<RecordingBackend> {
        Screen::with_options(RecordingBackend::new(Size::new(rows, cols)), opts)
    }

    fn row_bytes(s: &Screen<RecordingBackend>, row: i32) -> Vec<u8> {
        s.read_raw(row).map(|cells| cells.iter().map(|c| c.ch()).collect()).unwrap_or_default()
    }

    fn row_text(s: &Screen<RecordingBackend>, row: i32) -> String {
        String::from_utf8_lossy(&row_bytes(s, row)).into_owned()
    }

    fn row_colors(s: &Screen<RecordingBackend>, row: i32) -> Vec<u8> {
        s.read_raw(row).map(|cells| cells.iter().map(|c| c.color()).collect()).unwrap_or_default()
    }

    /// Refresh and drain the call log.
    fn settle(s: &mut Screen<RecordingBackend>) -> RefreshStats {
        let stats = s.refresh().unwrap();
        s.backend_mut().take_ops();
        stats
    }

    // ── Lifecycle ──

    #[test]
    fn first_refresh_clears_and_draws() {
        let mut s = screen(4, 10);
        s.goto_rc(1, 2);
        s.write_str("hello");
        let stats = s.refresh().unwrap();
        let b = s.backend();
        assert_eq!(b.ops()[0], Op::InitVideo);
        assert!(b.ops().contains(&Op::Cls));
        assert_eq!(b.text(1), "  hello   ");
        assert_eq!(stats.rows_examined, 4);
        assert_eq!(stats.rows_redrawn, 1);
    }

    #[test]
    fn unchanged_refresh_only_places_the_cursor() {
        let mut s = screen(4, 10);
        s.goto_rc(1, 2);
        s.write_str("hello");
        settle(&mut s);
        let stats = s.refresh().unwrap();
        assert!(stats.is_idle());
        assert_eq!(s.backend().ops(), [Op::Goto(1, 7), Op::Flush]);
    }

    #[test]
    fn cursor_is_clamped_onto_the_screen() {
        let mut s = screen(3, 5);
        settle(&mut s);
        s.goto_rc(9, -4);
        s.refresh().unwrap();
        assert_eq!(s.backend().ops(), [Op::Goto(2, 0), Op::Flush]);
    }

    #[test]
    fn suspend_and_resume() {
        let mut s = screen(2, 6);
        s.write_str("hi");
        settle(&mut s);

        s.suspend().unwrap();
        s.suspend().unwrap();
        assert!(s.is_suspended());
        assert_eq!(s.backend_mut().take_ops(), [Op::ResetVideo]);

        assert!(s.refresh().unwrap().is_idle());
        assert!(s.backend().ops().is_empty());

        let stats = s.resume().unwrap();
        let ops = s.backend_mut().take_ops();
        assert_eq!(ops[0], Op::InitVideo);
        assert!(ops.contains(&Op::Cls));
        assert_eq!(stats.rows_redrawn, 1);
        assert_eq!(s.backend().text(0), "hi    ");
    }

    #[test]
    fn reset_stops_refreshing_until_reinit() {
        let mut s = screen(2, 4);
        settle(&mut s);
        s.reset().unwrap();
        assert!(!s.is_initialized());
        assert_eq!(s.backend_mut().take_ops(), [Op::ResetVideo]);
        s.write_str("ab");
        assert!(s.refresh().unwrap().is_idle());
        assert!(s.backend().ops().is_empty());

        s.reinit();
        assert!(s.is_initialized());
        assert_eq!(s.backend().ops(), [Op::InitVideo]);
    }

    #[test]
    fn reinit_follows_the_backend_size() {
        let mut s = screen(4, 10);
        s.goto_rc(2, 3);
        s.set_color(6);
        settle(&mut s);
        s.backend_mut().resize(Size::new(3, 5));
        s.reinit();
        assert_eq!(s.size(), Size::new(3, 5));
        assert_eq!(s.read_raw(2).map(<[Cell]>::len), Some(5));
        assert_eq!(s.read_raw(3), None);
        assert_eq!((s.row(), s.col(), s.current_color()), (0, 0, 0));
        s.refresh().unwrap();
        assert!(s.backend().ops().contains(&Op::Cls));
    }

    // ── Writing ──

    #[test]
    fn control_and_high_bytes_are_made_visible() {
        let mut s = screen(1, 20);
        s.write_str("a\tb");
        assert_eq!(s.col(), 9);
        s.write_bytes(b"\x01\x7f");
        s.write_bytes(&[0x85, 0xE9]);
        assert_eq!(row_bytes(&s, 0), b"a       b^A^?<85>\xE9  ".to_vec());
        assert_eq!(s.col(), 18);
    }

    #[test]
    fn tab_width_zero_shows_tabs() {
        let mut s = with_options(1, 6, ScreenOptions::default().tab_width(0));
        s.write_str("\tx");
        assert_eq!(row_text(&s, 0), "^Ix   ");
    }

    #[test]
    fn eight_bit_threshold_is_configurable() {
        let mut s = with_options(1, 4, ScreenOptions::default().display_eight_bit(0x80));
        s.write_bytes(&[0x85]);
        assert_eq!(row_bytes(&s, 0), b"\x85   ".to_vec());
    }

    #[test]
    fn newline_stops_by_default() {
        let mut s = screen(2, 4);
        s.write_str("ab\ncd");
        assert_eq!(row_text(&s, 0), "ab  ");
        assert_eq!(row_text(&s, 1), "    ");
        assert_eq!((s.row(), s.col()), (0, 2));
    }

    #[test]
    fn newline_wraps_and_clips_long_lines() {
        let mut s = with_options(3, 4, ScreenOptions::default().newline(Newline::Wrap));
        s.write_str("abcdef\nxy\n");
        assert_eq!(row_text(&s, 0), "abcd");
        assert_eq!(row_text(&s, 1), "xy  ");
        assert_eq!((s.row(), s.col()), (2, 0));
    }

    #[test]
    fn newline_scrolls_at_the_bottom() {
        let mut s = with_options(2, 4, ScreenOptions::default().newline(Newline::Scroll));
        s.write_str("a\nb\nc");
        assert_eq!(row_text(&s, 0), "b   ");
        assert_eq!(row_text(&s, 1), "c   ");
        assert_eq!((s.row(), s.col()), (1, 1));
    }

    #[test]
    fn printable_newline() {
        let mut s = with_options(2, 6, ScreenOptions::default().newline(Newline::Printable));
        s.write_str("a\nb");
        assert_eq!(row_text(&s, 0), "a^Jb  ");
    }

    #[test]
    fn screen_start_offsets_and_clips() {
        let mut s = screen(2, 4);
        assert_eq!(s.set_screen_start(10, 5), (0, 0));
        s.goto_rc(10, 3);
        s.write_str("abcdef");
        assert_eq!(row_text(&s, 10), "cdef");
        assert_eq!(s.col(), 9);

        s.goto_rc(0, 5);
        s.write_str("zz");
        assert_eq!(s.read_raw(0), None);
        assert_eq!(s.set_screen_start(0, 0), (10, 5));
        assert_eq!(row_text(&s, 0), "cdef");
    }

    #[test]
    fn write_nstr_pads_and_truncates() {
        let mut s = screen(1, 10);
        s.write_nstr("abcdef", 3);
        s.write_nstr("ab", 4);
        assert_eq!(row_text(&s, 0), "abcab     ");
        assert_eq!(s.col(), 7);
    }

    #[test]
    fn write_wrapped_breaks_lines() {
        let mut s = screen(4, 10);
        s.goto_rc(2, 0);
        s.write_str("zzzzzzzzzz");
        s.write_wrapped("hello world\nxy", 0, 0, 3, 5, true);
        assert_eq!(row_text(&s, 0), "hello     ");
        assert_eq!(row_text(&s, 1), " worl     ");
        assert_eq!(row_text(&s, 2), "d    zzzzz");
        assert_eq!(row_text(&s, 3), "          ");
    }

    #[test]
    fn formatted_writes() {
        let mut s = screen(1, 8);
        write!(s, "{}-{:02}", 1, 2).unwrap();
        assert_eq!(row_text(&s, 0), "1-02    ");
    }

    #[test]
    fn set_cell_does_not_move_the_cursor() {
        let mut s = screen(2, 3);
        s.set_cell(1, 2, b'q', 9);
        s.set_cell(5, 5, b'q', 9);
        assert_eq!(s.read_raw(1).unwrap()[2], Cell::new(b'q', 9));
        assert_eq!((s.row(), s.col()), (0, 0));
    }

    #[test]
    fn alternate_charset_uses_ascii_stand_ins() {
        let mut s = screen(1, 5);
        s.set_char_set(true);
        s.write_str("lqk");
        s.set_char_set(false);
        s.write_str("q");
        assert_eq!(row_text(&s, 0), "+-+q ");
        assert!(!s.read_raw(0).unwrap()[0].is_acs());
    }

    // ── Erasing ──

    #[test]
    fn erase_uses_the_current_color() {
        let mut s = screen(3, 5);
        for r in 0..3 {
            s.goto_rc(r, 0);
            s.write_str("abcde");
        }
        s.set_color(4);
        s.goto_rc(1, 2);
        s.erase_eos();
        assert_eq!(row_text(&s, 0), "abcde");
        assert_eq!(row_text(&s, 1), "ab   ");
        assert_eq!(row_colors(&s, 1), [0, 0, 4, 4, 4]);
        assert_eq!(row_text(&s, 2), "     ");
        assert_eq!(row_colors(&s, 2), [4; 5]);
    }

    #[test]
    fn cls_resets_color_and_clears_the_terminal() {
        let mut s = screen(2, 3);
        s.write_str("abc");
        settle(&mut s);
        s.set_color(3);
        s.cls();
        assert_eq!(s.current_color(), 0);
        assert_eq!(row_text(&s, 0), "   ");
        s.refresh().unwrap();
        assert!(s.backend().ops().contains(&Op::Cls));
        assert_eq!(s.backend().text(0), "   ");
    }

    // ── Drawing ──

    #[test]
    fn boxes() {
        let mut s = screen(4, 8);
        s.draw_box(0, 0, 3, 5);
        assert_eq!(row_text(&s, 0), "+---+   ");
        assert_eq!(row_text(&s, 1), "|   |   ");
        assert_eq!(row_text(&s, 2), "+---+   ");
        assert_eq!(row_text(&s, 3), "        ");
        assert_eq!((s.row(), s.col()), (0, 0));
    }

    #[test]
    fn lines_clip_and_advance_the_cursor() {
        let mut s = screen(3, 4);
        s.goto_rc(0, -2);
        s.draw_hline(5);
        assert_eq!(row_text(&s, 0), "--- ");
        assert_eq!(s.col(), 3);

        s.goto_rc(-1, 3);
        s.draw_vline(10);
        assert_eq!(row_text(&s, 1), "   |");
        assert_eq!(row_text(&s, 2), "   |");
        assert_eq!((s.row(), s.col()), (9, 3));
    }

    #[test]
    fn draw_object_moves_past_the_glyph() {
        let mut s = screen(2, 4);
        s.draw_object(1, 1, glyph::PLUS);
        assert_eq!(row_text(&s, 1), " +  ");
        assert_eq!((s.row(), s.col()), (1, 2));
    }

    #[test]
    fn fill_and_recolor_regions() {
        let mut s = screen(3, 6);
        s.fill_region(1, 1, 2, 3, b'#');
        assert_eq!(row_text(&s, 0), "      ");
        assert_eq!(row_text(&s, 1), " ###  ");
        assert_eq!(row_text(&s, 2), " ###  ");
        assert_eq!((s.row(), s.col()), (1, 1));

        s.set_color_in_region(5, 1, 2, 1, 10);
        assert_eq!(row_text(&s, 1), " ###  ");
        assert_eq!(row_colors(&s, 1), [0, 0, 5, 5, 5, 5]);
        assert_eq!(row_colors(&s, 2), [0; 6]);
    }

    // ── Raw access ──

    #[test]
    fn raw_cells_round_trip() {
        let mut s = screen(2, 4);
        s.goto_rc(1, 2);
        let cells = [Cell::new(b'x', 3), Cell::acs(b'q', 0), Cell::new(b'y', 0)];
        assert_eq!(s.write_raw(&cells), 2);
        assert_eq!(s.char_at(), Some(cells[0]));
        assert_eq!(s.read_raw(1).unwrap()[2..], cells[..2]);
        s.goto_rc(5, 0);
        assert_eq!(s.char_at(), None);
        assert_eq!(s.write_raw(&cells), 0);
    }

    // ── Refresh ──

    #[test]
    fn color_definitions_force_a_full_redraw() {
        let mut s = screen(2, 4);
        settle(&mut s);
        s.define_color(3, Style::new(1, 2));
        assert_eq!(s.color(3).style, Style::new(1, 2));
        s.refresh().unwrap();
        assert!(s.backend().ops().contains(&Op::Cls));
    }

    #[test]
    fn unknown_color_names_change_nothing() {
        let mut s = screen(2, 4);
        settle(&mut s);
        assert!(!s.define_color_names(3, "mauve", "black"));
        s.refresh().unwrap();
        assert!(!s.backend().ops().contains(&Op::Cls));
    }

    #[test]
    fn touched_lines_are_redrawn_from_a_cleared_line() {
        let mut s = screen(3, 6);
        s.goto_rc(1, 0);
        s.write_str("abc");
        settle(&mut s);
        s.touch_lines(1, 1);
        let stats = s.refresh().unwrap();
        let ops = s.backend().ops();
        assert_eq!(ops[..2], [Op::Goto(1, 0), Op::ClearToEol]);
        assert!(ops.iter().any(|op| matches!(op, Op::Write(_))));
        assert_eq!(stats.rows_examined, 1);
        assert_eq!(s.backend().text(1), "abc   ");
    }

    #[test]
    fn shifted_screen_scrolls_instead_of_redrawing() {
        let mut s = screen(6, 8);
        for r in 0..6 {
            s.goto_rc(r, 0);
            write!(s, "line{r}").unwrap();
        }
        settle(&mut s);

        for r in 0..5 {
            s.goto_rc(r, 0);
            write!(s, "line{}", r + 1).unwrap();
            s.erase_eol();
        }
        s.goto_rc(5, 0);
        s.erase_eol();
        let stats = s.refresh().unwrap();

        let ops = s.backend().ops();
        assert_eq!(stats.scrolls, 1);
        assert_eq!(ops.iter().filter(|op| matches!(op, Op::DeleteLines(1))).count(), 1);
        assert!(!ops.iter().any(|op| matches!(op, Op::Write(_))));
        for r in 0..5 {
            assert_eq!(s.backend().text(r), format!("line{}   ", r + 1));
        }
        assert_eq!(s.backend().text(5), "        ");
    }
}
