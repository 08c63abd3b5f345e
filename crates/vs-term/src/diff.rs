// SPDX-License-Identifier: MIT
//
// Row diff and scroll detection — the core of refresh performance.
//
// A refresh compares each dirty row of the desired grid against what the
// terminal shows and sends only the difference. Two passes do the work:
//
//   1. `try_scroll` looks for bands of rows that moved vertically (a
//      list scrolled by a line, a file view paged down) and realizes
//      them with the terminal's own line insert/delete inside a scroll
//      region. The displayed grid is rotated to match, so the rows that
//      slid into place need no further output.
//
//   2. `smart_puts` walks one row. It skips the common prefix, finds the
//      last cell that still needs drawing, then alternates between
//      writing runs of changed cells and skipping runs of unchanged ones.
//      Short skips are cheaper to rewrite than to jump over, so matched
//      cells are held back and only turned into cursor motion once five
//      of them pile up. A trailing blank run becomes erase-to-end-of-line
//      and a long leading blank run becomes erase-to-beginning.
//
// Cells are compared by look, not by value: two color objects that
// resolve to the same pen are interchangeable on screen.
//
// Auto-margin terminals wrap (and may scroll) when the bottom-right cell
// is written. The backend never writes it directly; when the last row
// needs a new character there, it is written one cell to the left and
// pushed into the corner by inserting its neighbour in front of it.

use crate::backend::OutputBackend;
use crate::cell::Cell;
use crate::grid::{BLANK_HASH, Grid, RowFlags};

/// Matched cells held back before they are worth a cursor motion.
const MIN_SKIP: usize = 5;

/// A leading blank run must be longer than this for erase-to-beginning
/// to pay for its cursor positioning.
const MIN_BOL_RUN: usize = 13;

// ─── RefreshStats ───────────────────────────────────────────────────────────

/// What a refresh did, for profiling and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshStats {
    /// Dirty rows compared against the terminal.
    pub rows_examined: usize,
    /// Rows that needed output.
    pub rows_redrawn: usize,
    /// Hardware scrolls performed.
    pub scrolls: usize,
    /// Bytes queued for the device.
    pub bytes_written: u64,
}

impl RefreshStats {
    /// Whether the refresh sent nothing but cursor placement.
    #[inline]
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.rows_redrawn == 0 && self.scrolls == 0
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub(crate) const fn coord(n: usize) -> i32 {
    if n > i32::MAX as usize { i32::MAX } else { n as i32 }
}

// ─── Row diff ───────────────────────────────────────────────────────────────

/// Bring terminal row `row`, currently showing `old`, up to `new`.
///
/// `screen_rows` is the height of the terminal; `wide` makes high-bit
/// byte pairs indivisible. Returns whether anything was sent.
#[allow(clippy::too_many_lines)]
pub fn smart_puts<B: OutputBackend + ?Sized>(
    b: &mut B,
    new: &[Cell],
    old: &[Cell],
    row: usize,
    screen_rows: usize,
    wide: bool,
) -> bool {
    let len = new.len().min(old.len());
    let f = b.features();
    let r = coord(row);

    let corner = if row + 1 == screen_rows
        && len == usize::from(b.size().cols)
        && len > 1
        && f.can_insert
        && f.auto_margins
        && old[len - 1] != new[len - 1]
    {
        Some((new[len - 1], new[len - 2]))
    } else {
        None
    };

    // Common prefix.
    let mut i = 0;
    loop {
        if i == len {
            return false;
        }
        if wide {
            if new[i].is_high() {
                if old[i].is_high() && i + 1 < len && same_glyph_pair(&*b, new, old, i) {
                    i += 2;
                    continue;
                }
                break;
            }
            if old[i].is_high() {
                break;
            }
        }
        if !b.cells_match(old[i], new[i]) {
            break;
        }
        i += 1;
    }

    // Last cells worth drawing on each side.
    let blank = Cell::BLANK;
    let mut space = blank;
    let mut pmax = len;
    if new[len - 1].is_space() {
        if f.bce && f.ansi_colors {
            space = new[len - 1];
        }
        while pmax > i && b.cells_match(new[pmax - 1], space) {
            pmax -= 1;
        }
    }
    let mut qmax = len;
    while qmax > i && b.cells_match(old[qmax - 1], space) {
        qmax -= 1;
    }

    // A long blank start is cleared in one stroke.
    let mut positioned = false;
    if f.clear_bol && new[0].is_space() {
        let fill = if f.bce && f.ansi_colors { new[0] } else { blank };
        let mut p1 = 0;
        while p1 < pmax && b.cells_match(new[p1], fill) {
            p1 += 1;
        }
        if p1 > MIN_BOL_RUN && p1 >= i && (p1 != pmax || pmax < len) {
            i = p1;
            b.goto_rc(r, coord(p1 - 1));
            b.set_color(fill.color());
            b.del_bol();
            b.write_cells(&[fill]);
            positioned = true;
        }
    }
    if !positioned {
        b.goto_rc(r, coord(i));
    }

    let mut buf: Vec<Cell> = Vec::with_capacity(len);
    loop {
        // Changed cells, up to a blank-on-blank run or a match.
        let mut n_spaces = 0;
        while i < pmax {
            if b.cells_match(old[i], blank) && b.cells_match(new[i], blank) {
                let start = i;
                i += 1;
                while i < pmax && b.cells_match(old[i], blank) && b.cells_match(new[i], blank) {
                    i += 1;
                }
                n_spaces = i - start;
                break;
            }
            if wide {
                if new[i].is_high() && i + 1 < pmax {
                    if old[i].is_high() && same_glyph_pair(&*b, new, old, i) {
                        break;
                    }
                    buf.extend_from_slice(&new[i..i + 2]);
                    i += 2;
                    continue;
                }
                if old[i].is_high() {
                    buf.push(new[i]);
                    i += 1;
                    continue;
                }
            }
            if b.cells_match(old[i], new[i]) {
                break;
            }
            buf.push(new[i]);
            i += 1;
        }
        if !buf.is_empty() {
            b.write_cells(&buf);
            buf.clear();
        }
        // Erasing to the end covers a trailing blank run.
        if n_spaces > 0 && (i < pmax || space != blank) {
            b.forward_cursor(coord(n_spaces), r);
        }

        // Matched cells, held back.
        while i < pmax {
            if wide && new[i].is_high() && i + 1 < pmax {
                if !(old[i].is_high() && same_glyph_pair(&*b, new, old, i)) {
                    break;
                }
                buf.extend_from_slice(&new[i..i + 2]);
                i += 2;
                continue;
            }
            if (wide && old[i].is_high()) || !b.cells_match(old[i], new[i]) {
                break;
            }
            buf.push(new[i]);
            i += 1;
        }
        if i >= pmax {
            break;
        }
        if buf.len() >= MIN_SKIP {
            b.forward_cursor(coord(buf.len()), r);
            buf.clear();
        }
    }

    if !buf.is_empty() && i < qmax {
        if buf.len() >= MIN_SKIP {
            b.forward_cursor(coord(buf.len()), r);
        } else {
            b.write_cells(&buf);
        }
    }

    if i < qmax {
        b.set_color(space.color());
        b.erase_eol();
    } else if let Some((last, prev)) = corner {
        let (rr, cc) = (coord(screen_rows - 1), coord(len - 2));
        b.goto_rc(rr, cc);
        b.write_cells(&[last]);
        b.goto_rc(rr, cc);
        b.begin_insert();
        b.write_cells(&[prev]);
        b.end_insert();
    }
    true
}

/// Whether the two-cell glyphs starting at `i` have the same bytes and
/// look.
fn same_glyph_pair<B: OutputBackend + ?Sized>(b: &B, new: &[Cell], old: &[Cell], i: usize) -> bool {
    old[i].ch() == new[i].ch()
        && old[i + 1].ch() == new[i + 1].ch()
        && b.same_look(old[i].color(), new[i].color())
        && b.same_look(old[i + 1].color(), new[i + 1].color())
}

// ─── Scroll detection ───────────────────────────────────────────────────────

/// Use hardware scrolling to move rows of `displayed` to where `desired`
/// wants them. Both grids must carry current hashes.
///
/// Rows of the scrolled band that still differ afterwards are flagged
/// `TOUCHED` in `desired`; the ones that landed in place lose that flag.
/// Returns the number of scrolls sent.
pub fn try_scroll<B: OutputBackend + ?Sized>(b: &mut B, displayed: &mut Grid, desired: &mut Grid) -> usize {
    let rows = desired.rows();
    if rows < 2 {
        return 0;
    }
    let differs = |r: usize| desired.hash(r) != displayed.hash(r);

    // The changed band, ignoring isolated changed rows at either end.
    let mut rmax = rows - 1;
    while rmax > 0 {
        if differs(rmax) {
            let r1 = rmax - 1;
            if r1 == 0 || differs(r1) {
                break;
            }
            rmax = r1;
        }
        rmax -= 1;
    }
    let mut rmin = 0;
    while rmin < rmax {
        if differs(rmin) {
            let r1 = rmin + 1;
            if r1 == rmax || differs(r1) {
                break;
            }
            rmin = r1;
        }
        rmin += 1;
    }

    let num_up = (rmin..rmax).filter(|&r| desired.hash(r) == displayed.hash(r + 1)).count();
    let num_down = (rmin + 1..=rmax).filter(|&r| displayed.hash(r - 1) == desired.hash(r)).count();

    if num_up > num_down {
        let n = scroll_up(b, displayed, desired, rmin, rmax);
        if n > 0 { n } else { scroll_down(b, displayed, desired, rmin, rmax) }
    } else {
        let n = scroll_down(b, displayed, desired, rmin, rmax);
        if n > 0 { n } else { scroll_up(b, displayed, desired, rmin, rmax) }
    }
}

fn scroll_up<B: OutputBackend + ?Sized>(
    b: &mut B,
    displayed: &mut Grid,
    desired: &mut Grid,
    rmin: usize,
    rmax: usize,
) -> usize {
    let mut done = 0;
    for i in rmin..rmax {
        let hash = desired.hash(i);
        if hash == BLANK_HASH || hash == displayed.hash(i) {
            continue;
        }
        let Some(found) = (i + 1..=rmax).find(|&j| displayed.hash(j) == hash) else {
            continue;
        };
        let (r1, di) = (i, found - i);

        let mut j = found + 1;
        let mut ignore = 0;
        while j <= rmax && displayed.hash(j) == desired.hash(j - di) {
            if displayed.hash(j) == BLANK_HASH {
                ignore += 1;
            }
            j += 1;
        }
        let r2 = j - 1;

        // Only the triggering row would move into place.
        if di > 1 && r1 + di + ignore == r2 {
            continue;
        }
        let breaks_a_row = (r1..=r2).any(|j| {
            let h = displayed.hash(j);
            h != BLANK_HASH && h == desired.hash(j) && (j < r1 + di || h != desired.hash(j - di))
        });
        if breaks_a_row {
            continue;
        }

        log::debug!("scroll rows {r1}..={r2} up by {di}");
        b.normal_video();
        b.set_scroll_region(coord(r1), coord(r2));
        b.goto_rc(0, 0);
        b.delete_lines(coord(di));
        b.reset_scroll_region();
        displayed.rotate_up(r1, r2, di);
        settle(displayed, desired, r1, r2);
        done += 1;
    }
    done
}

fn scroll_down<B: OutputBackend + ?Sized>(
    b: &mut B,
    displayed: &mut Grid,
    desired: &mut Grid,
    rmin: usize,
    rmax: usize,
) -> usize {
    let mut done = 0;
    for i in (rmin + 1..=rmax).rev() {
        let hash = desired.hash(i);
        if hash == BLANK_HASH || hash == displayed.hash(i) {
            continue;
        }
        let Some(found) = (rmin..i).rev().find(|&j| displayed.hash(j) == hash) else {
            continue;
        };
        let (r2, di) = (i, i - found);

        let mut r1 = found;
        let mut ignore = 0;
        while r1 > rmin && displayed.hash(r1 - 1) == desired.hash(r1 - 1 + di) {
            if displayed.hash(r1 - 1) == BLANK_HASH {
                ignore += 1;
            }
            r1 -= 1;
        }

        if di > 1 && r1 + di + ignore == r2 {
            continue;
        }
        let breaks_a_row = (r1..=r2).any(|j| {
            let h = displayed.hash(j);
            h != BLANK_HASH && h == desired.hash(j) && (j + di > r2 || h != desired.hash(j + di))
        });
        if breaks_a_row {
            continue;
        }

        log::debug!("scroll rows {r1}..={r2} down by {di}");
        b.normal_video();
        b.set_scroll_region(coord(r1), coord(r2));
        b.goto_rc(0, 0);
        b.insert_lines(coord(di));
        b.reset_scroll_region();
        displayed.rotate_down(r1, r2, di);
        settle(displayed, desired, r1, r2);
        done += 1;
    }
    done
}

/// Re-flag the rows of a scrolled band by whether they still differ.
fn settle(displayed: &Grid, desired: &mut Grid, r1: usize, r2: usize) {
    for r in r1..=r2 {
        if displayed.row(r) == desired.row(r) {
            desired.unmark(r, RowFlags::TOUCHED);
        } else {
            desired.mark(r, RowFlags::TOUCHED);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Features, Op, RecordingBackend};
    use crate::terminal::Size;
    use pretty_assertions::assert_eq;

    fn row(s: &str) -> Vec<Cell> {
        s.bytes().map(|b| Cell::new(b, 0)).collect()
    }

    fn row_bytes(bytes: &[u8]) -> Vec<Cell> {
        bytes.iter().map(|&b| Cell::new(b, 0)).collect()
    }

    /// A fake terminal already showing `old` on row `r`.
    fn showing(size: Size, r: usize, old: &[Cell]) -> RecordingBackend {
        let mut b = RecordingBackend::new(size);
        b.goto_rc(coord(r), 0);
        b.write_cells(old);
        b.take_ops();
        b
    }

    fn puts(b: &mut RecordingBackend, new: &[Cell], old: &[Cell], r: usize) -> Vec<Op> {
        let rows = usize::from(b.size().rows);
        smart_puts(b, new, old, r, rows, false);
        b.take_ops()
    }

    fn grid(lines: &[&str]) -> Grid {
        let cols = lines.iter().map(|l| l.len()).max().unwrap_or(0);
        let mut g = Grid::new(lines.len(), cols);
        for (r, l) in lines.iter().enumerate() {
            for (c, ch) in l.bytes().enumerate() {
                g.set(r, c, Cell::new(ch, 0));
            }
            g.rehash(r);
        }
        g
    }

    // ── smart_puts ──

    #[test]
    fn identical_rows_send_nothing() {
        let old = row("same text ");
        let mut b = showing(Size::new(3, 10), 0, &old);
        assert!(!smart_puts(&mut b, &old, &old, 0, 3, false));
        assert!(b.ops().is_empty());
    }

    #[test]
    fn one_changed_run_is_all_that_is_written() {
        let old = row("HELLO     ");
        let new = row("HEXXO     ");
        let mut b = showing(Size::new(3, 10), 0, &old);
        let ops = puts(&mut b, &new, &old, 0);
        assert_eq!(ops, vec![Op::Goto(0, 2), Op::Write(row("XX"))]);
        assert_eq!(b.text(0), "HEXXO     ");
    }

    #[test]
    fn shorter_row_erases_the_tail() {
        let old = row("abcdef");
        let new = row("abc   ");
        let mut b = showing(Size::new(3, 6), 0, &old);
        let ops = puts(&mut b, &new, &old, 0);
        assert_eq!(ops, vec![Op::Goto(0, 3), Op::SetColor(0), Op::EraseEol]);
        assert_eq!(b.text(0), "abc   ");
    }

    #[test]
    fn blank_on_blank_is_skipped() {
        let old = row("A          Z");
        let new = row("B          Y");
        let mut b = showing(Size::new(3, 12), 0, &old);
        let ops = puts(&mut b, &new, &old, 0);
        assert_eq!(ops, vec![Op::Goto(0, 0), Op::Write(row("B")), Op::Forward(10), Op::Write(row("Y"))]);
        assert_eq!(b.text(0), "B          Y");
    }

    #[test]
    fn short_matches_are_rewritten() {
        let old = row("aXbcdYe");
        let new = row("aQbcdRe");
        let mut b = showing(Size::new(3, 7), 0, &old);
        let ops = puts(&mut b, &new, &old, 0);
        assert_eq!(ops, vec![Op::Goto(0, 1), Op::Write(row("Q")), Op::Write(row("bcdR"))]);
        assert_eq!(b.text(0), "aQbcdRe");
    }

    #[test]
    fn long_matches_become_motion() {
        let old = row("aX123456Ye");
        let new = row("aQ123456Re");
        let mut b = showing(Size::new(3, 10), 0, &old);
        let ops = puts(&mut b, &new, &old, 0);
        assert_eq!(ops, vec![Op::Goto(0, 1), Op::Write(row("Q")), Op::Forward(6), Op::Write(row("R"))]);
        assert_eq!(b.text(0), "aQ123456Re");
    }

    #[test]
    fn long_blank_start_uses_erase_to_bol() {
        let old = row(&"x".repeat(40));
        let new = row(&format!("{}hello{}", " ".repeat(20), " ".repeat(15)));
        let mut b = showing(Size::new(3, 40), 0, &old);
        let ops = puts(&mut b, &new, &old, 0);
        assert_eq!(
            ops,
            vec![
                Op::Goto(0, 19),
                Op::SetColor(0),
                Op::DelBol,
                Op::Write(vec![Cell::BLANK]),
                Op::Write(row("hello")),
                Op::SetColor(0),
                Op::EraseEol,
            ]
        );
        assert_eq!(b.screen().row(0), new.as_slice());
    }

    #[test]
    fn short_blank_start_is_just_written() {
        let old = row("xxxxxxxx");
        let new = row("   abc  ");
        let mut b = showing(Size::new(3, 8), 0, &old);
        let ops = puts(&mut b, &new, &old, 0);
        assert!(!ops.contains(&Op::DelBol));
        assert_eq!(b.text(0), "   abc  ");
    }

    #[test]
    fn bottom_right_corner_goes_through_insert_mode() {
        let old = row("    ");
        let new = row("abcd");
        let mut b = showing(Size::new(2, 4), 1, &old);
        let ops = puts(&mut b, &new, &old, 1);
        assert_eq!(
            ops[ops.len() - 6..],
            [
                Op::Goto(1, 2),
                Op::Write(row("d")),
                Op::Goto(1, 2),
                Op::BeginInsert,
                Op::Write(row("c")),
                Op::EndInsert,
            ]
        );
        assert_eq!(b.text(1), "abcd");
    }

    #[test]
    fn corner_is_left_alone_without_insert() {
        let f = Features { can_insert: false, ..RecordingBackend::new(Size::new(1, 1)).features() };
        let old = row("    ");
        let new = row("abcd");
        let mut b = showing(Size::new(2, 4), 1, &old).with_features(f);
        let ops = puts(&mut b, &new, &old, 1);
        assert!(!ops.contains(&Op::BeginInsert));
        assert_eq!(b.text(1), "abc ");
    }

    #[test]
    fn colors_with_the_same_look_match() {
        // Objects past the stock table all draw white on black.
        let old: Vec<Cell> = "abc".bytes().map(|b| Cell::new(b, 20)).collect();
        let new: Vec<Cell> = "abc".bytes().map(|b| Cell::new(b, 30)).collect();
        let mut b = showing(Size::new(1, 3), 0, &old);
        assert!(!smart_puts(&mut b, &new, &old, 0, 1, false));
    }

    #[test]
    fn wide_glyphs_are_redrawn_whole() {
        let old = row_bytes(b"ab\xa4\xa2cd");
        let new = row_bytes(b"ab\xa4\xa3cd");
        let mut b = showing(Size::new(3, 6), 0, &old);
        smart_puts(&mut b, &new, &old, 0, 3, true);
        let ops = b.take_ops();
        assert_eq!(ops, vec![Op::Goto(0, 2), Op::Write(row_bytes(b"\xa4\xa3"))]);

        let mut b = showing(Size::new(3, 6), 0, &old);
        let ops = puts(&mut b, &new, &old, 0);
        assert_eq!(ops, vec![Op::Goto(0, 3), Op::Write(row_bytes(b"\xa3"))]);
    }

    // ── try_scroll ──

    #[test]
    fn shifted_screen_scrolls_once() {
        let mut displayed = grid(&["line0", "line1", "line2", "line3", "line4", "line5"]);
        let mut desired = grid(&["line1", "line2", "line3", "line4", "line5", "     "]);
        let mut b = RecordingBackend::new(Size::new(6, 5));
        assert_eq!(try_scroll(&mut b, &mut displayed, &mut desired), 1);
        assert_eq!(
            b.take_ops(),
            vec![
                Op::SetColor(0),
                Op::ScrollRegion(0, 5),
                Op::Goto(0, 0),
                Op::DeleteLines(1),
                Op::ResetScrollRegion,
            ]
        );
        assert_eq!(displayed, {
            let mut g = desired.clone();
            (0..6).for_each(|r| g.clear_flags(r));
            g
        });
        assert!((0..6).all(|r| desired.flags(r).is_empty()));
    }

    #[test]
    fn scrolling_down_inserts_lines() {
        let mut displayed = grid(&["aa", "bb", "cc", "dd", "ee"]);
        let mut desired = grid(&["NN", "aa", "bb", "cc", "dd"]);
        let mut b = RecordingBackend::new(Size::new(5, 2));
        assert_eq!(try_scroll(&mut b, &mut displayed, &mut desired), 1);
        assert!(b.ops().contains(&Op::InsertLines(1)));
        // The exposed row still needs drawing.
        assert_eq!(desired.flags(0), RowFlags::TOUCHED);
        assert!((1..5).all(|r| desired.flags(r).is_empty()));
        assert_eq!(displayed.row(0), Grid::new(1, 2).row(0));
    }

    #[test]
    fn moving_only_the_trigger_row_is_not_worth_it() {
        let mut displayed = grid(&["AA", "BB", "CC", "DD"]);
        let mut desired = grid(&["CC", "XX", "YY", "ZZ"]);
        let mut b = RecordingBackend::new(Size::new(4, 2));
        assert_eq!(try_scroll(&mut b, &mut displayed, &mut desired), 0);
        assert!(b.ops().is_empty());
    }

    #[test]
    fn unrelated_changes_do_not_scroll() {
        let mut displayed = grid(&["aa", "bb", "cc", "dd"]);
        let mut desired = grid(&["aa", "xx", "yy", "dd"]);
        let mut b = RecordingBackend::new(Size::new(4, 2));
        assert_eq!(try_scroll(&mut b, &mut displayed, &mut desired), 0);
    }

    #[test]
    fn stats_idle() {
        assert!(RefreshStats::default().is_idle());
        assert!(!RefreshStats { rows_redrawn: 1, ..RefreshStats::default() }.is_idle());
    }
}
