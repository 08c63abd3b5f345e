// SPDX-License-Identifier: MIT
//
// End-to-end refresh behaviour: the screen engine driving the recording
// fake, and the real driver on the built-in vt102 entry.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use vs_caps::Database;
use vs_term::{Cell, NullBackend, Op, OutputBackend, RecordingBackend, Screen, Size, TermConfig, TermDriver};

const ROWS: u16 = 6;
const COLS: u16 = 20;

fn recording(rows: u16, cols: u16) -> Screen<RecordingBackend> {
    Screen::new(RecordingBackend::new(Size::new(rows, cols)))
}

fn vt102(rows: u16, cols: u16) -> Screen<TermDriver<Vec<u8>>> {
    let cfg = TermConfig::from_lookup(|_| None).with_term("vt102");
    let driver = TermDriver::new(&Database::vtxxx(false), &cfg, Vec::new())
        .unwrap()
        .with_size(Size::new(rows, cols));
    Screen::new(driver)
}

/// Everything the driver sent since the last call.
fn drain(s: &mut Screen<TermDriver<Vec<u8>>>) -> Vec<u8> {
    std::mem::take(s.backend_mut().output_mut().device_mut())
}

fn put(s: &mut Screen<impl OutputBackend>, row: i32, text: &str) {
    s.goto_rc(row, 0);
    s.write_str(text);
    s.erase_eol();
}

// ── Scenarios ──

#[test]
fn two_changed_cells_cost_two_cells_on_the_fake() {
    let mut s = recording(3, 10);
    put(&mut s, 0, "HELLO");
    s.refresh().unwrap();
    s.backend_mut().take_ops();

    s.goto_rc(0, 2);
    s.write_str("XX");
    s.refresh().unwrap();
    assert_eq!(s.backend().payload_cells(), 2);
    assert_eq!(s.backend().text(0), "HEXXO     ");
}

#[test]
fn two_changed_cells_cost_one_motion_and_two_bytes_on_vt102() {
    let mut s = vt102(3, 10);
    put(&mut s, 0, "HELLO");
    s.refresh().unwrap();
    let first = drain(&mut s);
    assert!(String::from_utf8_lossy(&first).contains("HELLO"));

    s.goto_rc(0, 2);
    s.write_str("XX");
    let stats = s.refresh().unwrap();
    assert_eq!(drain(&mut s), b"\x1b[1;3HXX");
    assert_eq!(stats.bytes_written, 8);
    assert_eq!(stats.rows_redrawn, 1);
}

#[test]
fn refresh_without_changes_sends_nothing_on_vt102() {
    let mut s = vt102(4, 12);
    put(&mut s, 1, "steady");
    s.refresh().unwrap();
    drain(&mut s);

    let stats = s.refresh().unwrap();
    assert!(stats.is_idle());
    assert_eq!(stats.bytes_written, 0);
    assert!(drain(&mut s).is_empty());
}

#[test]
fn one_changed_run_is_written_alone() {
    let mut s = recording(3, 10);
    put(&mut s, 0, "abcdefghij");
    s.refresh().unwrap();
    s.backend_mut().take_ops();

    s.goto_rc(0, 3);
    s.write_str("XYZ");
    s.refresh().unwrap();
    let writes: Vec<_> = s.backend().ops().iter().filter(|op| matches!(op, Op::Write(_))).collect();
    assert_eq!(writes, [&Op::Write(vec![Cell::new(b'X', 0), Cell::new(b'Y', 0), Cell::new(b'Z', 0)])]);
    assert_eq!(s.backend().payload_cells(), 3);
}

#[test]
fn paging_down_is_one_scroll() {
    let mut s = recording(10, 12);
    for r in 0..10 {
        put(&mut s, r, &format!("line {r}"));
    }
    s.refresh().unwrap();
    s.backend_mut().take_ops();

    for r in 0..10 {
        if r < 7 {
            put(&mut s, r, &format!("line {}", r + 3));
        } else {
            put(&mut s, r, "");
        }
    }
    let stats = s.refresh().unwrap();
    let ops = s.backend().ops();
    assert_eq!(stats.scrolls, 1);
    assert_eq!(ops.iter().filter(|op| matches!(op, Op::DeleteLines(_))).count(), 1);
    assert!(ops.contains(&Op::DeleteLines(3)));
    assert!(!ops.iter().any(|op| matches!(op, Op::Write(_))));
    assert_eq!(s.backend().text(0), "line 3      ");
    assert_eq!(s.backend().text(6), "line 9      ");
    assert_eq!(s.backend().text(9), "            ");
}

#[test]
fn null_backend_still_tracks_dirty_rows() {
    let mut s = Screen::new(NullBackend::new(Size::new(3, 8)));
    s.refresh().unwrap();
    put(&mut s, 2, "x");
    let stats = s.refresh().unwrap();
    assert_eq!(stats.rows_examined, 1);
    assert_eq!(stats.scrolls, 0);
}

// ── Properties ──

#[derive(Debug, Clone)]
enum Action {
    Write { row: i32, col: i32, color: u8, text: String },
    Erase { row: i32, col: i32, color: u8 },
    /// Move every row up by one, as a scrolling log would.
    Shift,
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (-1..8i32, -3..24i32, 0..30u8, "[ -~]{0,12}")
            .prop_map(|(row, col, color, text)| Action::Write { row, col, color, text }),
        1 => (0..6i32, 0..20i32, 0..30u8).prop_map(|(row, col, color)| Action::Erase { row, col, color }),
        1 => Just(Action::Shift),
    ]
}

fn apply(s: &mut Screen<RecordingBackend>, action: &Action) {
    match action {
        Action::Write { row, col, color, text } => {
            s.set_color(*color);
            s.goto_rc(*row, *col);
            s.write_str(text);
        }
        Action::Erase { row, col, color } => {
            s.set_color(*color);
            s.goto_rc(*row, *col);
            s.erase_eol();
        }
        Action::Shift => {
            let rows = i32::from(ROWS);
            for r in 0..rows - 1 {
                let below = s.read_raw(r + 1).unwrap_or_default().to_vec();
                s.goto_rc(r, 0);
                s.write_raw(&below);
            }
            s.normal_video();
            s.goto_rc(rows - 1, 0);
            s.erase_eol();
        }
    }
}

/// The emulated terminal shows what the application asked for.
fn check_in_sync(s: &Screen<RecordingBackend>) -> Result<(), TestCaseError> {
    let b = s.backend();
    for r in 0..usize::from(ROWS) {
        let want = s.read_raw(i32::try_from(r).unwrap()).unwrap();
        let got = b.screen().row(r);
        for (c, (&w, &g)) in want.iter().zip(got).enumerate() {
            prop_assert!(b.cells_match(w, g), "row {} col {}: want {:?}, terminal has {:?}", r, c, w, g);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn refresh_brings_the_terminal_in_sync(
        first in prop::collection::vec(action(), 0..12),
        second in prop::collection::vec(action(), 0..12),
    ) {
        let mut s = recording(ROWS, COLS);
        for a in &first {
            apply(&mut s, a);
        }
        s.refresh().unwrap();
        check_in_sync(&s)?;

        for a in &second {
            apply(&mut s, a);
        }
        s.refresh().unwrap();
        check_in_sync(&s)?;

        s.backend_mut().take_ops();
        let stats = s.refresh().unwrap();
        prop_assert!(stats.is_idle());
        prop_assert_eq!(s.backend().ops().len(), 2);
    }
}
