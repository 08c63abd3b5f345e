// SPDX-License-Identifier: MIT
//
// vscreen — a full-screen demo of the capability store, the output driver
// and the virtual screen.
//
// It loads the entry for $TERM, takes over the terminal, draws a frame of
// terminal facts and a row of color swatches, then appends lines to a log
// pane on every key press. The log pane spans the full width, so a new
// line at the bottom reaches the terminal as one hardware scroll rather
// than a repaint of every row. The status line shows what each refresh
// cost.
//
// Layout:
//
//   ┌──────────────────────────────┐
//   │ title (reverse video)        │  ← row 0
//   ├──────────────────────────────┤
//   │ facts box + palette swatches │  ← rows 1..=7
//   ├──────────────────────────────┤
//   │ log (scrolls)                │  ← rows 8..h - 1
//   ├──────────────────────────────┤
//   │ status line                  │  ← last row
//   └──────────────────────────────┘
//
// `RUST_LOG=debug vscreen 2>log` shows what the driver decided about the
// terminal.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::process;

use vs_term::signal;
use vs_term::{
    OutputBackend, RawMode, RefreshStats, Screen, ScreenOptions, TermConfig, TermDriver, TermError, TtyWriter,
};

type TtyScreen = Screen<TermDriver<TtyWriter>>;

// ─── Colors ─────────────────────────────────────────────────────────────────

/// Object 1 starts out as the selection color.
const TITLE: u8 = 1;
const FRAME: u8 = 2;
const LABEL: u8 = 3;
const STATUS: u8 = 4;
/// First of eight swatch objects.
const SWATCH: u8 = 10;

const PALETTE: [&str; 8] = ["black", "red", "green", "brown", "blue", "magenta", "cyan", "lightgray"];

fn define_colors(s: &mut TtyScreen) {
    s.define_color_names(FRAME, "cyan", "default");
    s.define_color_names(LABEL, "yellow", "default");
    s.define_color_names(STATUS, "white", "blue");
    for (obj, name) in (SWATCH..).zip(PALETTE) {
        s.define_color_names(obj, "white", name);
    }
}

// ─── Layout ─────────────────────────────────────────────────────────────────

const FACTS_ROWS: usize = 7;
const LOG_TOP: i32 = 8;

fn log_rows(s: &TtyScreen) -> usize {
    usize::from(s.size().rows).saturating_sub(usize::try_from(LOG_TOP).unwrap_or(0) + 1)
}

fn draw_title(s: &mut TtyScreen) {
    let cols = usize::from(s.size().cols);
    let name = s.backend().profile().name.clone();
    s.set_color(TITLE);
    s.goto_rc(0, 0);
    s.write_nstr(&format!(" vscreen on {name}"), cols);
    s.normal_video();
}

fn draw_facts(s: &mut TtyScreen) {
    let features = s.backend().features();
    let colors = s.backend().profile().max_colors;
    let native = s.backend().acs_map().is_native();
    let size = s.size();

    s.set_color(FRAME);
    s.draw_box(1, 0, FACTS_ROWS, 40);
    let facts = [
        ("size", format!("{}x{}", size.cols, size.rows)),
        ("colors", if features.ansi_colors { colors.to_string() } else { "mono".into() }),
        ("scrolling", yes_no(features.can_scroll)),
        ("insert", yes_no(features.can_insert)),
        ("line drawing", if native { "native".into() } else { "ascii".into() }),
    ];
    for (row, (label, value)) in (2..).zip(facts) {
        s.set_color(LABEL);
        s.goto_rc(row, 2);
        s.write_nstr(label, 14);
        s.normal_video();
        s.write_nstr(&value, 22);
    }

    s.set_color(FRAME);
    s.draw_box(1, 41, 3, 2 + 3 * PALETTE.len());
    for i in 0..PALETTE.len() {
        let obj = SWATCH.saturating_add(u8::try_from(i).unwrap_or(0));
        let col = 42 + 3 * i32::try_from(i).unwrap_or(0);
        s.set_color(obj);
        s.goto_rc(2, col);
        s.write_str(&format!("{i:^3}"));
    }
    s.normal_video();
}

fn draw_log(s: &mut TtyScreen, log: &VecDeque<String>) {
    let visible = log_rows(s);
    let skip = log.len().saturating_sub(visible);
    for (row, line) in (LOG_TOP..).zip(log.iter().skip(skip)) {
        s.goto_rc(row, 0);
        s.write_str(line);
        s.erase_eol();
    }
}

fn draw_status(s: &mut TtyScreen, stats: RefreshStats) {
    let cols = usize::from(s.size().cols);
    let row = i32::from(s.size().rows) - 1;
    s.set_color(STATUS);
    s.goto_rc(row, 0);
    let text = format!(
        " q quits, any other key logs | last refresh: {} rows, {} scrolls, {} bytes",
        stats.rows_redrawn, stats.scrolls, stats.bytes_written
    );
    s.write_nstr(&text, cols);
    s.normal_video();
}

fn draw_all(s: &mut TtyScreen, log: &VecDeque<String>, stats: RefreshStats) {
    s.cls();
    draw_title(s);
    draw_facts(s);
    draw_log(s, log);
    draw_status(s, stats);
}

fn yes_no(b: bool) -> String {
    if b { "yes".into() } else { "no".into() }
}

// ─── Main loop ──────────────────────────────────────────────────────────────

enum Input {
    Key(u8),
    /// A signal cut the read short.
    Interrupted,
    Closed,
}

fn read_key() -> Input {
    let mut byte = [0u8; 1];
    match io::stdin().read(&mut byte) {
        Ok(1) => Input::Key(byte[0]),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Input::Interrupted,
        _ => Input::Closed,
    }
}

fn run(screen: &mut TtyScreen) -> Result<(), TermError> {
    define_colors(screen);
    let mut log: VecDeque<String> = VecDeque::new();
    let mut stats = RefreshStats::default();
    let mut n = 0usize;

    draw_all(screen, &log, stats);
    screen.refresh()?;

    loop {
        // SIGWINCH interrupts the read below, so a resize is redrawn
        // without waiting for a key.
        if signal::take_resize() {
            screen.reinit();
            define_colors(screen);
            draw_all(screen, &log, stats);
            screen.refresh()?;
        }
        let key = match read_key() {
            Input::Key(b'q' | 0x1b) | Input::Closed => break,
            Input::Interrupted => continue,
            Input::Key(k) => k,
        };
        // One line per refresh, so each shows up as a scroll.
        for _ in 0..3 {
            n += 1;
            log.push_back(format!("{n:>5}  key 0x{key:02x}  the quick brown fox jumps over the lazy dog"));
            if log.len() > 1000 {
                log.pop_front();
            }
            draw_log(screen, &log);
            draw_status(screen, stats);
            stats = screen.refresh()?;
        }
        draw_status(screen, stats);
        screen.refresh()?;
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cfg = TermConfig::from_env();
    let driver = TermDriver::open(&cfg, TtyWriter::stdout()).unwrap_or_else(|e| {
        eprintln!("vscreen: {e}");
        process::exit(1);
    });
    let raw = RawMode::enable(0).unwrap_or_else(|e| {
        eprintln!("vscreen: cannot set up the keyboard: {e}");
        process::exit(1);
    });
    signal::install_resize_interrupt();
    log::info!("vscreen: driving {}", driver.profile().name);

    let mut screen = Screen::with_options(driver, ScreenOptions::default());
    let outcome = run(&mut screen);
    let restored = screen.reset();
    drop(raw);

    if let Err(e) = outcome.and(restored) {
        eprintln!("vscreen: {e}");
        process::exit(1);
    }
}
