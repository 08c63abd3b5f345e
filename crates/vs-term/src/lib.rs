// SPDX-License-Identifier: MIT
//
// vs-term — terminal output driver and virtual screen engine.
//
// Two layers sit on top of the capability store:
//
//   - `driver::TermDriver` turns abstract operations (move the cursor, set
//     a color, delete three lines) into the bytes one particular terminal
//     wants, tracking the cursor and pen so nothing redundant is sent, and
//     buffering everything into large writes.
//
//   - `screen::Screen` keeps what the terminal shows and what the
//     application wants it to show, and on refresh sends only the
//     difference: hardware scrolls for rows that moved, cursor motion over
//     cells that match, erase-to-end-of-line for trailing blanks.
//
// The screen talks to the driver through the `OutputBackend` trait, so it
// can also drive a null backend or the recording fake the tests use.

pub mod acs;
pub mod backend;
pub mod cell;
pub mod color;
pub mod config;
pub mod diff;
pub mod driver;
pub mod error;
pub mod grid;
pub mod output;
pub mod screen;
pub mod signal;
pub mod terminal;

pub use acs::{AcsMap, glyph};
pub use backend::{Features, NullBackend, Op, OutputBackend, RecordingBackend};
pub use cell::Cell;
pub use color::{Attr, ColorEntry, ColorTable, Named, Pen, Style};
pub use config::{Newline, ScreenOptions, TermConfig};
pub use diff::RefreshStats;
pub use driver::{Beep, Profile, TermDriver};
pub use error::{MessageHook, Result, TermError};
pub use grid::{Grid, RowFlags};
pub use screen::Screen;
pub use signal::SignalGuard;
pub use terminal::{RawMode, Size, TtyWriter};
