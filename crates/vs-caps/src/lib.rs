// SPDX-License-Identifier: MIT
//
// vs-caps — terminal capability store.
//
// Answers one question for the rest of the stack: "what bytes does this
// terminal want for X?". Entries come from the compiled terminfo database
// (legacy and 32-bit extended formats), from an inline termcap entry in the
// environment, or from a built-in vt100/vt102 description when a common
// terminal family has nothing installed. Lookups are by the two-character
// termcap mnemonic. The `%`-parameter language used by cursor addressing
// and friends lives here too, since it is part of reading a capability
// string rather than of writing to the terminal.

pub mod code;
pub mod compiled;
pub mod database;
pub mod error;
pub mod param;
pub mod termcap;

pub use code::{Code, Section};
pub use database::{Database, Flag, Origin, SearchPath, TermcapPolicy, strip_padding};
pub use error::{CapsError, Result};
