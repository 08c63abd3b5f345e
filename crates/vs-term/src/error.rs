// SPDX-License-Identifier: MIT
//
// Errors raised by the output driver and the screen engine.
//
// Only two kinds of failure leave this crate: the display could not be
// initialized (no terminal name, no usable capability entry, no way to
// clear the screen or address the cursor), or the device refused output.
// Drawing outside the grid and malformed capability templates are absorbed
// where they happen.

use std::io;

use thiserror::Error;
use vs_caps::CapsError;

#[derive(Debug, Error)]
pub enum TermError {
    /// `TERM` is unset or empty.
    #[error("TERM environment variable not set")]
    NoTerminal,

    /// The capability database for the terminal could not be loaded.
    #[error("cannot initialize display: {0}")]
    Capability(#[from] CapsError),

    /// The terminal cannot clear the screen or position the cursor.
    #[error("cannot initialize display: terminal {term:?} lacks {what}")]
    MissingCapability { term: String, what: &'static str },

    /// The device rejected output. `unwritten` bytes remain buffered.
    #[error("terminal write failed with {unwritten} bytes unwritten: {source}")]
    Write {
        unwritten: usize,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TermError {
    /// Whether the error means the display cannot be started at all.
    #[must_use]
    pub const fn is_init_failure(&self) -> bool {
        matches!(self, Self::NoTerminal | Self::Capability(_) | Self::MissingCapability { .. })
    }
}

pub type Result<T> = std::result::Result<T, TermError>;

// ─── MessageHook ────────────────────────────────────────────────────────────

/// Receives each initialization or fatal I/O error once, before it is
/// returned to the caller.
pub type MessageHook = Box<dyn FnMut(&TermError)>;

/// The hook installed when the application does not provide one.
#[must_use]
pub fn default_hook() -> MessageHook {
    Box::new(|err| log::error!("{err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_failures_are_classified() {
        assert!(TermError::NoTerminal.is_init_failure());
        assert!(TermError::Capability(CapsError::NotFound("x".into())).is_init_failure());
        let w = TermError::Write { unwritten: 3, source: io::Error::other("gone") };
        assert!(!w.is_init_failure());
    }

    #[test]
    fn messages_name_the_terminal() {
        let e = TermError::MissingCapability { term: "dumb".into(), what: "cursor addressing" };
        assert_eq!(e.to_string(), "cannot initialize display: terminal \"dumb\" lacks cursor addressing");
    }

    #[test]
    fn write_error_reports_unwritten_count() {
        let e = TermError::Write { unwritten: 12, source: io::Error::other("EIO") };
        assert!(e.to_string().contains("12 bytes unwritten"));
    }
}
