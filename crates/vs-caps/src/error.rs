// SPDX-License-Identifier: MIT
//
// Errors raised while locating or decoding a capability database.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a capability database could not be produced for a terminal name.
#[derive(Debug, Error)]
pub enum CapsError {
    /// The terminal name is empty, contains a path separator, or starts with a dot.
    #[error("invalid terminal name {0:?}")]
    InvalidName(String),

    /// No database entry exists for the terminal in any search directory.
    #[error("no capability entry for terminal {0:?}")]
    NotFound(String),

    /// The compiled file does not start with a known magic number.
    #[error("{path}: bad magic number {magic:#o}")]
    BadMagic { path: PathBuf, magic: u16 },

    /// The compiled file ended before the named section was complete.
    #[error("{path}: truncated {section} section")]
    Truncated { path: PathBuf, section: &'static str },

    /// Reading the database file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for capability store operations.
pub type Result<T> = std::result::Result<T, CapsError>;
