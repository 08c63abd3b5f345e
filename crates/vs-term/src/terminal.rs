// SPDX-License-Identifier: MIT
//
// The tty device: size queries, raw mode, and the raw-fd writer.
//
// Safety: termios (tcgetattr, tcsetattr, cfgetospeed), ioctl (TIOCGWINSZ),
// isatty and write(2) are the POSIX interfaces for a terminal and have no
// safe wrapper in std. Each unsafe block is a single call.
#![allow(unsafe_code)]
//
// `TtyWriter` writes straight to a file descriptor with write(2) rather
// than through `std::io::Stdout`: the output buffer needs to see EAGAIN and
// EINTR itself to retry them, and the std line-buffering layer would only
// get in the way of the single-flush-per-refresh design.
//
// `RawMode` puts the input side into non-canonical, no-echo mode and
// restores it on drop, or from the panic hook if the program dies while
// drawing.

use std::io::{self, Write};
#[cfg(unix)]
use std::sync::Mutex;
use std::sync::Once;

use crate::config::TermConfig;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub rows: u16,
    pub cols: u16,
}

impl Size {
    /// The size assumed when nothing better is known.
    pub const FALLBACK: Self = Self { rows: 24, cols: 80 };

    #[inline]
    #[must_use]
    pub const fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Total number of cells.
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }
}

// ─── Queries ────────────────────────────────────────────────────────────────

/// Ask the kernel for the window size of `fd`.
#[cfg(unix)]
#[must_use]
pub fn window_size(fd: i32) -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) };
    (result == 0 && ws.ws_col > 0 && ws.ws_row > 0).then(|| Size::new(ws.ws_row, ws.ws_col))
}

#[cfg(not(unix))]
#[must_use]
pub fn window_size(_fd: i32) -> Option<Size> {
    None
}

/// The screen size: the window size of stdout, stdin or stderr (whichever
/// answers first), then `LINES`/`COLUMNS`, then 80×24. Either dimension
/// falls back on its own.
#[must_use]
pub fn screen_size(cfg: &TermConfig) -> Size {
    let ws = [1, 0, 2].into_iter().find_map(window_size);
    let rows = ws.map(|s| s.rows).or(cfg.lines).unwrap_or(Size::FALLBACK.rows);
    let cols = ws.map(|s| s.cols).or(cfg.columns).unwrap_or(Size::FALLBACK.cols);
    Size::new(rows, cols)
}

#[cfg(unix)]
#[must_use]
pub fn is_tty(fd: i32) -> bool {
    unsafe { libc::isatty(fd) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty(_fd: i32) -> bool {
    false
}

/// The output speed of the tty on `fd`, in bits per second.
#[cfg(unix)]
#[must_use]
pub fn output_baud(fd: i32) -> Option<u32> {
    let mut t: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &raw mut t) } != 0 {
        return None;
    }
    let speed = unsafe { libc::cfgetospeed(&raw const t) };
    let table: &[(libc::speed_t, u32)] = &[
        (libc::B50, 50),
        (libc::B75, 75),
        (libc::B110, 110),
        (libc::B134, 134),
        (libc::B150, 150),
        (libc::B200, 200),
        (libc::B300, 300),
        (libc::B600, 600),
        (libc::B1200, 1200),
        (libc::B1800, 1800),
        (libc::B2400, 2400),
        (libc::B4800, 4800),
        (libc::B9600, 9600),
        (libc::B19200, 19200),
        (libc::B38400, 38400),
    ];
    table.iter().find(|(s, _)| *s == speed).map(|&(_, b)| b)
}

#[cfg(not(unix))]
#[must_use]
pub fn output_baud(_fd: i32) -> Option<u32> {
    None
}

// ─── TtyWriter ──────────────────────────────────────────────────────────────

/// An unbuffered writer over a raw file descriptor.
///
/// Errors come back exactly as write(2) reports them, including
/// `WouldBlock` and `Interrupted`.
#[derive(Debug, Clone, Copy)]
pub struct TtyWriter {
    fd: i32,
}

impl TtyWriter {
    #[must_use]
    pub const fn new(fd: i32) -> Self {
        Self { fd }
    }

    /// The standard output descriptor.
    #[must_use]
    pub const fn stdout() -> Self {
        Self::new(1)
    }

    #[must_use]
    pub const fn fd(&self) -> i32 {
        self.fd
    }
}

impl Write for TtyWriter {
    #[cfg(unix)]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe { libc::write(self.fd, buf.as_ptr().cast::<libc::c_void>(), buf.len()) };
        usize::try_from(n).map_err(|_| io::Error::last_os_error())
    }

    #[cfg(not(unix))]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Panic-safe restore ─────────────────────────────────────────────────────

#[cfg(unix)]
static TERMIOS_BACKUP: Mutex<Option<(i32, libc::termios)>> = Mutex::new(None);

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Restore the saved termios before the default panic message prints, so
/// the message lands on a terminal that echoes again.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            #[cfg(unix)]
            if let Ok(guard) = TERMIOS_BACKUP.lock() {
                if let Some((fd, ref t)) = *guard {
                    unsafe {
                        let _ = libc::tcsetattr(fd, libc::TCSANOW, t);
                    }
                }
            }
            original(info);
        }));
    });
}

// ─── RawMode ────────────────────────────────────────────────────────────────

/// Non-canonical, no-echo input mode, restored on drop.
///
/// A no-op when `fd` is not a terminal.
pub struct RawMode {
    #[cfg(unix)]
    saved: Option<(i32, libc::termios)>,
}

impl RawMode {
    /// # Errors
    ///
    /// Returns the OS error if the terminal attributes cannot be read or set.
    #[cfg(unix)]
    pub fn enable(fd: i32) -> io::Result<Self> {
        if !is_tty(fd) {
            return Ok(Self { saved: None });
        }
        install_panic_hook();

        let mut t: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &raw mut t) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let saved = t;
        if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
            *guard = Some((fd, saved));
        }

        t.c_iflag &= !(libc::ICRNL | libc::IXON | libc::ISTRIP);
        t.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN);
        t.c_cc[libc::VMIN] = 1;
        t.c_cc[libc::VTIME] = 0;
        if unsafe { libc::tcsetattr(fd, libc::TCSADRAIN, &raw const t) } != 0 {
            return Err(io::Error::last_os_error());
        }
        log::debug!("raw mode on fd {fd}");
        Ok(Self { saved: Some((fd, saved)) })
    }

    /// # Errors
    ///
    /// Never fails on this platform.
    #[cfg(not(unix))]
    pub fn enable(_fd: i32) -> io::Result<Self> {
        Ok(Self {})
    }

    /// Whether the terminal attributes were actually changed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        #[cfg(unix)]
        {
            self.saved.is_some()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some((fd, t)) = self.saved.take() {
            unsafe {
                let _ = libc::tcsetattr(fd, libc::TCSADRAIN, &raw const t);
            }
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
