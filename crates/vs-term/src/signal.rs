// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Signal bracketing for terminal mutation.
//
// A suspend (SIGTSTP) or resize (SIGWINCH) that lands halfway through
// switching video modes or rebuilding the grids leaves the terminal in a
// state nobody tracks. `SignalGuard::block()` holds the disruptive signals
// until the guard drops; the kernel delivers anything that arrived in the
// meantime as soon as the previous mask is restored.
//
// Guards nest. Only the outermost one touches the mask, so a helper that
// blocks signals can be called from code that already did.
//
// The resize flag is the other half: the SIGWINCH handler only sets an
// atomic, and the application polls it between refreshes.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};

// ─── SignalGuard ────────────────────────────────────────────────────────────

#[cfg(unix)]
const BLOCKED: [libc::c_int; 6] = [
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTSTP,
    libc::SIGTTIN,
    libc::SIGTTOU,
    libc::SIGWINCH,
];

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
    #[cfg(unix)]
    static SAVED: Cell<Option<libc::sigset_t>> = const { Cell::new(None) };
}

/// Blocks disruptive signals for its lifetime.
///
/// ```
/// use vs_term::signal::SignalGuard;
///
/// {
///     let _outer = SignalGuard::block();
///     let _inner = SignalGuard::block();
///     assert_eq!(SignalGuard::depth(), 2);
/// }
/// assert_eq!(SignalGuard::depth(), 0);
/// ```
#[must_use = "signals are unblocked as soon as the guard drops"]
pub struct SignalGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl SignalGuard {
    pub fn block() -> Self {
        let depth = DEPTH.get();
        if depth == 0 {
            mask_signals();
        }
        DEPTH.set(depth + 1);
        Self { _not_send: std::marker::PhantomData }
    }

    /// How many guards are live on this thread.
    #[must_use]
    pub fn depth() -> u32 {
        DEPTH.get()
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        let depth = DEPTH.get().saturating_sub(1);
        DEPTH.set(depth);
        if depth == 0 {
            restore_signals();
        }
    }
}

#[cfg(unix)]
fn mask_signals() {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        let mut old: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&raw mut set);
        for sig in BLOCKED {
            libc::sigaddset(&raw mut set, sig);
        }
        if libc::pthread_sigmask(libc::SIG_BLOCK, &raw const set, &raw mut old) == 0 {
            SAVED.set(Some(old));
        } else {
            log::warn!("could not block signals: {}", std::io::Error::last_os_error());
        }
    }
}

#[cfg(unix)]
fn restore_signals() {
    if let Some(old) = SAVED.take() {
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &raw const old, std::ptr::null_mut());
        }
    }
}

#[cfg(not(unix))]
const fn mask_signals() {}

#[cfg(not(unix))]
const fn restore_signals() {}

// ─── Resize ─────────────────────────────────────────────────────────────────

static RESIZED: AtomicBool = AtomicBool::new(false);

/// Install a SIGWINCH handler that records the resize for [`take_resize`].
/// Interrupted system calls restart.
#[cfg(unix)]
pub fn install_resize_handler() {
    install_winch(libc::SA_RESTART);
}

/// Like [`install_resize_handler`], but a blocking read in progress fails
/// with `Interrupted`, so a loop waiting for input can redraw at once.
#[cfg(unix)]
pub fn install_resize_interrupt() {
    install_winch(0);
}

#[cfg(unix)]
fn install_winch(flags: libc::c_int) {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = on_sigwinch as *const () as usize;
        sa.sa_flags = flags;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn on_sigwinch(_sig: libc::c_int) {
    RESIZED.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
pub fn install_resize_handler() {}

#[cfg(not(unix))]
pub fn install_resize_interrupt() {}

/// Whether the window was resized since the last call.
pub fn take_resize() -> bool {
    RESIZED.swap(false, Ordering::Relaxed)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
