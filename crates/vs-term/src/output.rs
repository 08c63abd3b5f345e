// SPDX-License-Identifier: MIT
//
// Output buffering with retry and baud-rate pacing.
//
// Everything the driver emits lands here first. A refresh produces one
// flush, so a whole screen update usually reaches the device in a single
// write(2). The buffer is bounded: once it holds `HIGH_WATER` bytes it
// flushes on its own and keeps accepting.
//
// Device errors split three ways:
//
//   Interrupted   retried immediately
//   WouldBlock    retried after 100 ms
//   anything else the flush stops; unwritten bytes stay buffered
//
// An error hit by an automatic flush in the middle of `write` cannot be
// returned from there, so it is kept and handed back by the next explicit
// `flush`, which leaves the bytes in place for the one after.
//
// Slow serial lines get paced: between 150 and 9600 baud, once a tenth of
// a second's worth of bytes has gone out, the buffer flushes and sleeps a
// second if the previous pause was less than a second ago.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::error::{Result, TermError};

/// Buffered bytes that trigger an automatic flush.
pub const HIGH_WATER: usize = 4096;

const RETRY_DELAY: Duration = Duration::from_millis(100);
const PACING_PAUSE: Duration = Duration::from_secs(1);

// ─── OutputBuffer ───────────────────────────────────────────────────────────

/// A bounded byte buffer in front of a device writer.
pub struct OutputBuffer<W: Write> {
    dev: W,
    buf: Vec<u8>,
    baud: Option<u32>,
    since_pause: usize,
    last_pause: Option<Instant>,
    pending: Option<io::Error>,
    queued: u64,
    written: u64,
    sleep: fn(Duration),
}

impl<W: Write> OutputBuffer<W> {
    #[must_use]
    pub fn new(dev: W) -> Self {
        Self {
            dev,
            buf: Vec::with_capacity(HIGH_WATER),
            baud: None,
            since_pause: 0,
            last_pause: None,
            pending: None,
            queued: 0,
            written: 0,
            sleep: std::thread::sleep,
        }
    }

    /// Pace output for a line running at `baud`.
    #[must_use]
    pub const fn with_baud(mut self, baud: Option<u32>) -> Self {
        self.baud = baud;
        self
    }

    /// Replace the sleep used for retries and pacing.
    #[must_use]
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Bytes waiting to be written.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Every byte ever handed to [`write`](Self::write).
    #[inline]
    #[must_use]
    pub const fn bytes_queued(&self) -> u64 {
        self.queued
    }

    /// Every byte the device accepted.
    #[inline]
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.written
    }

    #[inline]
    #[must_use]
    pub const fn device(&self) -> &W {
        &self.dev
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut W {
        &mut self.dev
    }

    /// Append bytes, flushing whenever the buffer fills.
    pub fn write(&mut self, mut bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.queued += bytes.len() as u64;
        self.since_pause += bytes.len();

        while self.pending.is_none() {
            let room = HIGH_WATER.saturating_sub(self.buf.len());
            if room >= bytes.len() {
                break;
            }
            self.buf.extend_from_slice(&bytes[..room]);
            bytes = &bytes[room..];
            self.auto_flush();
        }
        // After a failed flush the buffer grows past the mark until an
        // explicit flush drains it.
        self.buf.extend_from_slice(bytes);

        self.pace();
    }

    /// Write out everything buffered.
    ///
    /// # Errors
    ///
    /// [`TermError::Write`] when the device fails, or when an automatic
    /// flush failed since the last call. Unwritten bytes stay buffered.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(source) = self.pending.take() {
            return Err(TermError::Write { unwritten: self.buf.len(), source });
        }
        self.drain().map_err(|source| TermError::Write { unwritten: self.buf.len(), source })
    }

    fn auto_flush(&mut self) {
        if let Err(e) = self.drain() {
            log::debug!("deferred write error with {} bytes buffered: {e}", self.buf.len());
            self.pending = Some(e);
        }
    }

    fn drain(&mut self) -> io::Result<()> {
        let mut done = 0;
        let result = loop {
            if done >= self.buf.len() {
                break self.dev.flush();
            }
            match self.dev.write(&self.buf[done..]) {
                Ok(0) => break Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => done += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => (self.sleep)(RETRY_DELAY),
                Err(e) => break Err(e),
            }
        };
        if done > 0 {
            log::trace!("flushed {done} bytes");
        }
        self.written += done as u64;
        self.buf.drain(..done);
        result
    }

    fn pace(&mut self) {
        let Some(baud) = self.baud.filter(|b| (151..=9600).contains(b)) else {
            return;
        };
        if self.since_pause.saturating_mul(10) <= baud as usize {
            return;
        }
        self.since_pause = 0;
        let now = Instant::now();
        if self.last_pause.is_some_and(|t| now.duration_since(t) <= PACING_PAUSE) {
            self.auto_flush();
            (self.sleep)(PACING_PAUSE);
        }
        self.last_pause = Some(now);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use pretty_assertions::assert_eq;

    /// A device that replays scripted failures before accepting writes.
    #[derive(Default)]
    struct Scripted {
        script: VecDeque<io::ErrorKind>,
        accept_max: Option<usize>,
        out: Vec<u8>,
        calls: usize,
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if let Some(kind) = self.script.pop_front() {
                return Err(io::Error::from(kind));
            }
            let n = self.accept_max.map_or(buf.len(), |m| m.min(buf.len()));
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    thread_local! {
        static SLEPT: RefCell<Vec<Duration>> = const { RefCell::new(Vec::new()) };
    }

    fn record_sleep(d: Duration) {
        SLEPT.with(|s| s.borrow_mut().push(d));
    }

    fn slept() -> Vec<Duration> {
        SLEPT.with(|s| s.borrow_mut().drain(..).collect())
    }

    fn buffer(script: &[io::ErrorKind]) -> OutputBuffer<Scripted> {
        let dev = Scripted { script: script.iter().copied().collect(), ..Scripted::default() };
        OutputBuffer::new(dev).with_sleep(record_sleep)
    }

    // ── Buffering ──

    #[test]
    fn nothing_reaches_the_device_before_flush() {
        let mut out = buffer(&[]);
        out.write(b"hello");
        assert_eq!(out.device().calls, 0);
        assert_eq!(out.pending(), b"hello");
        out.flush().unwrap();
        assert_eq!(out.device().out, b"hello");
        assert!(out.pending().is_empty());
        assert_eq!(out.bytes_written(), 5);
    }

    #[test]
    fn high_water_mark_triggers_flush() {
        let mut out = buffer(&[]);
        out.write(&[b'x'; HIGH_WATER]);
        assert_eq!(out.device().calls, 0);
        out.write(b"y");
        assert_eq!(out.device().out.len(), HIGH_WATER);
        assert_eq!(out.pending(), b"y");
        assert_eq!(out.bytes_queued(), HIGH_WATER as u64 + 1);
    }

    #[test]
    fn oversized_write_is_chunked() {
        let mut out = buffer(&[]);
        out.write(&vec![b'z'; HIGH_WATER * 2 + 10]);
        assert_eq!(out.device().out.len(), HIGH_WATER * 2);
        assert_eq!(out.pending().len(), 10);
    }

    #[test]
    fn partial_writes_are_continued() {
        let mut out = buffer(&[]);
        out.device_mut().accept_max = Some(3);
        out.write(b"abcdefgh");
        out.flush().unwrap();
        assert_eq!(out.device().out, b"abcdefgh");
        assert_eq!(out.device().calls, 3);
    }

    // ── Retry ──

    #[test]
    fn interrupted_retries_without_sleeping() {
        let mut out = buffer(&[io::ErrorKind::Interrupted, io::ErrorKind::Interrupted]);
        out.write(b"ok");
        out.flush().unwrap();
        assert_eq!(out.device().out, b"ok");
        assert!(slept().is_empty());
    }

    #[test]
    fn would_block_sleeps_then_retries() {
        let mut out = buffer(&[io::ErrorKind::WouldBlock]);
        out.write(b"ok");
        out.flush().unwrap();
        assert_eq!(out.device().out, b"ok");
        assert_eq!(slept(), vec![RETRY_DELAY]);
    }

    #[test]
    fn hard_error_keeps_bytes_for_retry() {
        let mut out = buffer(&[io::ErrorKind::BrokenPipe]);
        out.write(b"data");
        let err = out.flush().unwrap_err();
        assert!(matches!(err, TermError::Write { unwritten: 4, .. }));
        assert_eq!(out.pending(), b"data");
        out.flush().unwrap();
        assert_eq!(out.device().out, b"data");
    }

    #[test]
    fn automatic_flush_error_surfaces_at_next_flush() {
        let mut out = buffer(&[io::ErrorKind::PermissionDenied]);
        out.write(&[b'a'; HIGH_WATER]);
        out.write(b"b");
        // The automatic flush failed; nothing was lost.
        assert_eq!(out.pending().len(), HIGH_WATER + 1);
        let err = out.flush().unwrap_err();
        assert!(matches!(err, TermError::Write { unwritten, .. } if unwritten == HIGH_WATER + 1));
        out.flush().unwrap();
        assert_eq!(out.device().out.len(), HIGH_WATER + 1);
    }

    // ── Pacing ──

    #[test]
    fn fast_lines_are_not_paced() {
        let mut out = buffer(&[]).with_baud(Some(38400));
        out.write(&[b'x'; 5000]);
        out.write(&[b'x'; 5000]);
        assert!(slept().is_empty());
    }

    #[test]
    fn slow_lines_pause_between_bursts() {
        let mut out = buffer(&[]).with_baud(Some(1200));
        // 121 bytes exceed a tenth of a second at 1200 baud.
        out.write(&[b'x'; 121]);
        assert!(slept().is_empty(), "the first burst only starts the clock");
        out.write(&[b'x'; 121]);
        assert_eq!(slept(), vec![PACING_PAUSE]);
        assert_eq!(out.device().out.len(), 242);
    }
}
