// SPDX-License-Identifier: MIT
//
// Frame buffering.
//
// `ScreenBuffer` accumulates every byte of a frame — cursor moves, clears,
// row text — in memory, and `flush` hands the whole frame to the terminal
// in a single `write_all`. The terminal never sees half a frame, which is
// what keeps redraws from flickering.
//
// Drawing primitives never fail and never touch the terminal: they append
// to a `Vec<u8>`. Only `flush` does I/O.
//
// The real output is a duplicate of the stdout descriptor rather than
// `io::stdout()`: the standard handle is line buffered and would split a
// frame at its last newline.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::AsFd;

use crate::ansi;
use crate::error::{Result, TermError};

/// Default capacity: enough for a full 80×24 frame without reallocating.
const DEFAULT_CAPACITY: usize = 4096;

/// Duplicate the stdout descriptor as an unbuffered `File`.
///
/// # Errors
///
/// Returns an error if the descriptor can't be duplicated.
pub fn stdout_file() -> io::Result<File> {
    Ok(File::from(io::stdout().as_fd().try_clone_to_owned()?))
}

/// Accumulates one frame of terminal output and writes it atomically.
pub struct ScreenBuffer<W> {
    buf: Vec<u8>,
    out: W,
}

impl<W: Write> ScreenBuffer<W> {
    /// An empty buffer that flushes to `out`.
    pub fn new(out: W) -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
            out,
        }
    }

    /// Number of bytes waiting for the next flush.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been drawn since the last flush.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The pending frame bytes (for testing and debugging).
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The output the buffer flushes to.
    pub const fn get_ref(&self) -> &W {
        &self.out
    }

    /// Direct access to the output, bypassing the frame buffer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }

    // ── Drawing primitives ──────────────────────────────────────────

    /// Append literal text.
    pub fn write_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Clear from the cursor to the end of the line.
    pub fn clear_line_right(&mut self) {
        let _ = ansi::clear_line_right(&mut self.buf);
    }

    /// Clear the whole screen.
    pub fn clear_screen(&mut self) {
        let _ = ansi::clear_screen(&mut self.buf);
    }

    /// Move the cursor to a 0-indexed `(row, col)`.
    pub fn move_cursor(&mut self, row: u16, col: u16) {
        let _ = ansi::cursor_to(&mut self.buf, row, col);
    }

    /// Move the cursor to the top-left corner.
    pub fn move_cursor_home(&mut self) {
        self.move_cursor(0, 0);
    }

    /// Hide the cursor.
    pub fn hide_cursor(&mut self) {
        let _ = ansi::cursor_hide(&mut self.buf);
    }

    /// Show the cursor.
    pub fn show_cursor(&mut self) {
        let _ = ansi::cursor_show(&mut self.buf);
    }

    // ── Output ──────────────────────────────────────────────────────

    /// Write the whole frame in one operation and start a new one.
    ///
    /// An empty frame writes nothing.
    ///
    /// # Errors
    ///
    /// [`TermError::Write`] if the output rejects the frame. The buffer is
    /// cleared either way, so a failed frame is never half-repeated.
    pub fn flush(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = self
            .out
            .write_all(&self.buf)
            .and_then(|()| self.out.flush())
            .map_err(TermError::Write);
        self.buf.clear();
        result
    }

    /// Drop the pending frame without writing it.
    pub fn discard(&mut self) {
        self.buf.clear();
    }
}

/// Draw with `write!` straight into the pending frame.
impl<W> Write for ScreenBuffer<W> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Intentionally a no-op. Frames go out via `ScreenBuffer::flush`.
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
