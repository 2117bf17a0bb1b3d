// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit — the screen buffer and the size prober
// decide that. This module just knows the byte-level encoding of every
// terminal command kigo sends.
//
// Cursor positions are 0-indexed in our API and converted to 1-indexed for
// the terminal (ANSI uses 1-based coordinates).
use std::io::{self, Write};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(row, col)` using CUP. Both are 0-indexed.
#[inline]
pub fn cursor_to(w: &mut impl Write, row: u16, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(row) + 1, u32::from(col) + 1)
}

/// Move the cursor right by `n` columns (CUF), stopping at the edge.
#[inline]
pub fn cursor_forward(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}C")
}

/// Move the cursor down by `n` rows (CUD), stopping at the edge.
#[inline]
pub fn cursor_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}B")
}

/// Ask the terminal to report the cursor position (DSR 6).
///
/// The reply arrives on stdin as `ESC [ row ; col R`.
#[inline]
pub fn request_cursor_position(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[6n")
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Clear from the cursor to the end of the line (EL 0).
#[inline]
pub fn clear_line_right(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
