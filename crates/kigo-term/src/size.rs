// SPDX-License-Identifier: MIT
//
// Window size discovery.
//
// The OS usually knows the window size (TIOCGWINSZ), but some
// pseudo-terminals answer with zero columns. When that happens we ask the
// terminal itself: push the cursor as far right and down as it will go,
// request a cursor-position report, and read back `ESC [ row ; col R`.
// The terminal clamps the move to its real bottom-right corner, so the
// reported position *is* the size.
//
// Runs once per session, before the key decoder takes over stdin.

use std::io::{self, Read, Write};

use tracing::{debug, warn};

use crate::ansi;
use crate::error::{Result, TermError, escape_bytes};
use crate::terminal::TtyDevice;

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowGeometry {
    /// Number of rows (height).
    pub rows: u16,
    /// Number of columns (width).
    pub columns: u16,
}

/// Default byte budget for reading a cursor-position report.
pub const DEFAULT_PROBE_ATTEMPTS: usize = 32;

/// Discovers the window size, falling back to the cursor-position probe.
#[derive(Debug, Clone, Copy)]
pub struct WindowSizeProber {
    attempts: usize,
    always_probe: bool,
}

impl Default for WindowSizeProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_ATTEMPTS)
    }
}

impl WindowSizeProber {
    /// A prober that reads at most `attempts` reply bytes.
    #[must_use]
    pub const fn new(attempts: usize) -> Self {
        Self {
            attempts,
            always_probe: false,
        }
    }

    /// Skip the OS answer and always run the interactive probe.
    #[must_use]
    pub const fn always_probe(mut self, yes: bool) -> Self {
        self.always_probe = yes;
        self
    }

    /// Determine the window size.
    ///
    /// Uses the OS answer unless it reports zero columns, in which case the
    /// interactive probe runs over `input`/`output`.
    ///
    /// # Errors
    ///
    /// [`TermError::WindowSize`] if the OS query fails,
    /// [`TermError::Probe`] if probe I/O fails, and
    /// [`TermError::MalformedReport`] if the reply can't be parsed.
    pub fn probe(
        &self,
        device: &impl TtyDevice,
        input: &mut impl Read,
        output: &mut impl Write,
    ) -> Result<WindowGeometry> {
        let reported = device.window_size().map_err(TermError::WindowSize)?;

        if reported.columns != 0 && !self.always_probe {
            debug!(rows = reported.rows, columns = reported.columns, "window size from OS");
            return Ok(reported);
        }

        if reported.columns == 0 {
            warn!(rows = reported.rows, "OS reported zero columns, probing cursor position");
        }
        let probed = self.probe_cursor(input, output)?;
        debug!(rows = probed.rows, columns = probed.columns, "window size from probe");
        Ok(probed)
    }

    /// Run the cursor-position round trip and parse the reply.
    ///
    /// # Errors
    ///
    /// [`TermError::Probe`] on I/O failure, [`TermError::MalformedReport`]
    /// if no `R` arrives within the attempt budget or the reply isn't
    /// `ESC [ rows ; cols`.
    pub fn probe_cursor(
        &self,
        input: &mut impl Read,
        output: &mut impl Write,
    ) -> Result<WindowGeometry> {
        ansi::cursor_forward(output, 999)
            .and_then(|()| ansi::cursor_down(output, 999))
            .and_then(|()| ansi::request_cursor_position(output))
            .and_then(|()| output.flush())
            .map_err(TermError::Probe)?;

        let mut reply = Vec::with_capacity(self.attempts);
        let mut terminated = false;
        let mut byte = [0u8; 1];

        for _ in 0..self.attempts {
            match input.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == b'R' => {
                    terminated = true;
                    break;
                }
                Ok(_) => reply.push(byte[0]),
                // An idle read timeout spends one attempt.
                Err(e) if is_idle(&e) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(TermError::Probe(e)),
            }
        }

        if !terminated {
            return Err(TermError::MalformedReport(escape_bytes(&reply)));
        }
        parse_cursor_report(&reply)
    }
}

/// Whether an I/O error only means "nothing arrived before the timeout".
pub(crate) fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Parse `ESC [ rows ; cols` (the bytes before the `R` terminator).
///
/// # Errors
///
/// [`TermError::MalformedReport`] for any other shape.
pub fn parse_cursor_report(reply: &[u8]) -> Result<WindowGeometry> {
    let malformed = || TermError::MalformedReport(escape_bytes(reply));

    let body = reply.strip_prefix(b"\x1b[").ok_or_else(malformed)?;
    let text = std::str::from_utf8(body).map_err(|_| malformed())?;
    let (rows, columns) = text.split_once(';').ok_or_else(malformed)?;

    let rows = parse_number(rows).ok_or_else(malformed)?;
    let columns = parse_number(columns).ok_or_else(malformed)?;
    Ok(WindowGeometry { rows, columns })
}

fn parse_number(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::terminal::testing::{FakeTty, NotATty};

    fn degenerate() -> FakeTty {
        FakeTty::new(WindowGeometry {
            rows: 0,
            columns: 0,
        })
    }

    // ── OS path ─────────────────────────────────────────────────────

    #[test]
    fn os_size_is_used_when_columns_known() {
        let tty = FakeTty::new(WindowGeometry {
            rows: 40,
            columns: 120,
        });
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();

        let g = WindowSizeProber::default()
            .probe(&tty, &mut input, &mut output)
            .unwrap();

        assert_eq!(g, WindowGeometry { rows: 40, columns: 120 });
        assert!(output.is_empty(), "no probe sequences written");
    }

    #[test]
    fn os_failure_is_window_size_error() {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let err = WindowSizeProber::default()
            .probe(&NotATty, &mut input, &mut output)
            .unwrap_err();
        assert!(matches!(err, TermError::WindowSize(_)));
    }

    // ── Probe fallback ──────────────────────────────────────────────

    #[test]
    fn zero_columns_falls_back_to_probe() {
        let mut input = Cursor::new(b"\x1b[24;80R".to_vec());
        let mut output = Vec::new();

        let g = WindowSizeProber::default()
            .probe(&degenerate(), &mut input, &mut output)
            .unwrap();

        assert_eq!(g, WindowGeometry { rows: 24, columns: 80 });
        assert_eq!(output, b"\x1b[999C\x1b[999B\x1b[6n");
    }

    #[test]
    fn always_probe_ignores_os_answer() {
        let tty = FakeTty::new(WindowGeometry {
            rows: 40,
            columns: 120,
        });
        let mut input = Cursor::new(b"\x1b[50;132R".to_vec());
        let mut output = Vec::new();

        let g = WindowSizeProber::default()
            .always_probe(true)
            .probe(&tty, &mut input, &mut output)
            .unwrap();

        assert_eq!(g, WindowGeometry { rows: 50, columns: 132 });
    }

    #[test]
    fn probe_stops_reading_at_terminator() {
        let mut input = Cursor::new(b"\x1b[24;80Rxyz".to_vec());
        let mut output = Vec::new();
        WindowSizeProber::default()
            .probe_cursor(&mut input, &mut output)
            .unwrap();
        assert_eq!(input.position(), 8);
    }

    #[test]
    fn missing_terminator_is_malformed() {
        let mut input = Cursor::new(b"\x1b[24;80".to_vec());
        let mut output = Vec::new();
        let err = WindowSizeProber::default()
            .probe_cursor(&mut input, &mut output)
            .unwrap_err();
        assert!(matches!(err, TermError::MalformedReport(_)));
    }

    #[test]
    fn attempt_budget_is_bounded() {
        // An endless stream that never sends `R`.
        let mut input = io::repeat(b'1');
        let mut output = Vec::new();
        let err = WindowSizeProber::new(32)
            .probe_cursor(&mut input, &mut output)
            .unwrap_err();
        match err {
            TermError::MalformedReport(seen) => assert_eq!(seen.len(), 32),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn garbage_reply_is_malformed() {
        let mut input = Cursor::new(b"hello R".to_vec());
        let mut output = Vec::new();
        let err = WindowSizeProber::default()
            .probe_cursor(&mut input, &mut output)
            .unwrap_err();
        assert!(matches!(err, TermError::MalformedReport(_)));
    }

    #[test]
    fn write_failure_is_probe_error() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut input = Cursor::new(b"\x1b[24;80R".to_vec());
        let err = WindowSizeProber::default()
            .probe_cursor(&mut input, &mut Broken)
            .unwrap_err();
        assert!(matches!(err, TermError::Probe(_)));
    }

    // ── Report parsing ──────────────────────────────────────────────

    #[test]
    fn parse_valid_report() {
        assert_eq!(
            parse_cursor_report(b"\x1b[1;1").unwrap(),
            WindowGeometry { rows: 1, columns: 1 }
        );
    }

    #[test]
    fn parse_rejects_missing_csi() {
        assert!(parse_cursor_report(b"[24;80").is_err());
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert!(parse_cursor_report(b"\x1b[2480").is_err());
    }

    #[test]
    fn parse_rejects_empty_fields() {
        assert!(parse_cursor_report(b"\x1b[;80").is_err());
        assert!(parse_cursor_report(b"\x1b[24;").is_err());
    }

    #[test]
    fn parse_rejects_signs_and_overflow() {
        assert!(parse_cursor_report(b"\x1b[+24;80").is_err());
        assert!(parse_cursor_report(b"\x1b[24;99999").is_err());
    }
}
