// SPDX-License-Identifier: MIT
//
// Error taxonomy for the terminal layer.
//
// Every failure here is fatal to the session and never retried: a terminal
// that refuses a termios change or answers a cursor query with garbage will
// not behave differently on the second attempt. Malformed escape sequences
// on input are deliberately absent — the decoder degrades those to raw
// bytes instead of failing.

use std::io;

use thiserror::Error;

/// Result alias used throughout `kigo-term`.
pub type Result<T> = std::result::Result<T, TermError>;

/// Everything that can go wrong while driving the terminal.
#[derive(Debug, Error)]
pub enum TermError {
    /// Reading or applying line-discipline settings failed.
    #[error("failed to configure terminal: {0}")]
    Settings(#[source] io::Error),

    /// The OS window-size query failed.
    #[error("failed to query window size: {0}")]
    WindowSize(#[source] io::Error),

    /// I/O failed while running the cursor-position probe.
    #[error("cursor position probe failed: {0}")]
    Probe(#[source] io::Error),

    /// The terminal answered the cursor-position probe with an unexpected shape.
    #[error("malformed cursor position report: `{0}`")]
    MalformedReport(String),

    /// Reading the input stream failed; the decode scan has stopped.
    #[error("failed to read input: {0}")]
    Read(#[source] io::Error),

    /// The background key scanner thread could not be started.
    #[error("failed to start key scanner: {0}")]
    Spawn(#[source] io::Error),

    /// Writing a frame to the terminal failed.
    #[error("failed to write output: {0}")]
    Write(#[source] io::Error),

    /// The input stream ended and every decoded key has been delivered.
    #[error("input closed")]
    InputClosed,

    /// An operation was called in a session state that does not allow it.
    #[error("{op} is not allowed while the session is {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },
}

/// Problems found while building an escape-sequence trie.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    /// A sequence with no bytes cannot be matched.
    #[error("empty escape sequence")]
    Empty,

    /// The same sequence was listed twice.
    #[error("escape sequence `{0}` is mapped more than once")]
    Duplicate(String),

    /// One sequence is a strict prefix of another, so the shorter one would
    /// shadow the longer one.
    #[error("escape sequence `{shorter}` is a prefix of `{longer}`")]
    PrefixCollision { shorter: String, longer: String },
}

/// Render bytes with control characters escaped, for error messages and logs.
pub(crate) fn escape_bytes(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_bytes_shows_control_chars() {
        assert_eq!(escape_bytes(b"\x1b[24;80"), "\\x1b[24;80");
    }

    #[test]
    fn malformed_report_message_includes_bytes() {
        let err = TermError::MalformedReport(escape_bytes(b"\x1b[oops"));
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn trie_error_messages() {
        assert_eq!(TrieError::Empty.to_string(), "empty escape sequence");
        let err = TrieError::PrefixCollision {
            shorter: escape_bytes(b"\x1b["),
            longer: escape_bytes(b"\x1b[A"),
        };
        assert_eq!(err.to_string(), "escape sequence `\\x1b[` is a prefix of `\\x1b[A`");
    }

    #[test]
    fn invalid_state_message() {
        let err = TermError::InvalidState {
            op: "read_key",
            state: "closed",
        };
        assert_eq!(
            err.to_string(),
            "read_key is not allowed while the session is closed"
        );
    }

    #[test]
    fn settings_error_keeps_source() {
        use std::error::Error as _;
        let err = TermError::Settings(io::Error::other("no tty"));
        assert!(err.source().is_some());
    }
}
