//! Document — the text being viewed, as a flat list of rows.
//!
//! Rows are stored as raw bytes without their line terminator. Nothing here
//! decodes UTF-8: the screen is drawn byte for byte, so a row is only ever
//! measured and sliced in bytes.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// An ordered sequence of text rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    rows: Vec<Vec<u8>>,
}

impl Document {
    /// An empty document.
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Split `text` into rows on `\n`, dropping a trailing `\r` from each.
    ///
    /// A final line terminator doesn't produce an extra empty row.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Like [`from_text`](Self::from_text), for bytes that may not be UTF-8.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut rows: Vec<Vec<u8>> = bytes.split(|&b| b == b'\n').map(trim_cr).collect();
        if bytes.ends_with(b"\n") || bytes.is_empty() {
            rows.pop();
        }
        Self { rows }
    }

    /// Read a document from any buffered reader.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn read_from(reader: impl BufRead) -> io::Result<Self> {
        let rows = reader
            .split(b'\n')
            .map(|line| line.map(|l| trim_cr(&l)))
            .collect::<io::Result<_>>()?;
        Ok(Self { rows })
    }

    /// Load a document from a file.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file can't be opened or read.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the document has no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The bytes of row `index`, if it exists.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[u8]> {
        self.rows.get(index).map(Vec::as_slice)
    }
}

fn trim_cr(line: &[u8]) -> Vec<u8> {
    line.strip_suffix(b"\r").unwrap_or(line).to_vec()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
