//! Editor — cursor state, key dispatch, and frame drawing.
//!
//! The editor never talks to the terminal directly. It reacts to
//! [`KeyEvent`]s and draws each frame into a [`ScreenBuffer`]; the caller
//! owns the session and flushes the frame.
//!
//! # Frame protocol
//!
//! Every frame is drawn the same way: hide the cursor, move home, draw each
//! screen row followed by clear-to-end-of-line (so a shorter row erases what
//! the previous frame left there), put the cursor back, show it. Rows are
//! separated by `\r\n`, but the last row gets none, otherwise the terminal
//! would scroll.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use kigo_term::output::ScreenBuffer;
use kigo_term::{KeyEvent, WindowGeometry};
use tracing::debug;

use crate::document::Document;

/// Version shown in the welcome banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ctrl-Q.
pub const QUIT: KeyEvent = KeyEvent::ctrl(b'q');

/// What the main loop should do after a keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep going.
    Continue,
    /// Leave the editor.
    Quit,
}

/// Cursor position on screen, 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Column.
    pub x: u16,
    /// Row.
    pub y: u16,
}

/// Editor state: the document, the cursor, and the screen it's drawn on.
#[derive(Debug)]
pub struct Editor {
    doc: Document,
    cursor: Cursor,
    size: WindowGeometry,
    file_name: Option<PathBuf>,
}

impl Editor {
    /// An editor on an empty document.
    #[must_use]
    pub fn new(size: WindowGeometry) -> Self {
        Self::with_document(Document::new(), size)
    }

    /// An editor on an existing document.
    #[must_use]
    pub const fn with_document(doc: Document, size: WindowGeometry) -> Self {
        Self {
            doc,
            cursor: Cursor { x: 0, y: 0 },
            size,
            file_name: None,
        }
    }

    /// An editor on the contents of `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file can't be read.
    pub fn open(path: impl AsRef<Path>, size: WindowGeometry) -> io::Result<Self> {
        let path = path.as_ref();
        let doc = Document::open(path)?;
        debug!(path = %path.display(), rows = doc.len(), "opened file");

        let mut editor = Self::with_document(doc, size);
        editor.file_name = Some(path.to_path_buf());
        Ok(editor)
    }

    /// The document being shown.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.doc
    }

    /// Where the cursor is.
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// The file the document came from, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&Path> {
        self.file_name.as_deref()
    }

    // ── Input ───────────────────────────────────────────────────────

    /// React to one key.
    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        match key {
            QUIT => return Action::Quit,
            KeyEvent::Up | KeyEvent::Down | KeyEvent::Left | KeyEvent::Right => {
                self.move_cursor(key);
            }
            KeyEvent::PageUp | KeyEvent::PageDown => {
                let dir = if key == KeyEvent::PageUp {
                    KeyEvent::Up
                } else {
                    KeyEvent::Down
                };
                for _ in 0..self.size.rows {
                    self.move_cursor(dir);
                }
            }
            KeyEvent::Home => self.cursor.x = 0,
            KeyEvent::End => self.cursor.x = self.size.columns.saturating_sub(1),
            _ => {}
        }
        Action::Continue
    }

    /// Move one cell, staying on screen.
    fn move_cursor(&mut self, key: KeyEvent) {
        let c = &mut self.cursor;
        match key {
            KeyEvent::Left => c.x = c.x.saturating_sub(1),
            KeyEvent::Right if c.x + 1 < self.size.columns => c.x += 1,
            KeyEvent::Up => c.y = c.y.saturating_sub(1),
            KeyEvent::Down if c.y + 1 < self.size.rows => c.y += 1,
            _ => {}
        }
    }

    // ── Drawing ─────────────────────────────────────────────────────

    /// Draw a complete frame. The caller flushes it.
    pub fn render<W: Write>(&self, screen: &mut ScreenBuffer<W>) {
        screen.hide_cursor();
        screen.move_cursor_home();
        self.draw_rows(screen);
        screen.move_cursor(self.cursor.y, self.cursor.x);
        screen.show_cursor();
    }

    fn draw_rows<W: Write>(&self, screen: &mut ScreenBuffer<W>) {
        let rows = usize::from(self.size.rows);
        let width = usize::from(self.size.columns);

        for y in 0..rows {
            match self.doc.row(y) {
                Some(row) => screen.write_bytes(&row[..row.len().min(width)]),
                None if self.doc.is_empty() && y == rows / 3 => self.draw_welcome(screen),
                None => screen.write_str("~"),
            }

            screen.clear_line_right();
            if y + 1 < rows {
                screen.write_str("\r\n");
            }
        }
    }

    fn draw_welcome<W: Write>(&self, screen: &mut ScreenBuffer<W>) {
        let width = usize::from(self.size.columns);
        let mut welcome = format!("Kigo editor -- version {VERSION}");
        welcome.truncate(width);

        let padding = (width - welcome.len()) / 2;
        if padding > 0 {
            screen.write_str("~");
            screen.write_str(&" ".repeat(padding - 1));
        }
        screen.write_str(&welcome);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
