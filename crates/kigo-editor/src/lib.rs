//! # kigo-editor — Editor core for kigo
//!
//! - **[`document`]** — `Document`, the text as a list of byte rows
//! - **[`editor`]** — `Editor` with cursor movement, key dispatch, and
//!   frame drawing into a `kigo_term` screen buffer
//!
//! Nothing here touches the terminal. The binary owns the session, feeds
//! keys to [`Editor::handle_key`], and flushes what [`Editor::render`] drew.

pub mod document;
pub mod editor;

pub use document::Document;
pub use editor::{Action, Cursor, Editor};
