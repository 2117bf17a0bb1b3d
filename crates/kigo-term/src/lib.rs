// SPDX-License-Identifier: MIT
//
// kigo-term — terminal interaction layer for the kigo editor.
//
// Owns everything between the editor and the controlling terminal:
// switching the line discipline into raw mode and back, finding out how
// big the window is (asking the terminal itself when the OS won't say),
// turning the stdin byte stream into key events on a background thread,
// and sending each frame to the terminal as a single write.
//
// Layout:
//
//   terminal → termios snapshot, raw mode, the `TtyDevice` seam
//   size     → window size from the OS or a cursor-position probe
//   input    → `KeyEvent`, the escape-sequence trie, `KeyDecoder`
//   reader   → stdin adapter and the background `KeyQueue`
//   ansi     → escape-sequence encoders
//   output   → `ScreenBuffer`, one write per frame
//   session  → `Session` tying it all together
//
// POSIX only: raw mode is termios, and window size is TIOCGWINSZ.

#[cfg(not(unix))]
compile_error!("kigo-term drives a POSIX terminal and only builds on unix targets");

pub mod ansi;
pub mod error;
pub mod input;
pub mod output;
pub mod reader;
pub mod session;
pub mod size;
pub mod terminal;

pub use error::{Result, TermError, TrieError};
pub use input::KeyEvent;
pub use session::{Session, SessionConfig, SessionState, TerminalSession};
pub use size::WindowGeometry;
