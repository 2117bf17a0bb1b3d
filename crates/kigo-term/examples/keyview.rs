// SPDX-License-Identifier: MIT
//
// keyview — print every decoded key, one per line.
//
// Handy for checking what a terminal actually sends: plain bytes show as
// their value (and character, if printable), recognized escape sequences
// show as the named key. Press `q` to quit.
//
// Usage:
//   cargo run -p kigo-term --example keyview

use std::io::Write;
use std::process;

use kigo_term::{KeyEvent, SessionConfig, TermError, TerminalSession};

fn run(term: &mut TerminalSession) -> Result<(), TermError> {
    term.enable_raw_mode()?;
    term.init()?;

    if let Some(g) = term.geometry() {
        let _ = write!(term.screen(), "window {}x{}, press q to quit\r\n", g.columns, g.rows);
        term.flush()?;
    }

    loop {
        let key = match term.read_key() {
            Err(TermError::InputClosed) => return Ok(()),
            other => other?,
        };
        if key == KeyEvent::Byte(b'q') {
            return Ok(());
        }
        // Output post-processing is off in raw mode, so newlines need the \r.
        let _ = write!(term.screen(), "{key}\r\n");
        term.flush()?;
    }
}

fn main() {
    let mut term = TerminalSession::open(SessionConfig::default()).unwrap_or_else(|e| {
        eprintln!("keyview: {e}");
        process::exit(1);
    });

    let result = run(&mut term);
    let closed = term.close();

    if let Err(e) = result.and(closed) {
        eprintln!("keyview: {e}");
        process::exit(1);
    }
}
