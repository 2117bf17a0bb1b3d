// SPDX-License-Identifier: MIT
//
// kigo — a minimal terminal screen editor.
//
// This binary wires the two crates together:
//
//   kigo-term   → raw mode, window size, key decoding, frame output
//   kigo-editor → document rows, cursor, frame drawing
//
// Each keypress flows through:
//
//   stdin → key scanner thread → read_key → Editor::handle_key
//   Editor::render → ScreenBuffer → one write per frame → terminal
//
// The session is always closed on the way out, whether the editor quit,
// input ended, or something failed, so the shell gets its terminal back.

use std::env;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use kigo_editor::{Action, Editor};
use kigo_term::{SessionConfig, TermError, TerminalSession};

const USAGE: &str = "\
usage: kigo [--log <file>] [FILE]

options:
  --log <file>   append a diagnostic log to <file> (or set KIGO_LOG_FILE)
  -V, --version  print the version and exit
  -h, --help     print this help and exit

KIGO_LOG sets the log filter, e.g. KIGO_LOG=debug or KIGO_LOG=kigo_term=trace.
Keys: arrows, Home/End, PageUp/PageDown move the cursor; Ctrl-Q quits.";

// ─── Command line ───────────────────────────────────────────────────────────

/// What the command line asked for.
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    file: Option<PathBuf>,
    log_file: Option<PathBuf>,
    version: bool,
    help: bool,
}

/// Parse arguments (without the program name).
fn parse_args(args: impl IntoIterator<Item = OsString>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("-h" | "--help") => parsed.help = true,
            Some("-V" | "--version") => parsed.version = true,
            Some("--log") => {
                let path = args.next().context("--log needs a file name")?;
                parsed.log_file = Some(path.into());
            }
            Some(flag) if flag.starts_with('-') && flag != "-" => {
                anyhow::bail!("unknown option `{flag}`\n\n{USAGE}");
            }
            _ if parsed.file.is_some() => anyhow::bail!("only one file can be opened\n\n{USAGE}"),
            _ => parsed.file = Some(arg.into()),
        }
    }

    Ok(parsed)
}

// ─── Logging ────────────────────────────────────────────────────────────────

/// Send tracing output to `path`. Without a log file nothing is installed:
/// the terminal belongs to the editor and can't take log lines.
fn init_logging(path: Option<PathBuf>) -> Result<()> {
    let Some(path) = path.or_else(|| env::var_os("KIGO_LOG_FILE").map(PathBuf::from)) else {
        return Ok(());
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("can't open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_env("KIGO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("can't install logger")?;
    Ok(())
}

// ─── Editing ────────────────────────────────────────────────────────────────

/// Bring the terminal up and run the editor until it quits or input ends.
fn edit(term: &mut TerminalSession, file: Option<&Path>) -> Result<()> {
    term.enable_raw_mode().context("can't enter raw mode")?;
    term.init().context("can't initialize terminal")?;

    let size = term
        .geometry()
        .context("terminal size unknown after initialization")?;
    let mut editor = match file {
        Some(path) => Editor::open(path, size)
            .with_context(|| format!("can't open {}", path.display()))?,
        None => Editor::new(size),
    };

    loop {
        editor.render(term.screen());
        term.flush()?;

        let key = match term.read_key() {
            Ok(key) => key,
            Err(TermError::InputClosed) => {
                debug!("input closed, leaving editor");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if editor.handle_key(key) == Action::Quit {
            break;
        }
    }

    let screen = term.screen();
    screen.clear_screen();
    screen.move_cursor_home();
    term.flush()?;
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let mut term = TerminalSession::open(SessionConfig::default())?;
    let result = edit(&mut term, args.file.as_deref());
    // Close even after a failure; the edit error wins if both fail.
    let closed = term.close().context("can't restore terminal");
    result.and(closed)
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn main() {
    let args = match parse_args(env::args_os().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("kigo: {e:#}");
            process::exit(1);
        }
    };

    if args.help {
        println!("{USAGE}");
        return;
    }
    if args.version {
        println!("kigo {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if let Err(e) = init_logging(args.log_file.clone()) {
        eprintln!("kigo: {e:#}");
        process::exit(1);
    }
    info!(version = env!("CARGO_PKG_VERSION"), file = ?args.file, "kigo starting");

    if let Err(e) = run(&args) {
        eprintln!("kigo: {e:#}");
        process::exit(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        parse_args(args.iter().map(OsString::from))
    }

    #[test]
    fn no_args_opens_empty_document() {
        assert_eq!(parse(&[]).unwrap(), Args::default());
    }

    #[test]
    fn file_argument() {
        let args = parse(&["notes.txt"]).unwrap();
        assert_eq!(args.file, Some(PathBuf::from("notes.txt")));
    }

    #[test]
    fn log_flag_takes_a_path() {
        let args = parse(&["--log", "/tmp/kigo.log", "a.txt"]).unwrap();
        assert_eq!(args.log_file, Some(PathBuf::from("/tmp/kigo.log")));
        assert_eq!(args.file, Some(PathBuf::from("a.txt")));
    }

    #[test]
    fn log_flag_without_path_fails() {
        let err = parse(&["--log"]).unwrap_err();
        assert!(err.to_string().contains("--log"));
    }

    #[test]
    fn version_and_help() {
        assert!(parse(&["-V"]).unwrap().version);
        assert!(parse(&["--version"]).unwrap().version);
        assert!(parse(&["-h"]).unwrap().help);
        assert!(parse(&["--help"]).unwrap().help);
    }

    #[test]
    fn unknown_option_fails() {
        let err = parse(&["--frobnicate"]).unwrap_err();
        assert!(err.to_string().contains("--frobnicate"));
    }

    #[test]
    fn second_file_fails() {
        assert!(parse(&["a.txt", "b.txt"]).is_err());
    }

    #[test]
    fn dash_is_a_file_name() {
        assert_eq!(parse(&["-"]).unwrap().file, Some(PathBuf::from("-")));
    }
}
