// SPDX-License-Identifier: MIT
//
// Terminal session — raw mode, geometry, key queue and frame output in one
// handle.
//
// Lifecycle:
//
//   Uninitialized ──enable_raw_mode──▶ RawModeEnabled ──init──▶ Initialized
//         │                                  │                      │
//         └────────────── close (explicit, fatal error, or drop) ───┴──▶ Closed
//
// `init` probes the window size first (the probe needs stdin to itself)
// and only then hands stdin to the background key scanner. `close` stops
// the scanner *before* restoring the terminal: once cooked mode is back,
// reads block without a timeout and the scanner could no longer notice the
// stop flag.
//
// A read or write failure closes the session before the error is returned,
// so the terminal is restored no matter which path ends the program.
// Dropping an open session closes it too, which covers early returns and
// unwinding panics.

use std::fs::File;
use std::io::{self, Read, Write};

use tracing::{info, warn};

use crate::error::{Result, TermError};
use crate::input::KeyEvent;
use crate::output::{self, ScreenBuffer};
use crate::reader::{KeyQueue, TtyInput};
use crate::size::{DEFAULT_PROBE_ATTEMPTS, WindowGeometry, WindowSizeProber};
use crate::terminal::{RawMode, StdTty, TtyDevice};

// ─── Config ──────────────────────────────────────────────────────────────────

/// Tunables for a terminal session.
///
/// The defaults suit an interactive editor: a 100ms read timeout keeps a
/// lone Escape responsive and bounds shutdown latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Raw-mode read timeout in tenths of a second (VTIME).
    pub read_timeout_ds: u8,
    /// Maximum reply bytes read during the cursor-position probe.
    pub probe_attempts: usize,
    /// Always use the cursor-position probe, even if the OS knows the size.
    pub probe_always: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout_ds: 1,
            probe_attempts: DEFAULT_PROBE_ATTEMPTS,
            probe_always: false,
        }
    }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has touched the terminal yet.
    Uninitialized,
    /// Raw mode is on; geometry and key scanner aren't set up.
    RawModeEnabled,
    /// Geometry is known and the key scanner is running.
    Initialized,
    /// Raw mode has been restored. Terminal state for this session.
    Closed,
}

impl SessionState {
    const fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::RawModeEnabled => "in raw mode",
            Self::Initialized => "initialized",
            Self::Closed => "closed",
        }
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// A session on the process's controlling terminal.
pub type TerminalSession = Session<StdTty, TtyInput, File>;

/// Composes raw mode, window size, key decoding and frame output.
///
/// # Example
///
/// ```no_run
/// use kigo_term::input::KeyEvent;
/// use kigo_term::session::{SessionConfig, TerminalSession};
///
/// let mut term = TerminalSession::open(SessionConfig::default())?;
/// term.enable_raw_mode()?;
/// term.init()?;
/// loop {
///     let screen = term.screen();
///     screen.hide_cursor();
///     screen.move_cursor_home();
///     screen.write_str("press Ctrl-Q");
///     screen.clear_line_right();
///     screen.show_cursor();
///     term.flush()?;
///     if term.read_key()? == KeyEvent::ctrl(b'q') {
///         break;
///     }
/// }
/// term.close()?;
/// # Ok::<(), kigo_term::TermError>(())
/// ```
pub struct Session<D: TtyDevice, R, W: Write> {
    device: D,
    raw: RawMode,
    /// Stdin until `init` hands it to the key scanner.
    input: Option<R>,
    screen: ScreenBuffer<W>,
    keys: Option<KeyQueue>,
    geometry: Option<WindowGeometry>,
    state: SessionState,
    config: SessionConfig,
}

impl TerminalSession {
    /// A session on stdin/stdout. Does not touch terminal settings yet.
    ///
    /// # Errors
    ///
    /// [`TermError::Settings`] if the standard descriptors can't be
    /// duplicated.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let input = TtyInput::stdin().map_err(TermError::Settings)?;
        let output = output::stdout_file().map_err(TermError::Settings)?;
        Ok(Self::new(StdTty, input, output, config))
    }
}

impl<D, R, W> Session<D, R, W>
where
    D: TtyDevice,
    R: Read + Send + 'static,
    W: Write,
{
    /// A session over an explicit device, input and output.
    pub fn new(device: D, input: R, output: W, config: SessionConfig) -> Self {
        Self {
            device,
            raw: RawMode::new(config.read_timeout_ds),
            input: Some(input),
            screen: ScreenBuffer::new(output),
            keys: None,
            geometry: None,
            state: SessionState::Uninitialized,
            config,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Window size, once [`init`](Self::init) has run.
    #[must_use]
    pub const fn geometry(&self) -> Option<WindowGeometry> {
        self.geometry
    }

    /// Put the terminal into raw mode.
    ///
    /// No-op if raw mode is already on.
    ///
    /// # Errors
    ///
    /// [`TermError::Settings`] if the terminal can't be configured (the
    /// session stays uninitialized), or [`TermError::InvalidState`] on a
    /// closed session.
    pub fn enable_raw_mode(&mut self) -> Result<()> {
        match self.state {
            SessionState::Uninitialized => {}
            SessionState::RawModeEnabled | SessionState::Initialized => return Ok(()),
            SessionState::Closed => return Err(self.invalid("enable_raw_mode")),
        }

        self.raw.enable(&self.device).map_err(TermError::Settings)?;
        self.state = SessionState::RawModeEnabled;
        Ok(())
    }

    /// Discover the window size and start the key scanner.
    ///
    /// # Errors
    ///
    /// Geometry errors from the probe, [`TermError::Spawn`] if the scanner
    /// thread can't be started (the session is closed first), or
    /// [`TermError::InvalidState`] unless raw mode is on and `init` hasn't
    /// run.
    pub fn init(&mut self) -> Result<()> {
        if self.state != SessionState::RawModeEnabled {
            return Err(self.invalid("init"));
        }
        let Some(mut input) = self.input.take() else {
            return Err(self.invalid("init"));
        };

        let prober = WindowSizeProber::new(self.config.probe_attempts)
            .always_probe(self.config.probe_always);
        let geometry = match prober.probe(&self.device, &mut input, self.screen.get_mut()) {
            Ok(g) => g,
            Err(e) => {
                self.input = Some(input);
                return Err(e);
            }
        };

        self.start(geometry, KeyQueue::spawn(input))
    }

    /// Finish `init` once the scanner thread has been spawned (or not).
    ///
    /// A failed spawn has already consumed stdin, so the session can't be
    /// initialized again and is closed.
    fn start(&mut self, geometry: WindowGeometry, keys: io::Result<KeyQueue>) -> Result<()> {
        let keys = keys.map_err(|e| self.fail(TermError::Spawn(e)))?;
        self.keys = Some(keys);
        self.geometry = Some(geometry);
        self.state = SessionState::Initialized;

        info!(rows = geometry.rows, columns = geometry.columns, "terminal session ready");
        Ok(())
    }

    /// Block until the next decoded key.
    ///
    /// # Errors
    ///
    /// [`TermError::Read`] on an input failure and [`TermError::InputClosed`]
    /// at end of input; both close the session first.
    /// [`TermError::InvalidState`] before `init` or after close.
    pub fn read_key(&mut self) -> Result<KeyEvent> {
        let result = match (&self.keys, self.state) {
            (Some(keys), SessionState::Initialized) => keys.recv(),
            _ => return Err(self.invalid("read_key")),
        };
        result.map_err(|e| self.fail(e))
    }

    /// The frame being drawn. Nothing reaches the terminal until
    /// [`flush`](Self::flush).
    pub fn screen(&mut self) -> &mut ScreenBuffer<W> {
        &mut self.screen
    }

    /// Write the pending frame in one operation.
    ///
    /// # Errors
    ///
    /// [`TermError::Write`] if the write fails; the session is closed first.
    pub fn flush(&mut self) -> Result<()> {
        self.screen.flush().map_err(|e| self.fail(e))
    }

    /// Stop the key scanner and restore the terminal.
    ///
    /// Safe to call in any state and more than once.
    ///
    /// # Errors
    ///
    /// [`TermError::Settings`] if the original settings can't be reapplied.
    /// The session stays open so a later `close` (or drop) can retry.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        if let Some(mut keys) = self.keys.take() {
            keys.stop();
        }
        self.raw.disable(&self.device).map_err(TermError::Settings)?;
        self.state = SessionState::Closed;

        info!("terminal session closed");
        Ok(())
    }

    /// Close after a fatal error, keeping the original error.
    fn fail(&mut self, err: TermError) -> TermError {
        if let Err(close_err) = self.close() {
            warn!(error = %close_err, "failed to restore terminal");
        }
        err
    }

    fn invalid(&self, op: &'static str) -> TermError {
        TermError::InvalidState {
            op,
            state: self.state.name(),
        }
    }
}

impl<D: TtyDevice, R, W: Write> Drop for Session<D, R, W> {
    fn drop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(mut keys) = self.keys.take() {
            keys.stop();
        }
        if let Err(e) = self.raw.disable(&self.device) {
            warn!(error = %e, "failed to restore terminal on drop");
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
