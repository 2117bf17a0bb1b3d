// SPDX-License-Identifier: MIT
//
// Terminal control — line-discipline snapshot, raw mode, and restore.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr) and ioctl (TIOCGWINSZ). These are the standard POSIX
// interfaces for terminal control — there is no safe alternative. Each
// unsafe block is minimal.
#![allow(unsafe_code)]
//
// The device itself sits behind the `TtyDevice` trait. The real
// implementation talks to stdin/stdout; tests substitute an in-memory
// device so the enable/disable contract can be checked bit for bit
// without a terminal attached.
//
// `RawMode` owns the baseline snapshot for one session. The baseline is an
// explicit three-state value rather than a nullable struct, so "never
// captured" can't be confused with "captured a zeroed termios".

use std::fmt;
use std::io;
use std::os::fd::AsRawFd;

use tracing::debug;

use crate::size::WindowGeometry;

// ─── TerminalSettings ───────────────────────────────────────────────────────

/// Opaque snapshot of the terminal's line-discipline configuration.
///
/// Wraps the platform `termios`: input, output, control and local mode
/// flags plus the control-character table.
#[derive(Clone, Copy)]
pub struct TerminalSettings {
    raw: libc::termios,
}

impl TerminalSettings {
    /// Wrap a platform `termios` value.
    #[must_use]
    pub const fn from_raw(raw: libc::termios) -> Self {
        Self { raw }
    }

    /// The wrapped platform value.
    #[must_use]
    pub const fn as_raw(&self) -> &libc::termios {
        &self.raw
    }

    /// Derive the raw-mode configuration from this snapshot.
    ///
    /// Disables canonical input, echo, signal characters, extended input
    /// processing, software flow control, CR→NL translation, break
    /// signalling, parity checking, 8th-bit stripping and output
    /// post-processing; forces 8-bit characters. Reads return as soon as
    /// any input is available, or with nothing after `read_timeout_ds`
    /// tenths of a second.
    #[must_use]
    pub fn to_raw_mode(&self, read_timeout_ds: u8) -> Self {
        let mut t = self.raw;

        t.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
        t.c_oflag &= !libc::OPOST;
        t.c_cflag &= !libc::CSIZE;
        t.c_cflag |= libc::CS8;
        t.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);

        t.c_cc[libc::VMIN] = 0;
        t.c_cc[libc::VTIME] = read_timeout_ds;

        Self { raw: t }
    }

    /// Whether canonical (line-buffered) input is on.
    #[must_use]
    pub const fn is_canonical(&self) -> bool {
        self.raw.c_lflag & libc::ICANON != 0
    }

    /// Whether input is echoed locally.
    #[must_use]
    pub const fn echoes(&self) -> bool {
        self.raw.c_lflag & libc::ECHO != 0
    }
}

impl PartialEq for TerminalSettings {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.raw, &other.raw);
        a.c_iflag == b.c_iflag
            && a.c_oflag == b.c_oflag
            && a.c_cflag == b.c_cflag
            && a.c_lflag == b.c_lflag
            && a.c_cc == b.c_cc
    }
}

impl Eq for TerminalSettings {}

impl fmt::Debug for TerminalSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalSettings")
            .field("iflag", &format_args!("{:#x}", self.raw.c_iflag))
            .field("oflag", &format_args!("{:#x}", self.raw.c_oflag))
            .field("cflag", &format_args!("{:#x}", self.raw.c_cflag))
            .field("lflag", &format_args!("{:#x}", self.raw.c_lflag))
            .field("cc", &self.raw.c_cc)
            .finish()
    }
}

// ─── Device ─────────────────────────────────────────────────────────────────

/// The OS-facing half of the controlling terminal.
pub trait TtyDevice {
    /// Read the current line-discipline settings.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the query fails (e.g. not a terminal).
    fn settings(&self) -> io::Result<TerminalSettings>;

    /// Apply settings, discarding pending input first (flush-then-set).
    ///
    /// # Errors
    ///
    /// Returns the OS error if the settings are rejected.
    fn apply(&self, settings: &TerminalSettings) -> io::Result<()>;

    /// Ask the OS for the window dimensions. May report zero columns.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the query fails.
    fn window_size(&self) -> io::Result<WindowGeometry>;
}

impl<T: TtyDevice + ?Sized> TtyDevice for &T {
    fn settings(&self) -> io::Result<TerminalSettings> {
        (**self).settings()
    }

    fn apply(&self, settings: &TerminalSettings) -> io::Result<()> {
        (**self).apply(settings)
    }

    fn window_size(&self) -> io::Result<WindowGeometry> {
        (**self).window_size()
    }
}

/// The process's controlling terminal: settings on stdin, size on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdTty;

impl TtyDevice for StdTty {
    fn settings(&self) -> io::Result<TerminalSettings> {
        let fd = io::stdin().as_raw_fd();
        let mut t: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &raw mut t) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(TerminalSettings::from_raw(t))
    }

    fn apply(&self, settings: &TerminalSettings) -> io::Result<()> {
        let fd = io::stdin().as_raw_fd();
        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, settings.as_raw()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn window_size(&self) -> io::Result<WindowGeometry> {
        let fd = io::stdout().as_raw_fd();
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(WindowGeometry {
            rows: ws.ws_row,
            columns: ws.ws_col,
        })
    }
}

/// Check whether stdin is connected to a terminal.
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

// ─── RawMode ────────────────────────────────────────────────────────────────

/// What the controller knows about the pre-raw settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Baseline {
    /// `enable` never succeeded in taking a snapshot.
    NeverCaptured,
    /// Snapshot held; the terminal is currently raw.
    Captured(TerminalSettings),
    /// Snapshot was reapplied; nothing left to undo.
    Restored,
}

/// Saves the terminal's settings, switches to raw mode, and puts them back.
///
/// `disable` is safe to call in any state: without a captured baseline it
/// does nothing, and after a successful restore it does nothing again.
#[derive(Debug)]
pub struct RawMode {
    baseline: Baseline,
    read_timeout_ds: u8,
}

impl RawMode {
    /// Create a controller that has not touched the terminal yet.
    ///
    /// `read_timeout_ds` becomes the raw-mode read timeout (VTIME).
    #[must_use]
    pub const fn new(read_timeout_ds: u8) -> Self {
        Self {
            baseline: Baseline::NeverCaptured,
            read_timeout_ds,
        }
    }

    /// Whether raw mode is currently applied by this controller.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self.baseline, Baseline::Captured(_))
    }

    /// Snapshot the current settings and switch the terminal to raw mode.
    ///
    /// Calling `enable` while already enabled is a no-op, so the original
    /// baseline is never overwritten by raw settings.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the settings can't be read or applied. If
    /// applying fails, no baseline is kept.
    pub fn enable(&mut self, device: &impl TtyDevice) -> io::Result<()> {
        if self.is_enabled() {
            return Ok(());
        }

        let original = device.settings()?;
        device.apply(&original.to_raw_mode(self.read_timeout_ds))?;
        self.baseline = Baseline::Captured(original);

        debug!(read_timeout_ds = self.read_timeout_ds, "raw mode enabled");
        Ok(())
    }

    /// Reapply the captured baseline, if there is one.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the baseline can't be applied; the baseline
    /// is kept so a later call can try again.
    pub fn disable(&mut self, device: &impl TtyDevice) -> io::Result<()> {
        let Baseline::Captured(original) = self.baseline else {
            return Ok(());
        };

        device.apply(&original)?;
        self.baseline = Baseline::Restored;

        debug!("raw mode disabled");
        Ok(())
    }
}

// ─── Test device ────────────────────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
