// SPDX-License-Identifier: MIT
//
// Background key scanner — decodes stdin on its own thread.
//
// A dedicated thread runs the `KeyDecoder` over the input and sends each
// resolved key through a standard channel. The main loop blocks on
// `KeyQueue::recv` and never sees raw bytes or polls.
//
// Delivery: one channel carries `io::Result<KeyEvent>`. Keys arrive in the
// order their bytes were read; a read error is always the last item sent,
// after which the channel closes. End of input just closes the channel.
//
// Shutdown: in raw mode every read returns after the VTIME timeout even
// when no key is pressed. `TtyInput` reports that as a `TimedOut` error,
// the decoder turns it into `Step::Idle`, and the scan loop checks an
// `AtomicBool` stop flag before decoding further. Stopping therefore takes
// at most one read timeout.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::os::fd::AsFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{Result, TermError};
use crate::input::{KeyDecoder, KeyEvent, Step};
use crate::terminal;

// ─── TtyInput ───────────────────────────────────────────────────────────────

/// Unbuffered stdin that tells read timeouts apart from end of input.
///
/// A raw-mode terminal returns zero bytes when VTIME expires. On a TTY that
/// becomes an `ErrorKind::TimedOut` error; on anything else zero bytes
/// still means end of input.
pub struct TtyInput {
    file: File,
    timeouts: bool,
}

impl TtyInput {
    /// Duplicate the stdin descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor can't be duplicated.
    pub fn stdin() -> io::Result<Self> {
        let fd = io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self {
            file: File::from(fd),
            timeouts: terminal::is_tty(),
        })
    }
}

impl Read for TtyInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read(buf)?;
        if n == 0 && self.timeouts && !buf.is_empty() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        Ok(n)
    }
}

// ─── KeyQueue ───────────────────────────────────────────────────────────────

/// Receiving end of the background key scanner.
///
/// The scanner thread runs until input ends, a read fails, the queue is
/// stopped, or the queue is dropped.
pub struct KeyQueue {
    rx: Receiver<io::Result<KeyEvent>>,
    /// The scanner thread. `None` after `stop()` joins it.
    handle: Option<JoinHandle<()>>,
    /// Shared flag asking the scanner to exit.
    stop: Arc<AtomicBool>,
}

impl KeyQueue {
    /// Spawn the scanner thread over `input`.
    ///
    /// `input` is wrapped in a `BufReader`, so it can be an unbuffered
    /// descriptor. For [`stop`](Self::stop) to return promptly, reads must
    /// either time out (see [`TtyInput`]) or reach end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn<R: Read + Send + 'static>(input: R) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("key-scanner".into())
            .spawn(move || {
                let decoder = KeyDecoder::new(BufReader::new(input));
                Self::scan(decoder, &tx, &stop_flag);
            })?;

        debug!("key scanner started");
        Ok(Self {
            rx,
            handle: Some(handle),
            stop,
        })
    }

    /// Block until the next key.
    ///
    /// # Errors
    ///
    /// [`TermError::Read`] if the scanner hit a read error, and
    /// [`TermError::InputClosed`] once input has ended (or the scanner was
    /// stopped) and every key before that has been received.
    pub fn recv(&self) -> Result<KeyEvent> {
        match self.rx.recv() {
            Ok(Ok(key)) => Ok(key),
            Ok(Err(e)) => Err(TermError::Read(e)),
            Err(mpsc::RecvError) => Err(TermError::InputClosed),
        }
    }

    /// Signal the scanner to stop and wait for it to exit.
    ///
    /// Idempotent: stopping an already-finished scanner is a no-op.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("key scanner stopped");
        }
    }

    /// The scanner loop: decode, send, repeat.
    fn scan<R: Read>(
        mut decoder: KeyDecoder<'static, R>,
        tx: &Sender<io::Result<KeyEvent>>,
        stop: &AtomicBool,
    ) {
        while !stop.load(Ordering::Relaxed) {
            match decoder.step() {
                Ok(Step::Key(key)) => {
                    if tx.send(Ok(key)).is_err() {
                        // Receiver dropped — nobody's listening.
                        break;
                    }
                }
                Ok(Step::Idle) => {}
                Ok(Step::End) => {
                    debug!("input ended");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "input read failed");
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    }
}

impl Drop for KeyQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
