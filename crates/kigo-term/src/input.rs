// SPDX-License-Identifier: MIT
//
// Terminal input decoding.
//
// Turns the raw stdin byte stream into `KeyEvent`s: every byte that isn't
// ESC is a key on its own; ESC starts a walk down an `EscapeTrie` of known
// sequences (arrows, Home/End, paging, Delete).
//
// # Degradation
//
// A walk that falls off the trie — unknown next byte, idle timeout, or
// end of input — is not an error. The ESC and every byte consumed after it
// are emitted as raw `Byte` keys, in order, before anything that follows.
// A lone Escape keypress therefore arrives as `Byte(0x1B)` as soon as the
// read timeout expires.
//
// # Idle vs end
//
// The decoder reads through `std::io::Read`. `Ok(0)` is end of input; an
// error of kind `TimedOut`/`WouldBlock` means "nothing yet" (the raw-mode
// read timeout) and is reported as `Step::Idle` so a background scanner
// can check for shutdown between keys.
//
// The trie is immutable after construction. The built-in table lives in a
// `LazyLock` and is shared by reference; no sequence in it is a prefix of
// another, and `EscapeTrie::build` rejects tables where that isn't true.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::io::{self, Read};
use std::sync::LazyLock;

use tracing::debug;

use crate::error::{TrieError, escape_bytes};
use crate::size::is_idle;

/// The escape byte.
pub const ESC: u8 = 0x1B;

// ─── KeyEvent ───────────────────────────────────────────────────────────────

/// A decoded keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    /// A single input byte: printable ASCII, a control character, or a
    /// byte from an unrecognized escape sequence.
    Byte(u8),
    // ── Named keys ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    Delete,
}

impl KeyEvent {
    /// The control byte produced by Ctrl + `letter` (e.g. `ctrl(b'q')` is 0x11).
    #[must_use]
    pub const fn ctrl(letter: u8) -> Self {
        Self::Byte(letter & 0x1F)
    }

    /// The raw byte, if this isn't a named key.
    #[must_use]
    pub const fn byte(self) -> Option<u8> {
        match self {
            Self::Byte(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Byte(b) if b.is_ascii_graphic() || b == b' ' => {
                write!(f, "{b} ('{}')", char::from(b))
            }
            Self::Byte(b) => write!(f, "{b}"),
            named => write!(f, "{named:?}"),
        }
    }
}

// ─── EscapeTrie ─────────────────────────────────────────────────────────────

/// Input sequences for the named keys, as sent by xterm, the Linux console,
/// rxvt and friends.
pub const ESCAPE_TABLE: &[(&[u8], KeyEvent)] = &[
    (b"\x1b[A", KeyEvent::Up),
    (b"\x1b[B", KeyEvent::Down),
    (b"\x1b[C", KeyEvent::Right),
    (b"\x1b[D", KeyEvent::Left),
    (b"\x1b[5~", KeyEvent::PageUp),
    (b"\x1b[6~", KeyEvent::PageDown),
    (b"\x1b[1~", KeyEvent::Home),
    (b"\x1b[7~", KeyEvent::Home),
    (b"\x1b[H", KeyEvent::Home),
    (b"\x1bOH", KeyEvent::Home),
    (b"\x1b[4~", KeyEvent::End),
    (b"\x1b[8~", KeyEvent::End),
    (b"\x1b[F", KeyEvent::End),
    (b"\x1bOF", KeyEvent::End),
    (b"\x1b[3~", KeyEvent::Delete),
];

static STANDARD: LazyLock<EscapeTrie> = LazyLock::new(|| {
    EscapeTrie::build(ESCAPE_TABLE.iter().copied())
        .unwrap_or_else(|e| panic!("built-in escape table is invalid: {e}"))
});

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<u8, Node>,
    key: Option<KeyEvent>,
}

impl Node {
    fn child(&self, byte: u8) -> Option<&Self> {
        self.children.get(&byte)
    }

    /// Bytes of the first complete sequence at or below this node.
    fn first_sequence(&self, prefix: &mut Vec<u8>) {
        if self.key.is_some() {
            return;
        }
        if let Some((&b, next)) = self.children.iter().next() {
            prefix.push(b);
            next.first_sequence(prefix);
        }
    }
}

/// Prefix tree from escape sequences to the keys they encode.
///
/// Only leaves carry keys: a complete sequence is never also the prefix of
/// another one.
#[derive(Debug, Default)]
pub struct EscapeTrie {
    root: Node,
    len: usize,
}

impl EscapeTrie {
    /// The trie for [`ESCAPE_TABLE`], built on first use.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Build a trie from `(sequence, key)` pairs.
    ///
    /// # Errors
    ///
    /// Rejects empty sequences, duplicates, and any sequence that is a
    /// strict prefix of another.
    pub fn build<'a>(
        table: impl IntoIterator<Item = (&'a [u8], KeyEvent)>,
    ) -> Result<Self, TrieError> {
        let mut trie = Self::default();
        for (seq, key) in table {
            trie.insert(seq, key)?;
        }
        Ok(trie)
    }

    fn insert(&mut self, seq: &[u8], key: KeyEvent) -> Result<(), TrieError> {
        if seq.is_empty() {
            return Err(TrieError::Empty);
        }

        let mut node = &mut self.root;
        for (depth, &b) in seq.iter().enumerate() {
            if node.key.is_some() {
                return Err(TrieError::PrefixCollision {
                    shorter: escape_bytes(&seq[..depth]),
                    longer: escape_bytes(seq),
                });
            }
            node = node.children.entry(b).or_default();
        }

        if node.key.is_some() {
            return Err(TrieError::Duplicate(escape_bytes(seq)));
        }
        if !node.children.is_empty() {
            let mut longer = seq.to_vec();
            node.first_sequence(&mut longer);
            return Err(TrieError::PrefixCollision {
                shorter: escape_bytes(seq),
                longer: escape_bytes(&longer),
            });
        }

        node.key = Some(key);
        self.len += 1;
        Ok(())
    }

    /// The key for a complete sequence, if it is in the trie.
    #[must_use]
    pub fn lookup(&self, seq: &[u8]) -> Option<KeyEvent> {
        seq.iter()
            .try_fold(&self.root, |node, &b| node.child(b))
            .and_then(|node| node.key)
    }

    /// Number of sequences in the trie.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the trie holds no sequences.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ─── KeyDecoder ─────────────────────────────────────────────────────────────

/// One step of decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A key was resolved.
    Key(KeyEvent),
    /// The read timed out with nothing to decode.
    Idle,
    /// Input ended and every buffered key has been returned.
    End,
}

enum ByteRead {
    Byte(u8),
    Idle,
    End,
}

/// Pull-based decoder from a byte stream to [`KeyEvent`]s.
///
/// Reads one byte at a time so it never consumes more input than the keys
/// it returns. Wrap unbuffered sources in a `BufReader`.
pub struct KeyDecoder<'t, R> {
    input: R,
    trie: &'t EscapeTrie,
    /// Raw keys from a sequence that fell off the trie, oldest first.
    pending: VecDeque<KeyEvent>,
    /// A read error held back until `pending` has drained.
    error: Option<io::Error>,
    ended: bool,
}

impl<R: Read> KeyDecoder<'static, R> {
    /// A decoder over `input` using the built-in escape table.
    pub fn new(input: R) -> Self {
        Self::with_trie(input, EscapeTrie::standard())
    }
}

impl<'t, R: Read> KeyDecoder<'t, R> {
    /// A decoder over `input` using a custom trie.
    pub fn with_trie(input: R, trie: &'t EscapeTrie) -> Self {
        Self {
            input,
            trie,
            pending: VecDeque::new(),
            error: None,
            ended: false,
        }
    }

    /// Decode the next key, or report that the input is idle or finished.
    ///
    /// # Errors
    ///
    /// Returns a read error once every key decoded before it has been
    /// returned. After an error or [`Step::End`], further calls return
    /// [`Step::End`].
    pub fn step(&mut self) -> io::Result<Step> {
        if let Some(key) = self.pending.pop_front() {
            return Ok(Step::Key(key));
        }
        if let Some(e) = self.error.take() {
            self.ended = true;
            return Err(e);
        }
        if self.ended {
            return Ok(Step::End);
        }

        match self.read_byte() {
            Ok(ByteRead::Byte(ESC)) => Ok(self.walk()),
            Ok(ByteRead::Byte(b)) => Ok(Step::Key(KeyEvent::Byte(b))),
            Ok(ByteRead::Idle) => Ok(Step::Idle),
            Ok(ByteRead::End) => {
                self.ended = true;
                Ok(Step::End)
            }
            Err(e) => {
                self.ended = true;
                Err(e)
            }
        }
    }

    /// Follow the trie after an ESC until a key resolves or the walk fails.
    fn walk(&mut self) -> Step {
        let trie = self.trie;
        let Some(mut node) = trie.root.child(ESC) else {
            return Step::Key(KeyEvent::Byte(ESC));
        };
        let mut consumed = vec![ESC];

        loop {
            if let Some(key) = node.key {
                return Step::Key(key);
            }
            match self.read_byte() {
                Ok(ByteRead::Byte(b)) => {
                    consumed.push(b);
                    match node.child(b) {
                        Some(next) => node = next,
                        None => break,
                    }
                }
                Ok(ByteRead::Idle) => break,
                Ok(ByteRead::End) => {
                    self.ended = true;
                    break;
                }
                Err(e) => {
                    self.error = Some(e);
                    break;
                }
            }
        }

        if consumed.len() > 1 {
            debug!(seq = %escape_bytes(&consumed), "unrecognized escape sequence");
        }
        self.pending.extend(consumed.into_iter().map(KeyEvent::Byte));
        self.pending.pop_front().map_or(Step::End, Step::Key)
    }

    fn read_byte(&mut self) -> io::Result<ByteRead> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(ByteRead::End),
                Ok(_) => return Ok(ByteRead::Byte(buf[0])),
                Err(e) if is_idle(&e) => return Ok(ByteRead::Idle),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Give back the underlying reader.
    pub fn into_inner(self) -> R {
        self.input
    }
}

/// Yields keys until end of input, skipping idle timeouts.
impl<R: Read> Iterator for KeyDecoder<'_, R> {
    type Item = io::Result<KeyEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.step() {
                Ok(Step::Key(key)) => return Some(Ok(key)),
                Ok(Step::Idle) => {}
                Ok(Step::End) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Helper: decode everything in `data`.
    fn decode(data: &[u8]) -> Vec<KeyEvent> {
        KeyDecoder::new(Cursor::new(data.to_vec()))
            .collect::<io::Result<_>>()
            .unwrap()
    }

    fn bytes(data: &[u8]) -> Vec<KeyEvent> {
        data.iter().copied().map(KeyEvent::Byte).collect()
    }

    /// A reader that replays a script of reads, one chunk per call.
    struct Script(VecDeque<io::Result<Vec<u8>>>);

    impl Script {
        fn new(steps: Vec<io::Result<Vec<u8>>>) -> Self {
            Self(steps.into())
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(chunk)) => {
                    assert!(chunk.len() <= buf.len());
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
            }
        }
    }

    fn idle() -> io::Result<Vec<u8>> {
        Err(io::Error::from(io::ErrorKind::TimedOut))
    }

    // ── KeyEvent ────────────────────────────────────────────────────

    #[test]
    fn ctrl_maps_letters_to_control_bytes() {
        assert_eq!(KeyEvent::ctrl(b'q'), KeyEvent::Byte(0x11));
        assert_eq!(KeyEvent::ctrl(b'a'), KeyEvent::Byte(0x01));
        assert_eq!(KeyEvent::ctrl(b'Z'), KeyEvent::Byte(0x1A));
    }

    #[test]
    fn byte_accessor() {
        assert_eq!(KeyEvent::Byte(b'x').byte(), Some(b'x'));
        assert_eq!(KeyEvent::Home.byte(), None);
    }

    #[test]
    fn display_formats() {
        assert_eq!(KeyEvent::Byte(b'a').to_string(), "97 ('a')");
        assert_eq!(KeyEvent::Byte(3).to_string(), "3");
        assert_eq!(KeyEvent::PageDown.to_string(), "PageDown");
    }

    // ── EscapeTrie ──────────────────────────────────────────────────

    #[test]
    fn standard_table_builds() {
        assert_eq!(EscapeTrie::standard().len(), ESCAPE_TABLE.len());
    }

    #[test]
    fn standard_lookup() {
        let trie = EscapeTrie::standard();
        for &(seq, key) in ESCAPE_TABLE {
            assert_eq!(trie.lookup(seq), Some(key), "{}", escape_bytes(seq));
        }
        assert_eq!(trie.lookup(b"\x1b["), None);
        assert_eq!(trie.lookup(b"\x1b[Z"), None);
    }

    #[test]
    fn build_rejects_empty() {
        let err = EscapeTrie::build([(&b""[..], KeyEvent::Up)]).unwrap_err();
        assert_eq!(err, TrieError::Empty);
    }

    #[test]
    fn build_rejects_duplicates() {
        let table = [(&b"\x1b[A"[..], KeyEvent::Up), (&b"\x1b[A"[..], KeyEvent::Down)];
        let err = EscapeTrie::build(table).unwrap_err();
        assert!(matches!(err, TrieError::Duplicate(_)));
    }

    #[test]
    fn build_rejects_shorter_after_longer() {
        let table = [(&b"\x1b[1~"[..], KeyEvent::Home), (&b"\x1b[1"[..], KeyEvent::End)];
        let err = EscapeTrie::build(table).unwrap_err();
        assert_eq!(
            err,
            TrieError::PrefixCollision {
                shorter: "\\x1b[1".into(),
                longer: "\\x1b[1~".into(),
            }
        );
    }

    #[test]
    fn build_rejects_longer_after_shorter() {
        let table = [(&b"\x1b["[..], KeyEvent::Home), (&b"\x1b[A"[..], KeyEvent::Up)];
        let err = EscapeTrie::build(table).unwrap_err();
        assert!(matches!(err, TrieError::PrefixCollision { .. }));
    }

    // ── Plain bytes ─────────────────────────────────────────────────

    #[test]
    fn plain_bytes_are_one_key_each() {
        let data = b"hello\x01\x7f\r ~";
        assert_eq!(decode(data), bytes(data));
    }

    #[test]
    fn high_bytes_pass_through() {
        assert_eq!(decode(&[0xC3, 0xA9]), bytes(&[0xC3, 0xA9]));
    }

    #[test]
    fn empty_input_ends_immediately() {
        let mut d = KeyDecoder::new(Cursor::new(Vec::new()));
        assert_eq!(d.step().unwrap(), Step::End);
        assert_eq!(d.step().unwrap(), Step::End);
    }

    // ── Escape sequences ────────────────────────────────────────────

    #[test]
    fn arrow_up_consumes_three_bytes() {
        let mut d = KeyDecoder::new(Cursor::new(b"\x1b[Axyz".to_vec()));
        assert_eq!(d.step().unwrap(), Step::Key(KeyEvent::Up));
        assert_eq!(d.into_inner().position(), 3);
    }

    #[test]
    fn every_table_entry_decodes() {
        for &(seq, key) in ESCAPE_TABLE {
            assert_eq!(decode(seq), vec![key], "{}", escape_bytes(seq));
        }
    }

    #[test]
    fn unknown_csi_degrades_to_raw_bytes() {
        assert_eq!(decode(b"\x1b[Z"), bytes(b"\x1b[Z"));
    }

    #[test]
    fn unknown_sequence_keeps_order_with_following_keys() {
        let mut expected = bytes(b"\x1b[9");
        expected.push(KeyEvent::Left);
        expected.push(KeyEvent::Byte(b'x'));
        assert_eq!(decode(b"\x1b[9\x1b[Dx"), expected);
    }

    #[test]
    fn failing_byte_is_not_reinterpreted() {
        // `x` has no node under ESC, so the walk gives up right there.
        assert_eq!(decode(b"\x1bxA"), bytes(b"\x1bxA"));
    }

    #[test]
    fn escape_then_escape_sequence() {
        // The second ESC is consumed by the failed walk, so `[A` follow as bytes.
        assert_eq!(decode(b"\x1b\x1b[A"), bytes(b"\x1b\x1b[A"));
    }

    #[test]
    fn truncated_sequence_at_end_of_input() {
        assert_eq!(decode(b"\x1b[5"), bytes(b"\x1b[5"));
    }

    #[test]
    fn lone_escape_at_end_of_input() {
        assert_eq!(decode(b"\x1b"), bytes(b"\x1b"));
    }

    #[test]
    fn end_to_end_mixed_stream() {
        assert_eq!(
            decode(b"a\x1b[Cq"),
            vec![KeyEvent::Byte(b'a'), KeyEvent::Right, KeyEvent::Byte(b'q')]
        );
    }

    // ── Idle and errors ─────────────────────────────────────────────

    #[test]
    fn idle_is_reported_between_keys() {
        let mut d = KeyDecoder::new(Script::new(vec![
            Ok(b"a".to_vec()),
            idle(),
            Ok(b"b".to_vec()),
        ]));
        assert_eq!(d.step().unwrap(), Step::Key(KeyEvent::Byte(b'a')));
        assert_eq!(d.step().unwrap(), Step::Idle);
        assert_eq!(d.step().unwrap(), Step::Key(KeyEvent::Byte(b'b')));
        assert_eq!(d.step().unwrap(), Step::End);
    }

    #[test]
    fn idle_after_escape_emits_lone_escape() {
        let mut d = KeyDecoder::new(Script::new(vec![
            Ok(b"\x1b".to_vec()),
            idle(),
            Ok(b"[".to_vec()),
        ]));
        assert_eq!(d.step().unwrap(), Step::Key(KeyEvent::Byte(ESC)));
    }

    #[test]
    fn idle_mid_sequence_flushes_consumed_bytes() {
        let mut d = KeyDecoder::new(Script::new(vec![
            Ok(b"\x1b".to_vec()),
            Ok(b"[".to_vec()),
            idle(),
            Ok(b"A".to_vec()),
        ]));
        let keys: Vec<_> = d.by_ref().collect::<io::Result<_>>().unwrap();
        assert_eq!(keys, bytes(b"\x1b[A"));
    }

    #[test]
    fn iterator_skips_idle() {
        let d = KeyDecoder::new(Script::new(vec![idle(), idle(), Ok(b"z".to_vec())]));
        let keys: Vec<_> = d.collect::<io::Result<_>>().unwrap();
        assert_eq!(keys, bytes(b"z"));
    }

    #[test]
    fn read_error_is_returned_and_ends_decoding() {
        let mut d = KeyDecoder::new(Script::new(vec![
            Ok(b"a".to_vec()),
            Err(io::Error::other("boom")),
            Ok(b"b".to_vec()),
        ]));
        assert_eq!(d.step().unwrap(), Step::Key(KeyEvent::Byte(b'a')));
        assert_eq!(d.step().unwrap_err().to_string(), "boom");
        assert_eq!(d.step().unwrap(), Step::End);
    }

    #[test]
    fn iterator_stops_after_read_error() {
        let d = KeyDecoder::new(Script::new(vec![
            Ok(b"a".to_vec()),
            Err(io::Error::other("boom")),
            Ok(b"b".to_vec()),
        ]));
        let items: Vec<_> = d.collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &KeyEvent::Byte(b'a'));
        assert_eq!(items[1].as_ref().unwrap_err().to_string(), "boom");
    }

    #[test]
    fn read_error_mid_sequence_drains_bytes_first() {
        let mut d = KeyDecoder::new(Script::new(vec![
            Ok(b"\x1b".to_vec()),
            Ok(b"[".to_vec()),
            Err(io::Error::other("boom")),
        ]));
        assert_eq!(d.step().unwrap(), Step::Key(KeyEvent::Byte(ESC)));
        assert_eq!(d.step().unwrap(), Step::Key(KeyEvent::Byte(b'[')));
        assert!(d.step().is_err());
        assert_eq!(d.step().unwrap(), Step::End);
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut d = KeyDecoder::new(Script::new(vec![
            Err(io::Error::from(io::ErrorKind::Interrupted)),
            Ok(b"k".to_vec()),
        ]));
        assert_eq!(d.step().unwrap(), Step::Key(KeyEvent::Byte(b'k')));
    }

    #[test]
    fn custom_trie() {
        let trie = EscapeTrie::build([(&b"\x1bZ"[..], KeyEvent::Delete)]).unwrap();
        let keys: Vec<_> = KeyDecoder::with_trie(Cursor::new(b"\x1bZ\x1b[A".to_vec()), &trie)
            .collect::<io::Result<_>>()
            .unwrap();
        let mut expected = vec![KeyEvent::Delete];
        expected.extend(bytes(b"\x1b[A"));
        assert_eq!(keys, expected);
    }
}
