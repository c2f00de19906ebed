//! Streaming secret redaction for subprocess output
//!
//! This module provides the censoring layer between a subprocess and any
//! observable destination (terminal, log file, in-memory capture). Every
//! chunk of output is scanned for known secret values before it is forwarded,
//! and a secret split across two chunks is still caught: the writer holds
//! back a small tail of bytes that could be the unfinished prefix of a
//! secret until the next chunk (or the final flush) resolves it.
//!
//! # Example
//!
//! ```
//! use image_bumper::security::{RedactingWriter, SecretStore};
//! use std::io::Write;
//!
//! let store = SecretStore::from_values(vec![b"abc".to_vec()]);
//! let mut writer = RedactingWriter::new(Vec::new(), store);
//!
//! // The secret arrives split across two writes.
//! writer.write_all(b"ab").unwrap();
//! writer.write_all(b"c: 123").unwrap();
//! writer.flush().unwrap();
//!
//! assert_eq!(writer.get_ref().as_slice(), b"CENSORED: 123");
//! ```

use aho_corasick::{AhoCorasick, MatchKind};
use std::io::{self, Write};
use std::sync::Arc;

use super::secret_store::SecretStore;

/// Replacement token substituted for every matched secret span.
pub const CENSORED: &str = "CENSORED";

/// An immutable point-in-time set of secret values.
///
/// Snapshots are produced by [`SecretStore`] and shared behind an `Arc`;
/// reloading secrets swaps the snapshot reference, it never mutates a set
/// that a writer is scanning with. Empty values are rejected at construction
/// since they would match at every position.
pub struct SecretSet {
    values: Vec<Vec<u8>>,
    matcher: Option<AhoCorasick>,
    max_len: usize,
}

impl SecretSet {
    /// Builds a snapshot from raw secret values.
    ///
    /// Empty values are dropped, duplicates collapse.
    pub fn new(values: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let mut values: Vec<Vec<u8>> = values.into_iter().filter(|v| !v.is_empty()).collect();
        values.sort();
        values.dedup();

        let max_len = values.iter().map(|v| v.len()).max().unwrap_or(0);
        let matcher = if values.is_empty() {
            None
        } else {
            // LeftmostLongest: at the leftmost matching position the longest
            // secret wins, and scanning resumes after the matched span. This
            // is exactly the no-overlap, longest-first replacement rule.
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&values)
                    .expect("failed to build secret matcher"),
            )
        };

        Self {
            values,
            matcher,
            max_len,
        }
    }

    /// Snapshot with no secret values; censoring becomes a passthrough.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Length in bytes of the longest secret, 0 for an empty set.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Censors a complete buffer. No bytes are held back; use this only when
    /// no further input can arrive (whole-value scans, final flush).
    pub fn censor(&self, input: &[u8]) -> Vec<u8> {
        let Some(matcher) = &self.matcher else {
            return input.to_vec();
        };

        let mut out = Vec::with_capacity(input.len());
        let mut pos = 0;
        for m in matcher.find_iter(input) {
            out.extend_from_slice(&input[pos..m.start()]);
            out.extend_from_slice(CENSORED.as_bytes());
            pos = m.end();
        }
        out.extend_from_slice(&input[pos..]);
        out
    }

    /// Censors one chunk of a stream.
    ///
    /// Returns the bytes safe to forward and the tail that must be held
    /// back. A match is only committed when every secret is fully visible at
    /// its start position, i.e. at least `max_len` bytes remain; everything
    /// from the first undecidable position on (at most `max_len - 1` bytes)
    /// becomes the tail.
    fn censor_chunk(&self, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let Some(matcher) = &self.matcher else {
            return (input.to_vec(), Vec::new());
        };

        let n = input.len();
        if n < self.max_len {
            // Too short to rule anything out.
            return (Vec::new(), input.to_vec());
        }

        // Last start position at which the longest secret is fully visible.
        let boundary = n - self.max_len;

        let mut out = Vec::with_capacity(n);
        let mut pos = 0;
        for m in matcher.find_iter(input) {
            if m.start() > boundary {
                break;
            }
            out.extend_from_slice(&input[pos..m.start()]);
            out.extend_from_slice(CENSORED.as_bytes());
            pos = m.end();
        }

        let tail_start = pos.max(boundary + 1);
        out.extend_from_slice(&input[pos..tail_start]);
        (out, input[tail_start..].to_vec())
    }
}

/// A writer that censors known secret values before forwarding bytes to a
/// downstream sink.
///
/// Each instance owns its pending tail, so one writer serves exactly one
/// output stream; a subprocess gets independent instances for stdout and
/// stderr. The secret snapshot is re-fetched from the store on every write,
/// so rotated-in secrets are honored from the next chunk on. Bytes already
/// forwarded are never revisited.
///
/// Sink write failures propagate unchanged; the writer never swallows them,
/// since silently dropped output could hide a leak or a diagnostic.
pub struct RedactingWriter<W> {
    sink: W,
    store: SecretStore,
    tail: Vec<u8>,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(sink: W, store: SecretStore) -> Self {
        Self {
            sink,
            store,
            tail: Vec::new(),
        }
    }

    /// Bytes currently held back as a possible secret prefix.
    ///
    /// Always shorter than the longest secret known at the last write.
    pub fn pending_len(&self) -> usize {
        self.tail.len()
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Flushes the pending tail and returns the sink.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush_tail()?;
        Ok(self.sink)
    }

    fn flush_tail(&mut self) -> io::Result<()> {
        if self.tail.is_empty() {
            return Ok(());
        }
        // The stream is ending: scan the tail with no holdback so a complete
        // short secret resting inside it is still replaced, then forward the
        // remainder verbatim.
        let set: Arc<SecretSet> = self.store.current();
        let tail = std::mem::take(&mut self.tail);
        let out = set.censor(&tail);
        self.sink.write_all(&out)
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        if chunk.is_empty() {
            return Ok(0);
        }

        let set: Arc<SecretSet> = self.store.current();

        let mut work = std::mem::take(&mut self.tail);
        work.extend_from_slice(chunk);

        let (out, tail) = set.censor_chunk(&work);
        self.tail = tail;
        if !out.is_empty() {
            self.sink.write_all(&out)?;
        }

        // From the caller's point of view every input byte was accepted.
        Ok(chunk.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_tail()?;
        self.sink.flush()
    }
}
