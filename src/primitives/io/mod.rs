#![forbid(unsafe_code)]
//! Read-side wire primitives over a forward-only byte channel.
//!
//! Every read distinguishes a channel that ended early (`Ok(None)`) from a
//! channel that failed (`Err`). Recovery relies on that split: the first is
//! the tail of a record that never finished writing, the second is fatal.

use std::io::{self, ErrorKind, Read};

use crate::primitives::bytes::CODE_UNIT_LEN;
use crate::types::{IndexLogError, Result};

/// Smallest scratch capacity accepted; large enough for any fixed-width field block.
pub const MIN_SCRATCH_CAPACITY: usize = 64;
/// Scratch capacity used when nothing else is configured.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 4096;
/// Largest scratch capacity accepted; larger requests are clamped to it.
pub const MAX_SCRATCH_CAPACITY: usize = 1 << 20;

/// Reusable decode buffer owned by a single recovery pass.
///
/// Character sequences longer than the capacity are streamed through it in
/// chunks, so a damaged length prefix never forces one huge allocation before
/// the channel runs dry.
#[derive(Debug)]
pub struct ScratchBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SCRATCH_CAPACITY)
    }
}

impl ScratchBuffer {
    /// Creates a buffer of `capacity` bytes clamped to
    /// [`MIN_SCRATCH_CAPACITY`]..=[`MAX_SCRATCH_CAPACITY`] and rounded down to
    /// a whole number of code units. Memory is allocated on first read.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(MIN_SCRATCH_CAPACITY, MAX_SCRATCH_CAPACITY)
            & !(CODE_UNIT_LEN - 1);
        Self {
            buf: Vec::new(),
            capacity,
        }
    }

    /// Returns the chunk size used for streamed reads.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reads exactly `n` bytes, returning `None` if the channel ends first.
    pub fn read_exact<R: Read + ?Sized>(
        &mut self,
        channel: &mut R,
        n: usize,
    ) -> Result<Option<&[u8]>> {
        self.buf.clear();
        self.buf.resize(n, 0);
        if fill(channel, &mut self.buf)? {
            Ok(Some(&self.buf[..n]))
        } else {
            Ok(None)
        }
    }

    /// Reads one byte.
    pub fn read_u8<R: Read + ?Sized>(&mut self, channel: &mut R) -> Result<Option<u8>> {
        Ok(self.read_exact(channel, 1)?.map(|bytes| bytes[0]))
    }

    /// Reads a big-endian 64-bit signed integer.
    pub fn read_i64<R: Read + ?Sized>(&mut self, channel: &mut R) -> Result<Option<i64>> {
        Ok(self.read_exact(channel, 8)?.map(|bytes| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            i64::from_be_bytes(raw)
        }))
    }

    /// Reads `char_count` UTF-16 code units and decodes them.
    ///
    /// Returns `None` if the channel ends first. Unpaired surrogates are
    /// corruption: the encoder only ever writes well-formed sequences.
    pub fn read_string<R: Read + ?Sized>(
        &mut self,
        channel: &mut R,
        char_count: usize,
    ) -> Result<Option<String>> {
        let units_per_chunk = self.capacity / CODE_UNIT_LEN;
        let mut units: Vec<u16> = Vec::with_capacity(char_count.min(units_per_chunk));
        let mut remaining = char_count;
        while remaining > 0 {
            let take = remaining.min(units_per_chunk);
            let Some(bytes) = self.read_exact(channel, take * CODE_UNIT_LEN)? else {
                return Ok(None);
            };
            units.extend(
                bytes
                    .chunks_exact(CODE_UNIT_LEN)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
            );
            remaining -= take;
        }
        String::from_utf16(&units)
            .map(Some)
            .map_err(|_| IndexLogError::Corruption("invalid utf-16 character sequence"))
    }
}

/// Fills `dst` from `channel`, returning false if the channel ends first.
fn fill<R: Read + ?Sized>(channel: &mut R, mut dst: &mut [u8]) -> Result<bool> {
    while !dst.is_empty() {
        match channel.read(dst) {
            Ok(0) => return Ok(false),
            Ok(read) => {
                let rest = std::mem::take(&mut dst);
                dst = &mut rest[read..];
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(false),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(true)
}

/// Reader adapter that tracks how many bytes have been consumed.
///
/// Recovery uses the position after each complete record as the boundary
/// up to which the log is known to be valid.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    position: u64,
}

impl<R> CountingReader<R> {
    /// Wraps `inner`, treating its current position as `start`.
    pub fn new(inner: R, start: u64) -> Self {
        Self {
            inner,
            position: start,
        }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }
}
