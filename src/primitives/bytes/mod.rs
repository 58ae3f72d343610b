#![forbid(unsafe_code)]
//! Append-side wire primitives shared by every index command.
//!
//! All integers are big-endian. Character sequences are written as UTF-16
//! code units, two bytes each, and their lengths are counted in code units.

use bytes::{BufMut, BytesMut};

use crate::types::{IndexLogError, Result};

/// Width of one UTF-16 code unit on the wire.
pub const CODE_UNIT_LEN: usize = core::mem::size_of::<u16>();

const CHAR_CHUNK_LEN: usize = 64;

/// Append-only target that command records are serialized into.
///
/// Capacity management belongs to the implementor; a failing append aborts
/// the record being written.
pub trait LogBuffer {
    /// Appends raw bytes.
    fn put_slice(&mut self, src: &[u8]) -> Result<()>;

    /// Appends a single byte.
    fn put_u8(&mut self, v: u8) -> Result<()> {
        self.put_slice(&[v])
    }

    /// Appends a big-endian 32-bit signed integer.
    fn put_i32(&mut self, v: i32) -> Result<()> {
        self.put_slice(&v.to_be_bytes())
    }

    /// Appends a big-endian 64-bit signed integer.
    fn put_i64(&mut self, v: i64) -> Result<()> {
        self.put_slice(&v.to_be_bytes())
    }

    /// Appends the UTF-16 code units of `s` without a length prefix.
    fn put_chars(&mut self, s: &str) -> Result<()> {
        let mut chunk = [0u8; CHAR_CHUNK_LEN];
        let mut filled = 0usize;
        for unit in s.encode_utf16() {
            chunk[filled..filled + CODE_UNIT_LEN].copy_from_slice(&unit.to_be_bytes());
            filled += CODE_UNIT_LEN;
            if filled == CHAR_CHUNK_LEN {
                self.put_slice(&chunk)?;
                filled = 0;
            }
        }
        if filled > 0 {
            self.put_slice(&chunk[..filled])?;
        }
        Ok(())
    }
}

impl LogBuffer for Vec<u8> {
    fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        self.extend_from_slice(src);
        Ok(())
    }
}

impl LogBuffer for BytesMut {
    fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        BufMut::put_slice(self, src);
        Ok(())
    }

    fn put_i32(&mut self, v: i32) -> Result<()> {
        BufMut::put_i32(self, v);
        Ok(())
    }

    fn put_i64(&mut self, v: i64) -> Result<()> {
        BufMut::put_i64(self, v);
        Ok(())
    }
}

/// Length of `s` in UTF-16 code units, as carried in a 4-byte length field.
pub fn char_len(s: &str) -> Result<i32> {
    let units = s.encode_utf16().count();
    i32::try_from(units).map_err(|_| {
        IndexLogError::Invalid("character sequence longer than i32::MAX code units")
    })
}

/// Number of bytes `s` occupies on the wire, excluding its length prefix.
pub fn chars_wire_len(s: &str) -> usize {
    s.encode_utf16().count() * CODE_UNIT_LEN
}
