//! Read buffer for decoding info responses
//!
//! Info responses are clumplets: an item byte, a 2-byte little-endian
//! length and a little-endian ("VAX") encoded value.

use bytes::Bytes;

use crate::error::{Error, Result};

/// A buffer for reading info response data
#[derive(Debug)]
pub struct ReadBuffer {
    /// The underlying byte data
    data: Bytes,
    /// Current read position
    pos: usize,
}

impl ReadBuffer {
    /// Create a new ReadBuffer from bytes
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a new ReadBuffer from a byte slice
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            pos: 0,
        }
    }

    /// Get the current position in the buffer
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the number of bytes remaining to be read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Skip `n` bytes in the buffer
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure_remaining(n)?;
        self.pos += n;
        Ok(())
    }

    #[inline]
    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            Err(Error::BufferUnderflow {
                needed: n,
                available: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure_remaining(1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Read raw bytes and return as a new Bytes
    pub fn read_bytes_owned(&mut self, n: usize) -> Result<Bytes> {
        self.ensure_remaining(n)?;
        let bytes = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(bytes)
    }

    /// Read a 2-byte little-endian length
    pub fn read_vax_u16(&mut self) -> Result<u16> {
        self.ensure_remaining(2)?;
        let value = u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    /// Read a little-endian signed integer of `length` bytes (at most 8)
    ///
    /// A zero length decodes as 0.
    pub fn read_vax_integer(&mut self, length: usize) -> Result<i64> {
        if length > 8 {
            return Err(Error::Protocol(format!(
                "integer of {} bytes exceeds 8 bytes",
                length
            )));
        }
        self.ensure_remaining(length)?;
        let mut value: i64 = 0;
        for (shift, byte) in self.data[self.pos..self.pos + length].iter().enumerate() {
            value |= (*byte as i64) << (shift * 8);
        }
        if length > 0 && length < 8 {
            // sign-extend from the highest byte read
            let bits = (length * 8) as u32;
            value = (value << (64 - bits)) >> (64 - bits);
        }
        self.pos += length;
        Ok(value)
    }

    /// Read a length-prefixed little-endian integer item value
    pub fn read_vax_item_integer(&mut self) -> Result<i64> {
        let length = self.read_vax_u16()? as usize;
        self.read_vax_integer(length)
    }
}
