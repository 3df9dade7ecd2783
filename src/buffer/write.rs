//! Write buffer for encoding info requests and responses

use bytes::{BufMut, Bytes, BytesMut};

/// A buffer for writing info clumplets
#[derive(Debug, Default)]
pub struct WriteBuffer {
    /// The underlying byte buffer
    data: BytesMut,
}

impl WriteBuffer {
    /// Create a new empty WriteBuffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new WriteBuffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the current length of data in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Write a 2-byte little-endian length
    pub fn write_vax_u16(&mut self, value: u16) {
        self.data.put_u16_le(value);
    }

    /// Write an integer item: item byte, 2-byte length and 4-byte value
    pub fn write_integer_item(&mut self, item: u8, value: i32) {
        self.write_u8(item);
        self.write_vax_u16(4);
        self.data.put_i32_le(value);
    }

    /// Freeze the buffer into immutable bytes
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }
}
