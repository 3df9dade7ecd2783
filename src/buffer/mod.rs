//! Buffer abstractions for info request/response encoding
//!
//! This module provides the buffer types used to build and decode the
//! little-endian clumplets exchanged for cursor info.

mod read;
mod write;

pub use read::ReadBuffer;
pub use write::WriteBuffer;

use bytes::Bytes;

use crate::constants::info;
use crate::error::{Error, Result};

/// Decode the record count from a cursor info response
///
/// The response must start with the `INF_RECORD_COUNT` item.
pub fn parse_record_count(response: Bytes) -> Result<i64> {
    let mut buf = ReadBuffer::new(response);
    let item = buf.read_u8()?;
    match item {
        info::INF_RECORD_COUNT => buf.read_vax_item_integer(),
        info::ISC_INFO_TRUNCATED => Err(Error::Protocol(
            "cursor info response truncated".to_string(),
        )),
        other => Err(Error::Protocol(format!(
            "unexpected cursor info item: {}",
            other
        ))),
    }
}

/// Build a cursor info response holding a record count
pub fn encode_record_count(count: i32) -> Bytes {
    let mut buf = WriteBuffer::with_capacity(info::RECORD_COUNT_BUFFER_LENGTH);
    buf.write_integer_item(info::INF_RECORD_COUNT, count);
    buf.write_u8(info::ISC_INFO_END);
    buf.freeze()
}
