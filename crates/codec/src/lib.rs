pub mod bits;

mod reader;
pub use reader::Reader;

use bytes::{BufMut, BytesMut};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("buffer truncated: wanted {wanted} more bytes at offset {offset}")]
    Truncated { offset: usize, wanted: usize },
    #[error("invalid {what} tag: {value}")]
    InvalidTag { what: &'static str, value: u32 },
    #[error("{what} has {count} entries, exceeding the wire limit of 255")]
    CountOverflow { what: &'static str, count: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Appends a u8-length-prefixed string. Strings longer than 255 bytes are
/// truncated to the wire limit, matching the peer's reader.
pub fn put_str8(buf: &mut BytesMut, s: &str) {
    let len = s.len().min(u8::MAX as usize);
    buf.put_u8(len as u8);
    buf.put_slice(&s.as_bytes()[..len]);
}

/// The serialized size of a u8-length-prefixed string.
pub fn str8_size(s: &str) -> usize {
    1 + s.len().min(u8::MAX as usize)
}
