use crate::{Error, Result};

/// A bounds-checked cursor over a borrowed byte buffer.
///
/// Every getter reads little-endian and fails with [`Error::Truncated`]
/// rather than panicking when the buffer runs short, which lets a codec
/// bounds-check each deserialization step with `?`.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The unread remainder of the buffer, without consuming it.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn advance(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Truncated {
                offset: self.pos,
                wanted: n - self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads a u8-length-prefixed string. Non-UTF-8 bytes are replaced
    /// rather than rejected: the peer writes raw narrow strings.
    pub fn read_str8(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        let raw = self.take(len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_reads_advance_the_cursor() {
        let buf = [0x01, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_u16().unwrap(), 2);
        assert_eq!(r.read_u32().unwrap(), 3);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncation_reports_the_shortfall() {
        let mut r = Reader::new(&[0xAA]);
        assert_eq!(
            r.read_u32(),
            Err(Error::Truncated {
                offset: 0,
                wanted: 3
            })
        );
    }

    #[test]
    fn str8_round_trip() {
        let mut buf = bytes::BytesMut::new();
        crate::put_str8(&mut buf, "A01");
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_str8().unwrap(), "A01");
    }
}
