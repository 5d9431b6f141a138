use bytes::{BufMut, BytesMut};
use codec::Reader;

/// A calendar date, packed to four bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub const SERIALIZED_SIZE: usize = 4;

    pub fn new(year: u16, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    pub fn today() -> Self {
        let now = time::OffsetDateTime::now_utc().date();
        Self {
            year: now.year() as u16,
            month: now.month() as u8,
            day: now.day(),
        }
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.year);
        buf.put_u8(self.month);
        buf.put_u8(self.day);
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            year: r.read_u16()?,
            month: r.read_u8()?,
            day: r.read_u8()?,
        })
    }
}

impl std::fmt::Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_byte_wire_form() {
        let date = Date::new(2024, 7, 6);
        let mut buf = BytesMut::new();
        date.serialize_into(&mut buf);
        assert_eq!(buf.len(), Date::SERIALIZED_SIZE);
        assert_eq!(&buf[..], &[0xE8, 0x07, 7, 6]);

        let mut r = Reader::new(&buf);
        assert_eq!(Date::deserialize(&mut r).unwrap(), date);
    }
}
