use bytes::{BufMut, BytesMut};
use codec::Reader;

/// The tag heading every request and response body. Numeric values are part
/// of the wire contract and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RequestType {
    DrawingSearchQuery = 1,
    DrawingDetails = 2,
    DrawingInsert = 3,
    SourceProductTable = 4,
    SourceApertureTable = 5,
    SourceApertureShapeTable = 6,
    SourceMaterialTable = 7,
    SourceSideIronTable = 8,
    SourceMachineTable = 9,
    SourceMachineDeckTable = 10,
    SourceExtraPricesTable = 11,
    SourceSideIronPricesTable = 12,
    SourceBackingStripTable = 13,
    SourceStrapTable = 14,
    SourceLabourTimesTable = 15,
    SourcePowderCoatingPricesTable = 16,
    AddNewComponent = 17,
    GetNextDrawingNumber = 18,
    CreateDatabaseBackup = 19,
    RepeatTokenRequest = 20,
    UserEmailRequest = 21,
}

impl RequestType {
    pub const WIRE_SIZE: usize = 4;

    pub fn from_u32(value: u32) -> codec::Result<Self> {
        Ok(match value {
            1 => Self::DrawingSearchQuery,
            2 => Self::DrawingDetails,
            3 => Self::DrawingInsert,
            4 => Self::SourceProductTable,
            5 => Self::SourceApertureTable,
            6 => Self::SourceApertureShapeTable,
            7 => Self::SourceMaterialTable,
            8 => Self::SourceSideIronTable,
            9 => Self::SourceMachineTable,
            10 => Self::SourceMachineDeckTable,
            11 => Self::SourceExtraPricesTable,
            12 => Self::SourceSideIronPricesTable,
            13 => Self::SourceBackingStripTable,
            14 => Self::SourceStrapTable,
            15 => Self::SourceLabourTimesTable,
            16 => Self::SourcePowderCoatingPricesTable,
            17 => Self::AddNewComponent,
            18 => Self::GetNextDrawingNumber,
            19 => Self::CreateDatabaseBackup,
            20 => Self::RepeatTokenRequest,
            21 => Self::UserEmailRequest,
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "request type",
                    value: other,
                })
            }
        })
    }

    pub fn write(self, buf: &mut BytesMut) {
        buf.put_u32_le(self as u32);
    }

    pub fn read(r: &mut Reader) -> codec::Result<Self> {
        Self::from_u32(r.read_u32()?)
    }

    /// Reads the tag off the head of a buffer without consuming it.
    pub fn peek(bytes: &[u8]) -> codec::Result<Self> {
        Self::read(&mut Reader::new(bytes))
    }

    pub fn is_source_table(self) -> bool {
        (Self::SourceProductTable as u32..=Self::SourcePowderCoatingPricesTable as u32)
            .contains(&(self as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_with_stable_values() {
        for value in 1..=21 {
            let tag = RequestType::from_u32(value).unwrap();
            assert_eq!(tag as u32, value);
        }
        assert!(RequestType::from_u32(0).is_err());
        assert!(RequestType::from_u32(22).is_err());
    }

    #[test]
    fn peek_does_not_consume() {
        let mut buf = BytesMut::new();
        RequestType::DrawingInsert.write(&mut buf);
        assert_eq!(RequestType::peek(&buf).unwrap(), RequestType::DrawingInsert);
        assert_eq!(RequestType::peek(&buf).unwrap(), RequestType::DrawingInsert);
    }
}
