//! Database backup and next-drawing-number envelopes.

use bytes::{BufMut, BytesMut};
use codec::{put_str8, str8_size, Reader};

use crate::{Envelope, RequestType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupResponse {
    #[default]
    None = 0,
    Success = 1,
    Failed = 2,
}

impl BackupResponse {
    pub fn from_u8(value: u8) -> codec::Result<Self> {
        Ok(match value {
            0 => Self::None,
            1 => Self::Success,
            2 => Self::Failed,
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "backup response",
                    value: other as u32,
                })
            }
        })
    }
}

/// Asks the server to snapshot the database under the given name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatabaseBackup {
    pub response: BackupResponse,
    pub backup_name: String,
}

impl DatabaseBackup {
    pub fn new(backup_name: impl Into<String>) -> Self {
        Self {
            response: BackupResponse::None,
            backup_name: backup_name.into(),
        }
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        let tag = RequestType::read(r)?;
        debug_assert_eq!(tag, RequestType::CreateDatabaseBackup);

        Ok(Self {
            response: BackupResponse::from_u8(r.read_u8()?)?,
            backup_name: r.read_str8()?,
        })
    }
}

impl Envelope for DatabaseBackup {
    fn serialized_size(&self) -> usize {
        RequestType::WIRE_SIZE + 1 + str8_size(&self.backup_name)
    }

    fn serialize_into(&self, buf: &mut BytesMut) {
        RequestType::CreateDatabaseBackup.write(buf);
        buf.put_u8(self.response as u8);
        put_str8(buf, &self.backup_name);
    }
}

/// Whether the drawing number sequence is the automatic series or the
/// manually-allocated "M" series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawingType {
    #[default]
    Automatic = 0,
    Manual = 1,
}

impl DrawingType {
    pub fn from_u8(value: u8) -> codec::Result<Self> {
        Ok(match value {
            0 => Self::Automatic,
            1 => Self::Manual,
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "drawing type",
                    value: other as u32,
                })
            }
        })
    }
}

/// Asks the server for the next unused drawing number in a series. The
/// request omits the number; the response carries it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NextDrawing {
    pub drawing_type: DrawingType,
    pub drawing_number: Option<String>,
}

impl NextDrawing {
    pub fn new(drawing_type: DrawingType) -> Self {
        Self {
            drawing_type,
            drawing_number: None,
        }
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        let tag = RequestType::read(r)?;
        debug_assert_eq!(tag, RequestType::GetNextDrawingNumber);

        let drawing_type = DrawingType::from_u8(r.read_u8()?)?;
        let drawing_number = if r.read_bool()? {
            Some(r.read_str8()?)
        } else {
            None
        };
        Ok(Self {
            drawing_type,
            drawing_number,
        })
    }
}

impl Envelope for NextDrawing {
    fn serialized_size(&self) -> usize {
        RequestType::WIRE_SIZE
            + 1
            + 1
            + self
                .drawing_number
                .as_ref()
                .map_or(0, |number| str8_size(number))
    }

    fn serialize_into(&self, buf: &mut BytesMut) {
        RequestType::GetNextDrawingNumber.write(buf);
        buf.put_u8(self.drawing_type as u8);
        buf.put_u8(self.drawing_number.is_some() as u8);
        if let Some(number) = &self.drawing_number {
            put_str8(buf, number);
        }
    }
}
