//! Full-drawing request and insert envelopes.
//!
//! Both carry a caller-chosen echo code so the asynchronous client can
//! match a response back to the request that produced it. The drawing body
//! itself is present exactly when the `has_drawing` byte says so: requests
//! for details omit it, responses carry it; inserts carry it, insert
//! responses omit it.

use bytes::{BufMut, BytesMut};
use codec::Reader;
use models::{Drawing, Registries};

use crate::{Envelope, RequestType};

/// Requests the full record for one drawing by database row ID.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawingRequest {
    pub mat_id: u32,
    pub echo_code: u32,
    pub drawing: Option<Drawing>,
}

impl DrawingRequest {
    pub fn new(mat_id: u32, echo_code: u32) -> Self {
        Self {
            mat_id,
            echo_code,
            drawing: None,
        }
    }

    pub fn deserialize(r: &mut Reader, registries: &Registries) -> codec::Result<Self> {
        let tag = RequestType::read(r)?;
        debug_assert_eq!(tag, RequestType::DrawingDetails);

        let mat_id = r.read_u32()?;
        let echo_code = r.read_u32()?;
        let drawing = if r.read_bool()? {
            Some(Drawing::deserialize(r, registries)?)
        } else {
            None
        };
        Ok(Self {
            mat_id,
            echo_code,
            drawing,
        })
    }
}

impl Envelope for DrawingRequest {
    fn serialized_size(&self) -> usize {
        RequestType::WIRE_SIZE
            + 4
            + 4
            + 1
            + self
                .drawing
                .as_ref()
                .map_or(0, |drawing| drawing.serialized_size())
    }

    fn serialize_into(&self, buf: &mut BytesMut) {
        RequestType::DrawingDetails.write(buf);
        buf.put_u32_le(self.mat_id);
        buf.put_u32_le(self.echo_code);
        buf.put_u8(self.drawing.is_some() as u8);
        if let Some(drawing) = &self.drawing {
            drawing.serialize_into(buf);
        }
    }
}

/// The server's verdict on a drawing insert. `DrawingExists` is advisory:
/// the client may retry the same insert with `force` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertResponse {
    #[default]
    None = 0,
    Success = 1,
    Failed = 2,
    DrawingExists = 3,
}

impl InsertResponse {
    pub fn from_u8(value: u8) -> codec::Result<Self> {
        Ok(match value {
            0 => Self::None,
            1 => Self::Success,
            2 => Self::Failed,
            3 => Self::DrawingExists,
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "insert response",
                    value: other as u32,
                })
            }
        })
    }
}

/// Inserts a new drawing, or updates an existing one when forced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawingInsert {
    pub response: InsertResponse,
    pub echo_code: u32,
    pub force: bool,
    pub drawing: Option<Drawing>,
}

impl DrawingInsert {
    pub fn new(drawing: Drawing, echo_code: u32, force: bool) -> Self {
        Self {
            response: InsertResponse::None,
            echo_code,
            force,
            drawing: Some(drawing),
        }
    }

    pub fn deserialize(r: &mut Reader, registries: &Registries) -> codec::Result<Self> {
        let tag = RequestType::read(r)?;
        debug_assert_eq!(tag, RequestType::DrawingInsert);

        let response = InsertResponse::from_u8(r.read_u8()?)?;
        let echo_code = r.read_u32()?;
        let force = r.read_bool()?;
        let drawing = if r.read_bool()? {
            Some(Drawing::deserialize(r, registries)?)
        } else {
            None
        };
        Ok(Self {
            response,
            echo_code,
            force,
            drawing,
        })
    }
}

impl Envelope for DrawingInsert {
    fn serialized_size(&self) -> usize {
        RequestType::WIRE_SIZE
            + 1
            + 4
            + 1
            + 1
            + self
                .drawing
                .as_ref()
                .map_or(0, |drawing| drawing.serialized_size())
    }

    fn serialize_into(&self, buf: &mut BytesMut) {
        RequestType::DrawingInsert.write(buf);
        buf.put_u8(self.response as u8);
        buf.put_u32_le(self.echo_code);
        buf.put_u8(self.force as u8);
        buf.put_u8(self.drawing.is_some() as u8);
        if let Some(drawing) = &self.drawing {
            drawing.serialize_into(buf);
        }
    }
}
