//! Typed decoding of inbound message bodies.
//!
//! The dispatch loop hands every decrypted buffer to [`decode_response`],
//! which switches on the leading [`RequestType`] tag. Component-table
//! payloads are applied to the matching registry as a side effect (firing
//! its refresh callbacks); everything else comes back as a [`Response`]
//! variant for the client to route by echo code or single-shot slot.

use bytes::{BufMut, Bytes, BytesMut};
use codec::{put_str8, Reader};
use models::{Component, DrawingSummary, Registries, SummaryCompressionSchema};

use crate::{
    ComponentInsertResponse, DatabaseBackup, DrawingInsert, DrawingRequest, DrawingType,
    BackupResponse, InsertResponse, NextDrawing, RequestType,
};

pub const REPEAT_TOKEN_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Codec(#[from] codec::Error),
    #[error("unknown request tag {0}")]
    UnknownTag(u32),
}

/// A decoded inbound message.
#[derive(Debug)]
pub enum Response {
    SearchResults(Vec<DrawingSummary>),
    Drawing(DrawingRequest),
    InsertResult {
        response: InsertResponse,
        echo_code: u32,
    },
    ComponentInsertResult {
        response: ComponentInsertResponse,
        source_table: Option<RequestType>,
    },
    BackupResult(BackupResponse),
    NextDrawingNumber {
        drawing_type: DrawingType,
        drawing_number: Option<String>,
    },
    RepeatToken([u8; REPEAT_TOKEN_LEN]),
    UserEmail(String),
    /// A component table was applied to its registry.
    TableSourced {
        table: RequestType,
        records: usize,
    },
}

pub fn decode_response(bytes: &[u8], registries: &Registries) -> Result<Response, DecodeError> {
    let mut r = Reader::new(bytes);
    let tag = match RequestType::read(&mut r) {
        Ok(tag) => tag,
        Err(codec::Error::InvalidTag { value, .. }) => {
            return Err(DecodeError::UnknownTag(value))
        }
        Err(err) => return Err(err.into()),
    };

    let response = match tag {
        RequestType::DrawingSearchQuery => {
            let schema = SummaryCompressionSchema::deserialize(&mut r)?;
            let count = r.read_u32()?;
            let mut summaries = Vec::with_capacity(count.min(1 << 16) as usize);
            for _ in 0..count {
                summaries.push(schema.decompress(&mut r)?);
            }
            Response::SearchResults(summaries)
        }
        RequestType::DrawingDetails => {
            let mut full = Reader::new(bytes);
            Response::Drawing(DrawingRequest::deserialize(&mut full, registries)?)
        }
        RequestType::DrawingInsert => {
            let mut full = Reader::new(bytes);
            let insert = DrawingInsert::deserialize(&mut full, registries)?;
            Response::InsertResult {
                response: insert.response,
                echo_code: insert.echo_code,
            }
        }
        RequestType::AddNewComponent => {
            let mut full = Reader::new(bytes);
            let insert = crate::ComponentInsert::deserialize(&mut full)?;
            Response::ComponentInsertResult {
                response: insert.response,
                source_table: insert.source_table(),
            }
        }
        RequestType::CreateDatabaseBackup => {
            let mut full = Reader::new(bytes);
            Response::BackupResult(DatabaseBackup::deserialize(&mut full)?.response)
        }
        RequestType::GetNextDrawingNumber => {
            let mut full = Reader::new(bytes);
            let next = NextDrawing::deserialize(&mut full)?;
            Response::NextDrawingNumber {
                drawing_type: next.drawing_type,
                drawing_number: next.drawing_number,
            }
        }
        RequestType::RepeatTokenRequest => {
            let mut token = [0u8; REPEAT_TOKEN_LEN];
            token.copy_from_slice(r.take(REPEAT_TOKEN_LEN)?);
            Response::RepeatToken(token)
        }
        RequestType::UserEmailRequest => Response::UserEmail(r.read_str8()?),
        RequestType::SourceProductTable => sourced(tag, registries.products.read_table(&mut r)?),
        RequestType::SourceApertureTable => sourced(tag, registries.apertures.read_table(&mut r)?),
        RequestType::SourceApertureShapeTable => {
            sourced(tag, registries.aperture_shapes.read_table(&mut r)?)
        }
        RequestType::SourceMaterialTable => sourced(tag, registries.materials.read_table(&mut r)?),
        RequestType::SourceSideIronTable => {
            sourced(tag, registries.side_irons.read_table(&mut r)?)
        }
        RequestType::SourceMachineTable => sourced(tag, registries.machines.read_table(&mut r)?),
        RequestType::SourceMachineDeckTable => {
            sourced(tag, registries.machine_decks.read_table(&mut r)?)
        }
        RequestType::SourceExtraPricesTable => {
            sourced(tag, registries.extra_prices.read_table(&mut r)?)
        }
        RequestType::SourceSideIronPricesTable => {
            sourced(tag, registries.side_iron_prices.read_table(&mut r)?)
        }
        RequestType::SourceBackingStripTable => {
            sourced(tag, registries.backing_strips.read_table(&mut r)?)
        }
        RequestType::SourceStrapTable => sourced(tag, registries.straps.read_table(&mut r)?),
        RequestType::SourceLabourTimesTable => {
            sourced(tag, registries.labour_times.read_table(&mut r)?)
        }
        RequestType::SourcePowderCoatingPricesTable => {
            sourced(tag, registries.powder_coating_prices.read_table(&mut r)?)
        }
    };

    Ok(response)
}

fn sourced(table: RequestType, records: usize) -> Response {
    tracing::debug!(?table, records, "sourced component table");
    Response::TableSourced { table, records }
}

/// Packs a component table payload the way the server does. Also drives the
/// table half of the round-trip tests.
pub fn encode_component_table<T: Component>(table: RequestType, records: &[T]) -> Bytes {
    let mut buf = BytesMut::with_capacity(
        RequestType::WIRE_SIZE + 4 + records.iter().map(T::record_size).sum::<usize>(),
    );
    table.write(&mut buf);
    buf.put_u32_le(records.len() as u32);
    for record in records {
        record.write_record(&mut buf);
    }
    buf.freeze()
}

/// Packs a search-result payload: the compression schema header, a record
/// count, then each summary bit-packed under the schema.
pub fn encode_search_results(
    schema: &SummaryCompressionSchema,
    summaries: &[DrawingSummary],
) -> Bytes {
    let mut buf = BytesMut::new();
    RequestType::DrawingSearchQuery.write(&mut buf);
    schema.serialize_into(&mut buf);
    buf.put_u32_le(summaries.len() as u32);
    for summary in summaries {
        schema.compress_into(summary, &mut buf);
    }
    buf.freeze()
}

pub fn encode_user_token(token: &[u8; REPEAT_TOKEN_LEN]) -> Bytes {
    let mut buf = BytesMut::with_capacity(RequestType::WIRE_SIZE + REPEAT_TOKEN_LEN);
    RequestType::RepeatTokenRequest.write(&mut buf);
    buf.put_slice(token);
    buf.freeze()
}

pub fn encode_user_email(email: &str) -> Bytes {
    let mut buf = BytesMut::new();
    RequestType::UserEmailRequest.write(&mut buf);
    put_str8(&mut buf, email);
    buf.freeze()
}
