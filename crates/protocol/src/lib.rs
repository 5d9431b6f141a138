//! The request/response envelope codec.
//!
//! Every buffer on the secure channel leads with a [`RequestType`] tag;
//! the body layout is fixed per tag. Envelopes serialize themselves into a
//! caller-provided buffer and know their exact size up front, so the
//! transport never reallocates mid-message.

use bytes::{Bytes, BytesMut};

mod request;
pub use request::RequestType;

mod search;
pub use search::{LapSetting, SearchQuery, ValueRange};

mod drawing;
pub use drawing::{DrawingInsert, DrawingRequest, InsertResponse};

mod component;
pub use component::{
    ApertureData, BackingStripData, ComponentInsert, ComponentInsertData, ComponentInsertResponse,
    ExtraPriceData, LabourTimeData, MachineData, MaterialData, MaterialPriceData,
    MaterialPricingType, PowderCoatingPriceData, PriceMode, SideIronData, SideIronPriceData,
    SpecificSideIronPriceData, StrapData,
};

mod admin;
pub use admin::{BackupResponse, DatabaseBackup, DrawingType, NextDrawing};

mod response;
pub use response::{
    decode_response, encode_component_table, encode_search_results, encode_user_email,
    encode_user_token, DecodeError, Response, REPEAT_TOKEN_LEN,
};

/// A request or response body, headed by its [`RequestType`] tag.
pub trait Envelope {
    /// Exact number of bytes `serialize_into` appends.
    fn serialized_size(&self) -> usize;

    fn serialize_into(&self, buf: &mut BytesMut);

    /// Allocates a buffer of exactly the right size and packs into it.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.serialized_size());
        self.serialize_into(&mut buf);
        debug_assert_eq!(buf.len(), self.serialized_size());
        buf.freeze()
    }
}
