//! The drawing search query.
//!
//! Every parameter is optional; a 32-bit presence bitmap after the tag
//! flags which fields follow, in a fixed order. Component references travel
//! as database IDs, never handles, because handles are meaningless to the
//! peer.

use bytes::{BufMut, BytesMut};
use codec::{put_str8, str8_size, Reader};
use models::{Date, LapAttachment, SideIronType};

use crate::{Envelope, RequestType};

/// An inclusive search bound pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange<T> {
    pub lower: T,
    pub upper: T,
}

impl ValueRange<u32> {
    pub const SERIALIZED_SIZE: usize = 8;

    fn serialize_into(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.lower);
        buf.put_u32_le(self.upper);
    }

    fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            lower: r.read_u32()?,
            upper: r.read_u32()?,
        })
    }
}

impl ValueRange<Date> {
    pub const SERIALIZED_SIZE: usize = 2 * Date::SERIALIZED_SIZE;

    fn serialize_into(&self, buf: &mut BytesMut) {
        self.lower.serialize_into(buf);
        self.upper.serialize_into(buf);
    }

    fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            lower: Date::deserialize(r)?,
            upper: Date::deserialize(r)?,
        })
    }
}

/// How many of a mat's two lap slots a search requires filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LapSetting {
    #[default]
    None = 0,
    One = 1,
    Both = 2,
}

impl LapSetting {
    fn from_u8(value: u8) -> codec::Result<Self> {
        Ok(match value {
            0 => Self::None,
            1 => Self::One,
            2 => Self::Both,
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "lap setting",
                    value: other as u32,
                })
            }
        })
    }
}

mod flags {
    pub const DRAWING_NUMBER: u32 = 0x00000001;
    pub const WIDTH: u32 = 0x00000002;
    pub const LENGTH: u32 = 0x00000004;
    pub const PRODUCT: u32 = 0x00000008;
    pub const NUMBER_OF_BARS: u32 = 0x00000010;
    pub const APERTURE: u32 = 0x00000020;
    pub const TOP_THICKNESS: u32 = 0x00000040;
    pub const BOTTOM_THICKNESS: u32 = 0x00000080;
    pub const DATE_RANGE: u32 = 0x00000100;
    pub const SIDE_IRON_TYPE: u32 = 0x00000200;
    pub const SIDE_IRON_LENGTH: u32 = 0x00000400;
    pub const SIDELAP_MODE: u32 = 0x00000800;
    pub const OVERLAP_MODE: u32 = 0x00001000;
    pub const SIDELAP_WIDTH: u32 = 0x00002000;
    pub const OVERLAP_WIDTH: u32 = 0x00004000;
    pub const SIDELAP_ATTACHMENT: u32 = 0x00008000;
    pub const OVERLAP_ATTACHMENT: u32 = 0x00010000;
    pub const MACHINE: u32 = 0x00020000;
    pub const MANUFACTURER: u32 = 0x00040000;
    pub const QUANTITY_ON_DECK: u32 = 0x00080000;
    pub const POSITION: u32 = 0x00100000;
    pub const MACHINE_DECK: u32 = 0x00200000;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchQuery {
    pub drawing_number: Option<String>,
    pub width: Option<ValueRange<u32>>,
    pub length: Option<ValueRange<u32>>,
    pub product_id: Option<u32>,
    pub number_of_bars: Option<u8>,
    pub aperture_id: Option<u32>,
    pub top_thickness_id: Option<u32>,
    pub bottom_thickness_id: Option<u32>,
    pub date_range: Option<ValueRange<Date>>,
    pub side_iron_type: Option<SideIronType>,
    pub side_iron_length: Option<u16>,
    pub sidelap_mode: Option<LapSetting>,
    pub overlap_mode: Option<LapSetting>,
    pub sidelap_width: Option<ValueRange<u32>>,
    pub overlap_width: Option<ValueRange<u32>>,
    pub sidelap_attachment: Option<LapAttachment>,
    pub overlap_attachment: Option<LapAttachment>,
    pub machine_id: Option<u32>,
    pub manufacturer: Option<String>,
    pub quantity_on_deck: Option<u8>,
    pub position: Option<String>,
    pub machine_deck_id: Option<u32>,
}

impl SearchQuery {
    /// The presence bitmap flagging which parameters this query carries.
    pub fn parameter_flags(&self) -> u32 {
        use flags::*;
        let mut set = 0u32;
        let mut flag = |present: bool, bit: u32| {
            if present {
                set |= bit;
            }
        };
        flag(self.drawing_number.is_some(), DRAWING_NUMBER);
        flag(self.width.is_some(), WIDTH);
        flag(self.length.is_some(), LENGTH);
        flag(self.product_id.is_some(), PRODUCT);
        flag(self.number_of_bars.is_some(), NUMBER_OF_BARS);
        flag(self.aperture_id.is_some(), APERTURE);
        flag(self.top_thickness_id.is_some(), TOP_THICKNESS);
        flag(self.bottom_thickness_id.is_some(), BOTTOM_THICKNESS);
        flag(self.date_range.is_some(), DATE_RANGE);
        flag(self.side_iron_type.is_some(), SIDE_IRON_TYPE);
        flag(self.side_iron_length.is_some(), SIDE_IRON_LENGTH);
        flag(self.sidelap_mode.is_some(), SIDELAP_MODE);
        flag(self.overlap_mode.is_some(), OVERLAP_MODE);
        flag(self.sidelap_width.is_some(), SIDELAP_WIDTH);
        flag(self.overlap_width.is_some(), OVERLAP_WIDTH);
        flag(self.sidelap_attachment.is_some(), SIDELAP_ATTACHMENT);
        flag(self.overlap_attachment.is_some(), OVERLAP_ATTACHMENT);
        flag(self.machine_id.is_some(), MACHINE);
        flag(self.manufacturer.is_some(), MANUFACTURER);
        flag(self.quantity_on_deck.is_some(), QUANTITY_ON_DECK);
        flag(self.position.is_some(), POSITION);
        flag(self.machine_deck_id.is_some(), MACHINE_DECK);
        set
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        let tag = RequestType::read(r)?;
        debug_assert_eq!(tag, RequestType::DrawingSearchQuery);

        let set = r.read_u32()?;
        let mut query = SearchQuery::default();

        if set & flags::DRAWING_NUMBER != 0 {
            query.drawing_number = Some(r.read_str8()?);
        }
        if set & flags::WIDTH != 0 {
            query.width = Some(ValueRange::<u32>::deserialize(r)?);
        }
        if set & flags::LENGTH != 0 {
            query.length = Some(ValueRange::<u32>::deserialize(r)?);
        }
        if set & flags::PRODUCT != 0 {
            query.product_id = Some(r.read_u32()?);
        }
        if set & flags::NUMBER_OF_BARS != 0 {
            query.number_of_bars = Some(r.read_u8()?);
        }
        if set & flags::APERTURE != 0 {
            query.aperture_id = Some(r.read_u32()?);
        }
        if set & flags::TOP_THICKNESS != 0 {
            query.top_thickness_id = Some(r.read_u32()?);
        }
        if set & flags::BOTTOM_THICKNESS != 0 {
            query.bottom_thickness_id = Some(r.read_u32()?);
        }
        if set & flags::DATE_RANGE != 0 {
            query.date_range = Some(ValueRange::<Date>::deserialize(r)?);
        }
        if set & flags::SIDE_IRON_TYPE != 0 {
            query.side_iron_type = Some(SideIronType::from_u8(r.read_u8()?)?);
        }
        if set & flags::SIDE_IRON_LENGTH != 0 {
            query.side_iron_length = Some(r.read_u16()?);
        }
        if set & flags::SIDELAP_MODE != 0 {
            query.sidelap_mode = Some(LapSetting::from_u8(r.read_u8()?)?);
        }
        if set & flags::OVERLAP_MODE != 0 {
            query.overlap_mode = Some(LapSetting::from_u8(r.read_u8()?)?);
        }
        if set & flags::SIDELAP_WIDTH != 0 {
            query.sidelap_width = Some(ValueRange::<u32>::deserialize(r)?);
        }
        if set & flags::OVERLAP_WIDTH != 0 {
            query.overlap_width = Some(ValueRange::<u32>::deserialize(r)?);
        }
        if set & flags::SIDELAP_ATTACHMENT != 0 {
            query.sidelap_attachment = Some(LapAttachment::from_u8(r.read_u8()?)?);
        }
        if set & flags::OVERLAP_ATTACHMENT != 0 {
            query.overlap_attachment = Some(LapAttachment::from_u8(r.read_u8()?)?);
        }
        if set & flags::MACHINE != 0 {
            query.machine_id = Some(r.read_u32()?);
        }
        if set & flags::MANUFACTURER != 0 {
            query.manufacturer = Some(r.read_str8()?);
        }
        if set & flags::QUANTITY_ON_DECK != 0 {
            query.quantity_on_deck = Some(r.read_u8()?);
        }
        if set & flags::POSITION != 0 {
            query.position = Some(r.read_str8()?);
        }
        if set & flags::MACHINE_DECK != 0 {
            query.machine_deck_id = Some(r.read_u32()?);
        }

        Ok(query)
    }
}

impl Envelope for SearchQuery {
    fn serialized_size(&self) -> usize {
        let mut size = RequestType::WIRE_SIZE + 4;
        if let Some(number) = &self.drawing_number {
            size += str8_size(number);
        }
        size += self.width.map_or(0, |_| ValueRange::<u32>::SERIALIZED_SIZE);
        size += self.length.map_or(0, |_| ValueRange::<u32>::SERIALIZED_SIZE);
        size += self.product_id.map_or(0, |_| 4);
        size += self.number_of_bars.map_or(0, |_| 1);
        size += self.aperture_id.map_or(0, |_| 4);
        size += self.top_thickness_id.map_or(0, |_| 4);
        size += self.bottom_thickness_id.map_or(0, |_| 4);
        size += self
            .date_range
            .map_or(0, |_| ValueRange::<Date>::SERIALIZED_SIZE);
        size += self.side_iron_type.map_or(0, |_| 1);
        size += self.side_iron_length.map_or(0, |_| 2);
        size += self.sidelap_mode.map_or(0, |_| 1);
        size += self.overlap_mode.map_or(0, |_| 1);
        size += self
            .sidelap_width
            .map_or(0, |_| ValueRange::<u32>::SERIALIZED_SIZE);
        size += self
            .overlap_width
            .map_or(0, |_| ValueRange::<u32>::SERIALIZED_SIZE);
        size += self.sidelap_attachment.map_or(0, |_| 1);
        size += self.overlap_attachment.map_or(0, |_| 1);
        size += self.machine_id.map_or(0, |_| 4);
        if let Some(manufacturer) = &self.manufacturer {
            size += str8_size(manufacturer);
        }
        size += self.quantity_on_deck.map_or(0, |_| 1);
        if let Some(position) = &self.position {
            size += str8_size(position);
        }
        size += self.machine_deck_id.map_or(0, |_| 4);
        size
    }

    fn serialize_into(&self, buf: &mut BytesMut) {
        RequestType::DrawingSearchQuery.write(buf);
        buf.put_u32_le(self.parameter_flags());

        if let Some(number) = &self.drawing_number {
            put_str8(buf, number);
        }
        if let Some(width) = &self.width {
            width.serialize_into(buf);
        }
        if let Some(length) = &self.length {
            length.serialize_into(buf);
        }
        if let Some(product) = self.product_id {
            buf.put_u32_le(product);
        }
        if let Some(bars) = self.number_of_bars {
            buf.put_u8(bars);
        }
        if let Some(aperture) = self.aperture_id {
            buf.put_u32_le(aperture);
        }
        if let Some(thickness) = self.top_thickness_id {
            buf.put_u32_le(thickness);
        }
        if let Some(thickness) = self.bottom_thickness_id {
            buf.put_u32_le(thickness);
        }
        if let Some(dates) = &self.date_range {
            dates.serialize_into(buf);
        }
        if let Some(side_iron_type) = self.side_iron_type {
            buf.put_u8(side_iron_type as u8);
        }
        if let Some(side_iron_length) = self.side_iron_length {
            buf.put_u16_le(side_iron_length);
        }
        if let Some(mode) = self.sidelap_mode {
            buf.put_u8(mode as u8);
        }
        if let Some(mode) = self.overlap_mode {
            buf.put_u8(mode as u8);
        }
        if let Some(width) = &self.sidelap_width {
            width.serialize_into(buf);
        }
        if let Some(width) = &self.overlap_width {
            width.serialize_into(buf);
        }
        if let Some(attachment) = self.sidelap_attachment {
            buf.put_u8(attachment as u8);
        }
        if let Some(attachment) = self.overlap_attachment {
            buf.put_u8(attachment as u8);
        }
        if let Some(machine) = self.machine_id {
            buf.put_u32_le(machine);
        }
        if let Some(manufacturer) = &self.manufacturer {
            put_str8(buf, manufacturer);
        }
        if let Some(quantity) = self.quantity_on_deck {
            buf.put_u8(quantity);
        }
        if let Some(position) = &self.position {
            put_str8(buf, position);
        }
        if let Some(deck) = self.machine_deck_id {
            buf.put_u32_le(deck);
        }
    }
}
