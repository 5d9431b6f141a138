//! Catalog component records.
//!
//! Components are sourced from the server in bulk table payloads and
//! referenced everywhere else by registry handle. Each record's wire form is
//! its database ID followed by the type's fixed fields; strings are
//! u8-length-prefixed.

use bytes::{BufMut, BytesMut};
use codec::{put_str8, str8_size, Reader};

/// A record sourced into a per-type registry.
pub trait Component: Clone + Send + Sync + 'static {
    /// Singular name used in logs.
    const NAME: &'static str;

    /// The stable database primary key. Zero only on placeholders.
    fn id(&self) -> u32;

    fn record_size(&self) -> usize;
    fn write_record(&self, buf: &mut BytesMut);
    fn read_record(r: &mut Reader) -> codec::Result<Self>;

    /// Substituted when a referenced handle cannot be resolved.
    fn placeholder() -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SideIronType {
    #[default]
    None = 0,
    A = 1,
    B = 2,
    C = 3,
    D = 4,
    E = 5,
}

impl SideIronType {
    pub fn from_u8(value: u8) -> codec::Result<Self> {
        Ok(match value {
            0 => Self::None,
            1 => Self::A,
            2 => Self::B,
            3 => Self::C,
            4 => Self::D,
            5 => Self::E,
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "side iron type",
                    value: other as u32,
                })
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExtraPriceType {
    #[default]
    SideIronNuts = 0,
    SideIronScrews = 1,
    TackybackGlue = 2,
    Labour = 3,
}

impl ExtraPriceType {
    pub fn from_u8(value: u8) -> codec::Result<Self> {
        Ok(match value {
            0 => Self::SideIronNuts,
            1 => Self::SideIronScrews,
            2 => Self::TackybackGlue,
            3 => Self::Labour,
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "extra price type",
                    value: other as u32,
                })
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Product {
    pub id: u32,
    pub name: String,
}

impl Component for Product {
    const NAME: &'static str = "product";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + str8_size(&self.name)
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        put_str8(buf, &self.name);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            name: r.read_str8()?,
        })
    }

    fn placeholder() -> Self {
        Self {
            id: 0,
            name: "Unknown product".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApertureShape {
    pub id: u32,
    pub shape: String,
}

impl Component for ApertureShape {
    const NAME: &'static str = "aperture shape";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + str8_size(&self.shape)
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        put_str8(buf, &self.shape);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            shape: r.read_str8()?,
        })
    }

    fn placeholder() -> Self {
        Self {
            id: 0,
            shape: "?".into(),
        }
    }
}

/// A punched aperture. `shape_id` references an [`ApertureShape`] by
/// database ID; the display name is derived from dimensions and shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aperture {
    pub id: u32,
    pub width: f32,
    pub length: f32,
    pub base_width: u32,
    pub base_length: u32,
    pub quantity: u32,
    pub shape_id: u32,
}

impl Aperture {
    pub fn display_name(&self, shape: Option<&ApertureShape>) -> String {
        let shape = shape.map(|s| s.shape.as_str()).unwrap_or("?");
        if self.length == 0.0 {
            format!("{}{}", self.width, shape)
        } else {
            format!("{}x{}{}", self.width, self.length, shape)
        }
    }
}

impl Component for Aperture {
    const NAME: &'static str = "aperture";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + 4 * 2 + 4 * 4
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        buf.put_f32_le(self.width);
        buf.put_f32_le(self.length);
        buf.put_u32_le(self.base_width);
        buf.put_u32_le(self.base_length);
        buf.put_u32_le(self.quantity);
        buf.put_u32_le(self.shape_id);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            width: r.read_f32()?,
            length: r.read_f32()?,
            base_width: r.read_u32()?,
            base_length: r.read_u32()?,
            quantity: r.read_u32()?,
            shape_id: r.read_u32()?,
        })
    }

    fn placeholder() -> Self {
        Self::default()
    }
}

/// A material layer. `thickness` is in millimetres, `hardness` in shore.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Material {
    pub id: u32,
    pub name: String,
    pub hardness: u32,
    pub thickness: u32,
}

impl Component for Material {
    const NAME: &'static str = "material";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + str8_size(&self.name) + 4 + 4
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        put_str8(buf, &self.name);
        buf.put_u32_le(self.hardness);
        buf.put_u32_le(self.thickness);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            name: r.read_str8()?,
            hardness: r.read_u32()?,
            thickness: r.read_u32()?,
        })
    }

    fn placeholder() -> Self {
        Self {
            id: 0,
            name: "Unknown material".into(),
            hardness: 0,
            thickness: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SideIron {
    pub id: u32,
    pub side_iron_type: SideIronType,
    pub length: u32,
    pub drawing_number: String,
    pub hyperlink: String,
}

impl Component for SideIron {
    const NAME: &'static str = "side iron";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + 1 + 4 + str8_size(&self.drawing_number) + str8_size(&self.hyperlink)
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        buf.put_u8(self.side_iron_type as u8);
        buf.put_u32_le(self.length);
        put_str8(buf, &self.drawing_number);
        put_str8(buf, &self.hyperlink);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            side_iron_type: SideIronType::from_u8(r.read_u8()?)?,
            length: r.read_u32()?,
            drawing_number: r.read_str8()?,
            hyperlink: r.read_str8()?,
        })
    }

    fn placeholder() -> Self {
        Self {
            id: 0,
            side_iron_type: SideIronType::None,
            length: 0,
            drawing_number: "None".into(),
            hyperlink: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Machine {
    pub id: u32,
    pub manufacturer: String,
    pub model: String,
}

impl Component for Machine {
    const NAME: &'static str = "machine";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + str8_size(&self.manufacturer) + str8_size(&self.model)
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        put_str8(buf, &self.manufacturer);
        put_str8(buf, &self.model);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            manufacturer: r.read_str8()?,
            model: r.read_str8()?,
        })
    }

    fn placeholder() -> Self {
        Self {
            id: 0,
            manufacturer: "None".into(),
            model: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MachineDeck {
    pub id: u32,
    pub deck: String,
}

impl Component for MachineDeck {
    const NAME: &'static str = "machine deck";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + str8_size(&self.deck)
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        put_str8(buf, &self.deck);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            deck: r.read_str8()?,
        })
    }

    fn placeholder() -> Self {
        Self {
            id: 0,
            deck: "None".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BackingStrip {
    pub id: u32,
    pub material_id: u32,
}

impl Component for BackingStrip {
    const NAME: &'static str = "backing strip";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        8
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.material_id);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            material_id: r.read_u32()?,
        })
    }

    fn placeholder() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Strap {
    pub id: u32,
    pub material_id: u32,
}

impl Component for Strap {
    const NAME: &'static str = "strap";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        8
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.material_id);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            material_id: r.read_u32()?,
        })
    }

    fn placeholder() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SideIronPrice {
    pub id: u32,
    pub side_iron_type: SideIronType,
    pub length: f32,
    pub price: f32,
    pub extraflex: bool,
    pub screws: u32,
}

impl Component for SideIronPrice {
    const NAME: &'static str = "side iron price";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + 1 + 4 + 4 + 1 + 4
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        buf.put_u8(self.side_iron_type as u8);
        buf.put_f32_le(self.length);
        buf.put_f32_le(self.price);
        buf.put_u8(self.extraflex as u8);
        buf.put_u32_le(self.screws);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            side_iron_type: SideIronType::from_u8(r.read_u8()?)?,
            length: r.read_f32()?,
            price: r.read_f32()?,
            extraflex: r.read_bool()?,
            screws: r.read_u32()?,
        })
    }

    fn placeholder() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtraPrice {
    pub id: u32,
    pub price_type: ExtraPriceType,
    pub price: f32,
    pub amount: u32,
    pub square_metres: f32,
}

impl Component for ExtraPrice {
    const NAME: &'static str = "extra price";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + 1 + 4 + 4 + 4
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        buf.put_u8(self.price_type as u8);
        buf.put_f32_le(self.price);
        buf.put_u32_le(self.amount);
        buf.put_f32_le(self.square_metres);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            price_type: ExtraPriceType::from_u8(r.read_u8()?)?,
            price: r.read_f32()?,
            amount: r.read_u32()?,
            square_metres: r.read_f32()?,
        })
    }

    fn placeholder() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PowderCoatingPrice {
    pub id: u32,
    pub hook_price: f32,
    pub strap_price: f32,
}

impl Component for PowderCoatingPrice {
    const NAME: &'static str = "powder coating price";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + 4 + 4
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        buf.put_f32_le(self.hook_price);
        buf.put_f32_le(self.strap_price);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            hook_price: r.read_f32()?,
            strap_price: r.read_f32()?,
        })
    }

    fn placeholder() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabourTime {
    pub id: u32,
    pub job: String,
    pub time: u32,
}

impl Component for LabourTime {
    const NAME: &'static str = "labour time";

    fn id(&self) -> u32 {
        self.id
    }

    fn record_size(&self) -> usize {
        4 + str8_size(&self.job) + 4
    }

    fn write_record(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        put_str8(buf, &self.job);
        buf.put_u32_le(self.time);
    }

    fn read_record(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            job: r.read_str8()?,
            time: r.read_u32()?,
        })
    }

    fn placeholder() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Component + PartialEq + std::fmt::Debug>(record: T) {
        let mut buf = BytesMut::new();
        record.write_record(&mut buf);
        assert_eq!(buf.len(), record.record_size());

        let mut r = Reader::new(&buf);
        assert_eq!(T::read_record(&mut r).unwrap(), record);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn record_round_trips() {
        round_trip(Product {
            id: 3,
            name: "Rubber Screen Cloth".into(),
        });
        round_trip(Aperture {
            id: 18,
            width: 22.0,
            length: 40.0,
            base_width: 22,
            base_length: 40,
            quantity: 1,
            shape_id: 2,
        });
        round_trip(Material {
            id: 7,
            name: "Tan Gum".into(),
            hardness: 40,
            thickness: 10,
        });
        round_trip(SideIron {
            id: 4,
            side_iron_type: SideIronType::B,
            length: 1800,
            drawing_number: "SI1042".into(),
            hyperlink: "side_irons/SI1042.pdf".into(),
        });
        round_trip(ExtraPrice {
            id: 2,
            price_type: ExtraPriceType::TackybackGlue,
            price: 14.5,
            amount: 0,
            square_metres: 1.0,
        });
    }

    #[test]
    fn bad_enum_byte_is_a_tag_error() {
        assert!(matches!(
            SideIronType::from_u8(9),
            Err(codec::Error::InvalidTag { .. })
        ));
    }
}
