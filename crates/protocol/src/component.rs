//! Component insert envelopes: adding catalog records from the client.
//!
//! The body is a tagged union over the insert kind; price kinds carry a
//! [`PriceMode`] distinguishing add, update and remove. After a successful
//! insert the client re-sources the matching component table.

use bytes::{BufMut, BytesMut};
use codec::{put_str8, str8_size, Reader};
use models::{ExtraPriceType, SideIronType};

use crate::{Envelope, RequestType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentInsertResponse {
    #[default]
    None = 0,
    Success = 1,
    Failed = 2,
}

impl ComponentInsertResponse {
    pub fn from_u8(value: u8) -> codec::Result<Self> {
        Ok(match value {
            0 => Self::None,
            1 => Self::Success,
            2 => Self::Failed,
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "component insert response",
                    value: other as u32,
                })
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceMode {
    #[default]
    Add = 0,
    Update = 1,
    Remove = 2,
}

impl PriceMode {
    pub fn from_u8(value: u8) -> codec::Result<Self> {
        Ok(match value {
            0 => Self::Add,
            1 => Self::Update,
            2 => Self::Remove,
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "price mode",
                    value: other as u32,
                })
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialPricingType {
    #[default]
    RunningMetre = 0,
    SquareMetre = 1,
    Sheet = 2,
}

impl MaterialPricingType {
    pub fn from_u8(value: u8) -> codec::Result<Self> {
        Ok(match value {
            0 => Self::RunningMetre,
            1 => Self::SquareMetre,
            2 => Self::Sheet,
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "material pricing type",
                    value: other as u32,
                })
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApertureData {
    pub width: f32,
    pub length: f32,
    pub base_width: u32,
    pub base_length: u32,
    pub quantity: u32,
    pub shape_id: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MachineData {
    pub manufacturer: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SideIronData {
    pub side_iron_type: SideIronType,
    pub length: u32,
    pub drawing_number: String,
    pub hyperlink: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SideIronPriceData {
    pub side_iron_type: SideIronType,
    pub extraflex: bool,
    pub length: f32,
    pub price: f32,
    pub price_mode: PriceMode,
    pub screws: u32,
    pub side_iron_price_id: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialData {
    pub name: String,
    pub hardness: u32,
    pub thickness: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialPriceData {
    pub material_id: u32,
    pub length: f32,
    pub width: f32,
    pub price: f32,
    pub pricing_type: MaterialPricingType,
    pub price_mode: PriceMode,
    pub old_width: f32,
    pub old_length: f32,
}

/// The conditional tail depends on the price type: an amount for nuts and
/// screws, an area for glue, nothing for labour.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtraPriceData {
    pub price_id: u32,
    pub price_type: ExtraPriceType,
    pub price: f32,
    pub amount: u32,
    pub square_metres: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabourTimeData {
    pub job: String,
    pub time: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PowderCoatingPriceData {
    pub hook_price: f32,
    pub strap_price: f32,
    pub price_mode: PriceMode,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecificSideIronPriceData {
    pub side_iron_id: u32,
    pub price: f32,
    pub price_mode: PriceMode,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BackingStripData {
    pub material_id: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrapData {
    pub material_id: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ComponentInsertData {
    #[default]
    None,
    Aperture(ApertureData),
    Machine(MachineData),
    SideIron(SideIronData),
    SideIronPrice(SideIronPriceData),
    Material(MaterialData),
    MaterialPrice(MaterialPriceData),
    ExtraPrice(ExtraPriceData),
    LabourTime(LabourTimeData),
    PowderCoatingPrice(PowderCoatingPriceData),
    SpecificSideIronPrice(SpecificSideIronPriceData),
    BackingStrip(BackingStripData),
    Strap(StrapData),
}

impl ComponentInsertData {
    fn kind(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Aperture(_) => 1,
            Self::Machine(_) => 2,
            Self::SideIron(_) => 3,
            Self::SideIronPrice(_) => 4,
            Self::Material(_) => 5,
            Self::MaterialPrice(_) => 6,
            Self::ExtraPrice(_) => 7,
            Self::LabourTime(_) => 8,
            Self::PowderCoatingPrice(_) => 9,
            Self::SpecificSideIronPrice(_) => 10,
            Self::BackingStrip(_) => 11,
            Self::Strap(_) => 12,
        }
    }

    /// The table the client should re-source after this insert succeeds.
    pub fn source_table(&self) -> Option<RequestType> {
        Some(match self {
            Self::None => return None,
            Self::Aperture(_) => RequestType::SourceApertureTable,
            Self::Machine(_) => RequestType::SourceMachineTable,
            Self::SideIron(_) => RequestType::SourceSideIronTable,
            Self::SideIronPrice(_) | Self::SpecificSideIronPrice(_) => {
                RequestType::SourceSideIronPricesTable
            }
            Self::Material(_) | Self::MaterialPrice(_) => RequestType::SourceMaterialTable,
            Self::ExtraPrice(_) => RequestType::SourceExtraPricesTable,
            Self::LabourTime(_) => RequestType::SourceLabourTimesTable,
            Self::PowderCoatingPrice(_) => RequestType::SourcePowderCoatingPricesTable,
            Self::BackingStrip(_) => RequestType::SourceBackingStripTable,
            Self::Strap(_) => RequestType::SourceStrapTable,
        })
    }

    fn body_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Aperture(_) => 4 * 2 + 4 * 4,
            Self::Machine(data) => str8_size(&data.manufacturer) + str8_size(&data.model),
            Self::SideIron(data) => {
                1 + 4 + str8_size(&data.drawing_number) + str8_size(&data.hyperlink)
            }
            Self::SideIronPrice(_) => 1 + 1 + 4 + 4 + 1 + 4 + 4,
            Self::Material(data) => str8_size(&data.name) + 4 + 4,
            Self::MaterialPrice(_) => 4 + 4 * 3 + 1 + 1 + 4 * 2,
            Self::ExtraPrice(data) => {
                4 + 1
                    + 4
                    + match data.price_type {
                        ExtraPriceType::SideIronNuts | ExtraPriceType::SideIronScrews => 4,
                        ExtraPriceType::TackybackGlue => 4,
                        ExtraPriceType::Labour => 0,
                    }
            }
            Self::LabourTime(data) => str8_size(&data.job) + 4,
            Self::PowderCoatingPrice(_) => 4 + 4 + 1,
            Self::SpecificSideIronPrice(_) => 4 + 4 + 1,
            Self::BackingStrip(_) => 4,
            Self::Strap(_) => 4,
        }
    }

    fn write_body(&self, buf: &mut BytesMut) {
        match self {
            Self::None => {}
            Self::Aperture(data) => {
                buf.put_f32_le(data.width);
                buf.put_f32_le(data.length);
                buf.put_u32_le(data.base_width);
                buf.put_u32_le(data.base_length);
                buf.put_u32_le(data.quantity);
                buf.put_u32_le(data.shape_id);
            }
            Self::Machine(data) => {
                put_str8(buf, &data.manufacturer);
                put_str8(buf, &data.model);
            }
            Self::SideIron(data) => {
                buf.put_u8(data.side_iron_type as u8);
                buf.put_u32_le(data.length);
                put_str8(buf, &data.drawing_number);
                put_str8(buf, &data.hyperlink);
            }
            Self::SideIronPrice(data) => {
                buf.put_u8(data.side_iron_type as u8);
                buf.put_u8(data.extraflex as u8);
                buf.put_f32_le(data.length);
                buf.put_f32_le(data.price);
                buf.put_u8(data.price_mode as u8);
                buf.put_u32_le(data.screws);
                buf.put_u32_le(data.side_iron_price_id);
            }
            Self::Material(data) => {
                put_str8(buf, &data.name);
                buf.put_u32_le(data.hardness);
                buf.put_u32_le(data.thickness);
            }
            Self::MaterialPrice(data) => {
                buf.put_u32_le(data.material_id);
                buf.put_f32_le(data.length);
                buf.put_f32_le(data.width);
                buf.put_f32_le(data.price);
                buf.put_u8(data.pricing_type as u8);
                buf.put_u8(data.price_mode as u8);
                buf.put_f32_le(data.old_width);
                buf.put_f32_le(data.old_length);
            }
            Self::ExtraPrice(data) => {
                buf.put_u32_le(data.price_id);
                buf.put_u8(data.price_type as u8);
                buf.put_f32_le(data.price);
                match data.price_type {
                    ExtraPriceType::SideIronNuts | ExtraPriceType::SideIronScrews => {
                        buf.put_u32_le(data.amount);
                    }
                    ExtraPriceType::TackybackGlue => {
                        buf.put_f32_le(data.square_metres);
                    }
                    ExtraPriceType::Labour => {}
                }
            }
            Self::LabourTime(data) => {
                put_str8(buf, &data.job);
                buf.put_u32_le(data.time);
            }
            Self::PowderCoatingPrice(data) => {
                buf.put_f32_le(data.hook_price);
                buf.put_f32_le(data.strap_price);
                buf.put_u8(data.price_mode as u8);
            }
            Self::SpecificSideIronPrice(data) => {
                buf.put_u32_le(data.side_iron_id);
                buf.put_f32_le(data.price);
                buf.put_u8(data.price_mode as u8);
            }
            Self::BackingStrip(data) => {
                buf.put_u32_le(data.material_id);
            }
            Self::Strap(data) => {
                buf.put_u32_le(data.material_id);
            }
        }
    }

    fn read_body(kind: u8, r: &mut Reader) -> codec::Result<Self> {
        Ok(match kind {
            0 => Self::None,
            1 => Self::Aperture(ApertureData {
                width: r.read_f32()?,
                length: r.read_f32()?,
                base_width: r.read_u32()?,
                base_length: r.read_u32()?,
                quantity: r.read_u32()?,
                shape_id: r.read_u32()?,
            }),
            2 => Self::Machine(MachineData {
                manufacturer: r.read_str8()?,
                model: r.read_str8()?,
            }),
            3 => Self::SideIron(SideIronData {
                side_iron_type: SideIronType::from_u8(r.read_u8()?)?,
                length: r.read_u32()?,
                drawing_number: r.read_str8()?,
                hyperlink: r.read_str8()?,
            }),
            4 => Self::SideIronPrice(SideIronPriceData {
                side_iron_type: SideIronType::from_u8(r.read_u8()?)?,
                extraflex: r.read_bool()?,
                length: r.read_f32()?,
                price: r.read_f32()?,
                price_mode: PriceMode::from_u8(r.read_u8()?)?,
                screws: r.read_u32()?,
                side_iron_price_id: r.read_u32()?,
            }),
            5 => Self::Material(MaterialData {
                name: r.read_str8()?,
                hardness: r.read_u32()?,
                thickness: r.read_u32()?,
            }),
            6 => Self::MaterialPrice(MaterialPriceData {
                material_id: r.read_u32()?,
                length: r.read_f32()?,
                width: r.read_f32()?,
                price: r.read_f32()?,
                pricing_type: MaterialPricingType::from_u8(r.read_u8()?)?,
                price_mode: PriceMode::from_u8(r.read_u8()?)?,
                old_width: r.read_f32()?,
                old_length: r.read_f32()?,
            }),
            7 => {
                let price_id = r.read_u32()?;
                let price_type = ExtraPriceType::from_u8(r.read_u8()?)?;
                let price = r.read_f32()?;
                let mut data = ExtraPriceData {
                    price_id,
                    price_type,
                    price,
                    ..Default::default()
                };
                match price_type {
                    ExtraPriceType::SideIronNuts | ExtraPriceType::SideIronScrews => {
                        data.amount = r.read_u32()?;
                    }
                    ExtraPriceType::TackybackGlue => {
                        data.square_metres = r.read_f32()?;
                    }
                    ExtraPriceType::Labour => {}
                }
                Self::ExtraPrice(data)
            }
            8 => Self::LabourTime(LabourTimeData {
                job: r.read_str8()?,
                time: r.read_u32()?,
            }),
            9 => Self::PowderCoatingPrice(PowderCoatingPriceData {
                hook_price: r.read_f32()?,
                strap_price: r.read_f32()?,
                price_mode: PriceMode::from_u8(r.read_u8()?)?,
            }),
            10 => Self::SpecificSideIronPrice(SpecificSideIronPriceData {
                side_iron_id: r.read_u32()?,
                price: r.read_f32()?,
                price_mode: PriceMode::from_u8(r.read_u8()?)?,
            }),
            11 => Self::BackingStrip(BackingStripData {
                material_id: r.read_u32()?,
            }),
            12 => Self::Strap(StrapData {
                material_id: r.read_u32()?,
            }),
            other => {
                return Err(codec::Error::InvalidTag {
                    what: "component insert type",
                    value: other as u32,
                })
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentInsert {
    pub response: ComponentInsertResponse,
    pub data: ComponentInsertData,
}

impl ComponentInsert {
    pub fn new(data: ComponentInsertData) -> Self {
        Self {
            response: ComponentInsertResponse::None,
            data,
        }
    }

    pub fn source_table(&self) -> Option<RequestType> {
        self.data.source_table()
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        let tag = RequestType::read(r)?;
        debug_assert_eq!(tag, RequestType::AddNewComponent);

        let kind = r.read_u8()?;
        let response = ComponentInsertResponse::from_u8(r.read_u8()?)?;
        let data = ComponentInsertData::read_body(kind, r)?;
        Ok(Self { response, data })
    }
}

impl Envelope for ComponentInsert {
    fn serialized_size(&self) -> usize {
        RequestType::WIRE_SIZE + 1 + 1 + self.data.body_size()
    }

    fn serialize_into(&self, buf: &mut BytesMut) {
        RequestType::AddNewComponent.write(buf);
        buf.put_u8(self.data.kind());
        buf.put_u8(self.response as u8);
        self.data.write_body(buf);
    }
}
