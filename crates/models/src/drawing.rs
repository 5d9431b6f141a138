//! The Drawing aggregate and its wire codec.
//!
//! A drawing references catalog components by registry handle only; the
//! registries own the records. Serialization is a pure snapshot of the
//! drawing in a stable byte-exact layout, and deserialization bounds-checks
//! every step, downgrading unresolvable handles to load warnings instead of
//! failing the whole record.

use bytes::{BufMut, BytesMut};
use codec::{put_str8, str8_size, Reader};
use lazy_static::lazy_static;
use regex::Regex;

use crate::registry::Registries;
use crate::{Aperture, Date, Machine, MachineDeck, Material, Product, SideIron};

lazy_static! {
    /// Standard drawing numbers ("A01", "ZB45E") or manual ones ("M104").
    pub static ref DRAWING_NUMBER_RE: Regex =
        Regex::new(r"^([A-Z]{1,2}[0-9]{2}[A-Z]?|M[0-9]{3,}[A-Z]?)$").unwrap();
    /// Machine position: empty, a deck number or range, or "ALL".
    pub static ref POSITION_RE: Regex =
        Regex::new(r"(^$)|(^[0-9]+(-[0-9]+)?$)|(^AL{2}$)").unwrap();
}

/// Warnings raised while reconstructing a drawing whose referenced
/// components could not all be resolved.
pub mod load_warning {
    pub const LOAD_FAILED: u32 = 0x01;
    pub const INVALID_LAPS_DETECTED: u32 = 0x02;
    pub const MISSING_SIDE_IRONS_DETECTED: u32 = 0x04;
    pub const MISSING_MATERIAL_DETECTED: u32 = 0x08;
    pub const INVALID_APERTURE_DETECTED: u32 = 0x10;
    pub const INVALID_IMPACT_PAD_DETECTED: u32 = 0x20;
}

/// Warnings raised while validating a drawing under construction. A drawing
/// with any of these set is refused from insertion to keep the database
/// consistent.
pub mod build_warning {
    pub const INVALID_DRAWING_NUMBER: u32 = 0x0001;
    pub const INVALID_PRODUCT: u32 = 0x0002;
    pub const INVALID_WIDTH: u32 = 0x0004;
    pub const INVALID_LENGTH: u32 = 0x0008;
    pub const INVALID_TOP_MATERIAL: u32 = 0x0010;
    pub const INVALID_BOTTOM_MATERIAL: u32 = 0x0020;
    pub const INVALID_APERTURE: u32 = 0x0040;
    pub const INVALID_BAR_SPACINGS: u32 = 0x0080;
    pub const INVALID_BAR_WIDTHS: u32 = 0x0100;
    pub const INVALID_SIDE_IRONS: u32 = 0x0200;
    pub const INVALID_MACHINE: u32 = 0x0400;
    pub const INVALID_MACHINE_POSITION: u32 = 0x0800;
    pub const INVALID_MACHINE_DECK: u32 = 0x1000;
    pub const INVALID_HYPERLINK: u32 = 0x2000;
}

macro_rules! u8_enum {
    (
        $(#[$outer:meta])*
        $vis:vis enum $Name:ident ($what:literal) { $($Variant:ident = $val:literal),+ $(,)? }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis enum $Name {
            #[default]
            $($Variant = $val),+
        }

        impl $Name {
            pub fn from_u8(value: u8) -> codec::Result<Self> {
                match value {
                    $($val => Ok(Self::$Variant),)+
                    other => Err(codec::Error::InvalidTag {
                        what: $what,
                        value: other as u32,
                    }),
                }
            }
        }
    };
}

u8_enum! {
    /// Which side of the mat an entity sits on. For some fittings "left"
    /// and "right" actually denote the top and bottom edges.
    pub enum Side ("side") { Left = 0, Right = 1 }
}

u8_enum! {
    /// Whether the mat is tensioned along its side or end edges. Determines
    /// which summary slots its laps land in.
    pub enum TensionType ("tension type") { Side = 0, End = 1 }
}

u8_enum! {
    pub enum LapAttachment ("lap attachment") { Integral = 0, Bonded = 1 }
}

u8_enum! {
    /// How a side iron terminates at the feed end.
    pub enum Ending ("side iron ending") { FixedEnd = 0, FloatingEnd = 1 }
}

u8_enum! {
    pub enum HookOrientation ("hook orientation") { HookUp = 0, HookDown = 1 }
}

/// The machine placement recorded against a drawing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MachineTemplate {
    pub machine_handle: u32,
    pub quantity_on_deck: u32,
    pub position: String,
    pub deck_handle: u32,
}

impl MachineTemplate {
    pub fn machine(&self, registries: &Registries) -> Machine {
        registries.machines.get_or_placeholder(self.machine_handle)
    }

    pub fn deck(&self, registries: &Registries) -> MachineDeck {
        registries.machine_decks.get_or_placeholder(self.deck_handle)
    }
}

/// An overlap or sidelap: a strip of material extending beyond the base
/// dimensions on one side of the mat.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lap {
    pub width: f32,
    pub attachment: LapAttachment,
    pub material_handle: u32,
}

impl Lap {
    pub fn material(&self, registries: &Registries) -> Material {
        registries.materials.get_or_placeholder(self.material_handle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coordinate {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImpactPad {
    pub pos: Coordinate,
    pub width: f32,
    pub length: f32,
    pub material_handle: u32,
    pub aperture_handle: u32,
}

impl ImpactPad {
    pub const SERIALIZED_SIZE: usize = 4 * 4 + 4 * 2;

    pub fn material(&self, registries: &Registries) -> Material {
        registries.materials.get_or_placeholder(self.material_handle)
    }

    pub fn aperture(&self, registries: &Registries) -> Aperture {
        registries.apertures.get_or_placeholder(self.aperture_handle)
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        buf.put_f32_le(self.pos.x);
        buf.put_f32_le(self.pos.y);
        buf.put_f32_le(self.width);
        buf.put_f32_le(self.length);
        buf.put_u32_le(self.material_handle);
        buf.put_u32_le(self.aperture_handle);
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            pos: Coordinate {
                x: r.read_f32()?,
                y: r.read_f32()?,
            },
            width: r.read_f32()?,
            length: r.read_f32()?,
            material_handle: r.read_u32()?,
            aperture_handle: r.read_u32()?,
        })
    }
}

/// A single punched centre hole. The shape is the tool cut-out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CentreHole {
    pub pos: Coordinate,
    pub shape_width: f32,
    pub shape_length: f32,
    pub rounded: bool,
}

impl CentreHole {
    pub const SERIALIZED_SIZE: usize = 4 * 4 + 1;

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        buf.put_f32_le(self.pos.x);
        buf.put_f32_le(self.pos.y);
        buf.put_f32_le(self.shape_width);
        buf.put_f32_le(self.shape_length);
        buf.put_u8(self.rounded as u8);
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            pos: Coordinate {
                x: r.read_f32()?,
                y: r.read_f32()?,
            },
            shape_width: r.read_f32()?,
            shape_length: r.read_f32()?,
            rounded: r.read_bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Deflector {
    pub pos: Coordinate,
    pub size: f32,
    pub material_handle: u32,
}

impl Deflector {
    pub const SERIALIZED_SIZE: usize = 4 * 3 + 4;

    pub fn material(&self, registries: &Registries) -> Material {
        registries.materials.get_or_placeholder(self.material_handle)
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        buf.put_f32_le(self.pos.x);
        buf.put_f32_le(self.pos.y);
        buf.put_f32_le(self.size);
        buf.put_u32_le(self.material_handle);
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            pos: Coordinate {
                x: r.read_f32()?,
                y: r.read_f32()?,
            },
            size: r.read_f32()?,
            material_handle: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Divertor {
    pub side: Side,
    pub vertical_position: f32,
    pub width: f32,
    pub length: f32,
    pub material_handle: u32,
}

impl Divertor {
    pub const SERIALIZED_SIZE: usize = 1 + 4 * 3 + 4;

    pub fn material(&self, registries: &Registries) -> Material {
        registries.materials.get_or_placeholder(self.material_handle)
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.side as u8);
        buf.put_f32_le(self.vertical_position);
        buf.put_f32_le(self.width);
        buf.put_f32_le(self.length);
        buf.put_u32_le(self.material_handle);
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            side: Side::from_u8(r.read_u8()?)?,
            vertical_position: r.read_f32()?,
            width: r.read_f32()?,
            length: r.read_f32()?,
            material_handle: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DamBar {
    pub pos: Coordinate,
    pub width: f32,
    pub length: f32,
    pub material_handle: u32,
}

impl DamBar {
    pub const SERIALIZED_SIZE: usize = 4 * 4 + 4;

    pub fn material(&self, registries: &Registries) -> Material {
        registries.materials.get_or_placeholder(self.material_handle)
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        buf.put_f32_le(self.pos.x);
        buf.put_f32_le(self.pos.y);
        buf.put_f32_le(self.width);
        buf.put_f32_le(self.length);
        buf.put_u32_le(self.material_handle);
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            pos: Coordinate {
                x: r.read_f32()?,
                y: r.read_f32()?,
            },
            width: r.read_f32()?,
            length: r.read_f32()?,
            material_handle: r.read_u32()?,
        })
    }
}

/// An unpunched region left in the mat.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlankSpace {
    pub pos: Coordinate,
    pub width: f32,
    pub length: f32,
}

impl BlankSpace {
    pub const SERIALIZED_SIZE: usize = 4 * 4;

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        buf.put_f32_le(self.pos.x);
        buf.put_f32_le(self.pos.y);
        buf.put_f32_le(self.width);
        buf.put_f32_le(self.length);
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            pos: Coordinate {
                x: r.read_f32()?,
                y: r.read_f32()?,
            },
            width: r.read_f32()?,
            length: r.read_f32()?,
        })
    }
}

/// A region punched with an aperture other than the drawing's main one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtraApertureZone {
    pub pos: Coordinate,
    pub width: f32,
    pub length: f32,
    pub aperture_handle: u32,
}

impl ExtraApertureZone {
    pub const SERIALIZED_SIZE: usize = 4 * 4 + 4;

    pub fn aperture(&self, registries: &Registries) -> Aperture {
        registries.apertures.get_or_placeholder(self.aperture_handle)
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        buf.put_f32_le(self.pos.x);
        buf.put_f32_le(self.pos.y);
        buf.put_f32_le(self.width);
        buf.put_f32_le(self.length);
        buf.put_u32_le(self.aperture_handle);
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            pos: Coordinate {
                x: r.read_f32()?,
                y: r.read_f32()?,
            },
            width: r.read_f32()?,
            length: r.read_f32()?,
            aperture_handle: r.read_u32()?,
        })
    }
}

// Flag byte gating the laps and the bottom layer. The three high bits are
// unused.
const FLAG_SIDELAP_L: u8 = 0x01;
const FLAG_SIDELAP_R: u8 = 0x02;
const FLAG_OVERLAP_L: u8 = 0x04;
const FLAG_OVERLAP_R: u8 = 0x08;
const FLAG_HAS_BOTTOM_LAYER: u8 = 0x10;

/// A full drawing record: the structured description of a manufactured mat.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Drawing {
    pub drawing_number: String,
    pub date: Date,
    pub width: f32,
    pub length: f32,
    /// Location of the drawing PDF.
    pub hyperlink: String,
    pub notes: String,
    pub machine_template: MachineTemplate,
    pub product_handle: u32,
    pub aperture_handle: u32,
    pub backing_strip_handle: Option<u32>,
    pub tension_type: TensionType,
    pub rebated: bool,
    pub press_drawing_hyperlinks: Vec<String>,
    /// N+1 entries for N bars; sums to `width`.
    pub bar_spacings: Vec<f32>,
    /// N+2 entries: left margin, N bar widths, right margin.
    pub bar_widths: Vec<f32>,
    pub side_iron_handles: [u32; 2],
    pub side_irons_inverted: [bool; 2],
    pub side_irons_cut_down: [bool; 2],
    pub feed_end: Option<Side>,
    pub endings: [Option<Ending>; 2],
    pub hook_orientations: [Option<HookOrientation>; 2],
    pub strap_handles: [Option<u32>; 2],
    pub sidelaps: [Option<Lap>; 2],
    pub overlaps: [Option<Lap>; 2],
    pub top_material_handle: u32,
    pub bottom_material_handle: Option<u32>,
    pub impact_pads: Vec<ImpactPad>,
    pub dam_bars: Vec<DamBar>,
    pub blank_spaces: Vec<BlankSpace>,
    pub extra_apertures: Vec<ExtraApertureZone>,
    pub centre_holes: Vec<CentreHole>,
    pub deflectors: Vec<Deflector>,
    pub divertors: Vec<Divertor>,
    /// `load_warning` bits set while deserializing.
    pub load_warnings: u32,
}

impl Drawing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number_of_bars(&self) -> usize {
        self.bar_spacings.len().saturating_sub(1)
    }

    pub fn has_backing_strips(&self) -> bool {
        self.backing_strip_handle.is_some()
    }

    pub fn has_load_warning(&self, warning: u32) -> bool {
        self.load_warnings & warning != 0
    }

    pub fn set_load_warning(&mut self, warning: u32) {
        self.load_warnings |= warning;
    }

    pub fn product(&self, registries: &Registries) -> Product {
        registries.products.get_or_placeholder(self.product_handle)
    }

    pub fn aperture(&self, registries: &Registries) -> Aperture {
        registries.apertures.get_or_placeholder(self.aperture_handle)
    }

    pub fn top_material(&self, registries: &Registries) -> Material {
        registries.materials.get_or_placeholder(self.top_material_handle)
    }

    pub fn bottom_material(&self, registries: &Registries) -> Option<Material> {
        self.bottom_material_handle
            .map(|handle| registries.materials.get_or_placeholder(handle))
    }

    pub fn side_iron(&self, side: Side, registries: &Registries) -> SideIron {
        registries
            .side_irons
            .get_or_placeholder(self.side_iron_handles[side as usize])
    }

    pub fn sidelap(&self, side: Side) -> Option<&Lap> {
        self.sidelaps[side as usize].as_ref()
    }

    pub fn overlap(&self, side: Side) -> Option<&Lap> {
        self.overlaps[side as usize].as_ref()
    }

    /// Checks the drawing against the `build_warning` rules, returning the
    /// bitmask of violations. Zero means the drawing is fit for insertion.
    pub fn validate(&self, registries: &Registries) -> u32 {
        use build_warning::*;
        let mut warnings = 0u32;

        if !DRAWING_NUMBER_RE.is_match(&self.drawing_number) {
            warnings |= INVALID_DRAWING_NUMBER;
        }
        if !registries.products.contains_handle(self.product_handle) {
            warnings |= INVALID_PRODUCT;
        }
        if !(self.width > 0.0) {
            warnings |= INVALID_WIDTH;
        }
        if !(self.length > 0.0) {
            warnings |= INVALID_LENGTH;
        }
        if !registries.materials.contains_handle(self.top_material_handle) {
            warnings |= INVALID_TOP_MATERIAL;
        }
        if let Some(handle) = self.bottom_material_handle {
            if !registries.materials.contains_handle(handle) {
                warnings |= INVALID_BOTTOM_MATERIAL;
            }
        }
        if !registries.apertures.contains_handle(self.aperture_handle) {
            warnings |= INVALID_APERTURE;
        }

        let spacing_sum: f32 = self.bar_spacings.iter().sum();
        if self.bar_spacings.is_empty()
            || self.bar_spacings.len() > u8::MAX as usize
            || self.bar_spacings.iter().any(|&s| !(s > 0.0))
            || (spacing_sum - self.width).abs() > 0.01
        {
            warnings |= INVALID_BAR_SPACINGS;
        }
        if self.bar_widths.len() != self.bar_spacings.len() + 1
            || self.bar_widths.iter().any(|&w| !(w > 0.0))
        {
            warnings |= INVALID_BAR_WIDTHS;
        }

        if self
            .side_iron_handles
            .iter()
            .any(|&handle| !registries.side_irons.contains_handle(handle))
        {
            warnings |= INVALID_SIDE_IRONS;
        }
        if !registries
            .machines
            .contains_handle(self.machine_template.machine_handle)
        {
            warnings |= INVALID_MACHINE;
        }
        if !POSITION_RE.is_match(&self.machine_template.position) {
            warnings |= INVALID_MACHINE_POSITION;
        }
        if !registries
            .machine_decks
            .contains_handle(self.machine_template.deck_handle)
        {
            warnings |= INVALID_MACHINE_DECK;
        }
        if self.hyperlink.is_empty() || self.hyperlink.len() > u8::MAX as usize {
            warnings |= INVALID_HYPERLINK;
        }

        warnings
    }

    /// Whether every variable-length list fits its u8 wire count. Checked
    /// before serialization rather than silently truncating.
    pub fn wire_counts_ok(&self) -> bool {
        self.press_drawing_hyperlinks.len() <= u8::MAX as usize
            && self.bar_spacings.len() <= u8::MAX as usize
            && self.bar_widths.len() <= u8::MAX as usize
            && self.impact_pads.len() <= u8::MAX as usize
            && self.dam_bars.len() <= u8::MAX as usize
            && self.blank_spaces.len() <= u8::MAX as usize
            && self.extra_apertures.len() <= u8::MAX as usize
            && self.centre_holes.len() <= u8::MAX as usize
            && self.deflectors.len() <= u8::MAX as usize
            && self.divertors.len() <= u8::MAX as usize
    }

    fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.sidelaps[0].is_some() {
            flags |= FLAG_SIDELAP_L;
        }
        if self.sidelaps[1].is_some() {
            flags |= FLAG_SIDELAP_R;
        }
        if self.overlaps[0].is_some() {
            flags |= FLAG_OVERLAP_L;
        }
        if self.overlaps[1].is_some() {
            flags |= FLAG_OVERLAP_R;
        }
        if self.bottom_material_handle.is_some() {
            flags |= FLAG_HAS_BOTTOM_LAYER;
        }
        flags
    }

    /// Exact byte length `serialize_into` will produce.
    pub fn serialized_size(&self) -> usize {
        let mut size = str8_size(&self.drawing_number);
        size += Date::SERIALIZED_SIZE;
        size += 4 + 4; // width, length
        size += str8_size(&self.hyperlink) + str8_size(&self.notes);
        size += 4 + 4 + str8_size(&self.machine_template.position) + 4;
        size += 4 + 4; // product, aperture
        size += 1 + 4; // backing strip presence + reserved handle bytes
        size += 1 + 1; // tension type, rebated
        size += 1 + self
            .press_drawing_hyperlinks
            .iter()
            .map(|link| str8_size(link))
            .sum::<usize>();
        size += 1 + self.bar_spacings.len() * 4;
        size += 1 + self.bar_widths.len() * 4;
        size += 2 * (4 + 1 + 1); // side irons

        size += 5; // feed end, endings, hook orientations presence bytes
        size += self.feed_end.map_or(0, |_| 1);
        size += self.endings.iter().flatten().count();
        size += self.hook_orientations.iter().flatten().count();
        size += 2; // strap presence bytes
        size += self.strap_handles.iter().flatten().count() * 4;

        size += 1; // flag byte
        let laps = self.sidelaps.iter().chain(self.overlaps.iter());
        size += laps.flatten().count() * (1 + 4 + 4);
        size += 4; // top material
        size += self.bottom_material_handle.map_or(0, |_| 4);

        size += 1 + self.impact_pads.len() * ImpactPad::SERIALIZED_SIZE;
        size += 1 + self.dam_bars.len() * DamBar::SERIALIZED_SIZE;
        size += 1 + self.blank_spaces.len() * BlankSpace::SERIALIZED_SIZE;
        size += 1 + self.extra_apertures.len() * ExtraApertureZone::SERIALIZED_SIZE;
        size += 1 + self.centre_holes.len() * CentreHole::SERIALIZED_SIZE;
        size += 1 + self.deflectors.len() * Deflector::SERIALIZED_SIZE;
        size += 1 + self.divertors.len() * Divertor::SERIALIZED_SIZE;

        size += 4; // load warnings
        size
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        put_str8(buf, &self.drawing_number);
        self.date.serialize_into(buf);
        buf.put_f32_le(self.width);
        buf.put_f32_le(self.length);
        put_str8(buf, &self.hyperlink);
        put_str8(buf, &self.notes);

        buf.put_u32_le(self.machine_template.machine_handle);
        buf.put_u32_le(self.machine_template.quantity_on_deck);
        put_str8(buf, &self.machine_template.position);
        buf.put_u32_le(self.machine_template.deck_handle);

        buf.put_u32_le(self.product_handle);
        buf.put_u32_le(self.aperture_handle);

        // The backing strip handle field is reserved even when absent, so
        // the section is size-stable across both cases.
        buf.put_u8(self.backing_strip_handle.is_some() as u8);
        buf.put_u32_le(self.backing_strip_handle.unwrap_or(0));

        buf.put_u8(self.tension_type as u8);
        buf.put_u8(self.rebated as u8);

        buf.put_u8(self.press_drawing_hyperlinks.len() as u8);
        for link in &self.press_drawing_hyperlinks {
            put_str8(buf, link);
        }

        buf.put_u8(self.bar_spacings.len() as u8);
        for &spacing in &self.bar_spacings {
            buf.put_f32_le(spacing);
        }
        buf.put_u8(self.bar_widths.len() as u8);
        for &width in &self.bar_widths {
            buf.put_f32_le(width);
        }

        for side in 0..2 {
            buf.put_u32_le(self.side_iron_handles[side]);
            buf.put_u8(self.side_irons_inverted[side] as u8);
            buf.put_u8(self.side_irons_cut_down[side] as u8);
        }

        buf.put_u8(self.feed_end.is_some() as u8);
        if let Some(feed_end) = self.feed_end {
            buf.put_u8(feed_end as u8);
        }
        for side in 0..2 {
            buf.put_u8(self.endings[side].is_some() as u8);
            if let Some(ending) = self.endings[side] {
                buf.put_u8(ending as u8);
            }
        }
        for side in 0..2 {
            buf.put_u8(self.hook_orientations[side].is_some() as u8);
            if let Some(orientation) = self.hook_orientations[side] {
                buf.put_u8(orientation as u8);
            }
        }
        for side in 0..2 {
            buf.put_u8(self.strap_handles[side].is_some() as u8);
            if let Some(handle) = self.strap_handles[side] {
                buf.put_u32_le(handle);
            }
        }

        buf.put_u8(self.flags());

        for lap in self.sidelaps.iter().chain(self.overlaps.iter()).flatten() {
            buf.put_u8(lap.attachment as u8);
            buf.put_f32_le(lap.width);
            buf.put_u32_le(lap.material_handle);
        }

        buf.put_u32_le(self.top_material_handle);
        if let Some(handle) = self.bottom_material_handle {
            buf.put_u32_le(handle);
        }

        buf.put_u8(self.impact_pads.len() as u8);
        for pad in &self.impact_pads {
            pad.serialize_into(buf);
        }
        buf.put_u8(self.dam_bars.len() as u8);
        for bar in &self.dam_bars {
            bar.serialize_into(buf);
        }
        buf.put_u8(self.blank_spaces.len() as u8);
        for space in &self.blank_spaces {
            space.serialize_into(buf);
        }
        buf.put_u8(self.extra_apertures.len() as u8);
        for zone in &self.extra_apertures {
            zone.serialize_into(buf);
        }
        buf.put_u8(self.centre_holes.len() as u8);
        for hole in &self.centre_holes {
            hole.serialize_into(buf);
        }
        buf.put_u8(self.deflectors.len() as u8);
        for deflector in &self.deflectors {
            deflector.serialize_into(buf);
        }
        buf.put_u8(self.divertors.len() as u8);
        for divertor in &self.divertors {
            divertor.serialize_into(buf);
        }

        buf.put_u32_le(self.load_warnings);
    }

    /// Reconstructs a drawing, resolving component handles against
    /// `registries`. A dangling handle sets the matching load-warning bit
    /// and the record is still returned; only a truncated buffer fails.
    pub fn deserialize(r: &mut Reader, registries: &Registries) -> codec::Result<Self> {
        use load_warning::*;
        let mut drawing = Drawing::new();

        drawing.drawing_number = r.read_str8()?;
        drawing.date = Date::deserialize(r)?;
        drawing.width = r.read_f32()?;
        drawing.length = r.read_f32()?;
        drawing.hyperlink = r.read_str8()?;
        drawing.notes = r.read_str8()?;

        drawing.machine_template = MachineTemplate {
            machine_handle: r.read_u32()?,
            quantity_on_deck: r.read_u32()?,
            position: r.read_str8()?,
            deck_handle: r.read_u32()?,
        };

        drawing.product_handle = r.read_u32()?;
        drawing.aperture_handle = r.read_u32()?;

        let has_backing_strip = r.read_bool()?;
        let backing_strip_handle = r.read_u32()?;
        drawing.backing_strip_handle = has_backing_strip.then_some(backing_strip_handle);

        drawing.tension_type = TensionType::from_u8(r.read_u8()?)?;
        drawing.rebated = r.read_bool()?;

        let press_drawing_count = r.read_u8()?;
        for _ in 0..press_drawing_count {
            drawing.press_drawing_hyperlinks.push(r.read_str8()?);
        }

        let spacing_count = r.read_u8()?;
        for _ in 0..spacing_count {
            drawing.bar_spacings.push(r.read_f32()?);
        }
        let width_count = r.read_u8()?;
        for _ in 0..width_count {
            drawing.bar_widths.push(r.read_f32()?);
        }

        for side in 0..2 {
            drawing.side_iron_handles[side] = r.read_u32()?;
            drawing.side_irons_inverted[side] = r.read_bool()?;
            drawing.side_irons_cut_down[side] = r.read_bool()?;
        }

        drawing.feed_end = if r.read_bool()? {
            Some(Side::from_u8(r.read_u8()?)?)
        } else {
            None
        };
        for side in 0..2 {
            drawing.endings[side] = if r.read_bool()? {
                Some(Ending::from_u8(r.read_u8()?)?)
            } else {
                None
            };
        }
        for side in 0..2 {
            drawing.hook_orientations[side] = if r.read_bool()? {
                Some(HookOrientation::from_u8(r.read_u8()?)?)
            } else {
                None
            };
        }
        for side in 0..2 {
            drawing.strap_handles[side] = if r.read_bool()? {
                Some(r.read_u32()?)
            } else {
                None
            };
        }

        let flags = r.read_u8()?;
        let read_lap = |r: &mut Reader| -> codec::Result<Lap> {
            Ok(Lap {
                attachment: LapAttachment::from_u8(r.read_u8()?)?,
                width: r.read_f32()?,
                material_handle: r.read_u32()?,
            })
        };
        drawing.sidelaps[0] = (flags & FLAG_SIDELAP_L != 0)
            .then(|| read_lap(r))
            .transpose()?;
        drawing.sidelaps[1] = (flags & FLAG_SIDELAP_R != 0)
            .then(|| read_lap(r))
            .transpose()?;
        drawing.overlaps[0] = (flags & FLAG_OVERLAP_L != 0)
            .then(|| read_lap(r))
            .transpose()?;
        drawing.overlaps[1] = (flags & FLAG_OVERLAP_R != 0)
            .then(|| read_lap(r))
            .transpose()?;

        drawing.top_material_handle = r.read_u32()?;
        drawing.bottom_material_handle = if flags & FLAG_HAS_BOTTOM_LAYER != 0 {
            Some(r.read_u32()?)
        } else {
            None
        };

        let impact_pad_count = r.read_u8()?;
        for _ in 0..impact_pad_count {
            drawing.impact_pads.push(ImpactPad::deserialize(r)?);
        }
        let dam_bar_count = r.read_u8()?;
        for _ in 0..dam_bar_count {
            drawing.dam_bars.push(DamBar::deserialize(r)?);
        }
        let blank_space_count = r.read_u8()?;
        for _ in 0..blank_space_count {
            drawing.blank_spaces.push(BlankSpace::deserialize(r)?);
        }
        let extra_aperture_count = r.read_u8()?;
        for _ in 0..extra_aperture_count {
            drawing.extra_apertures.push(ExtraApertureZone::deserialize(r)?);
        }
        let centre_hole_count = r.read_u8()?;
        for _ in 0..centre_hole_count {
            drawing.centre_holes.push(CentreHole::deserialize(r)?);
        }
        let deflector_count = r.read_u8()?;
        for _ in 0..deflector_count {
            drawing.deflectors.push(Deflector::deserialize(r)?);
        }
        let divertor_count = r.read_u8()?;
        for _ in 0..divertor_count {
            drawing.divertors.push(Divertor::deserialize(r)?);
        }

        drawing.load_warnings = r.read_u32()?;

        // Handle resolution happens after the whole record is read so a
        // missing component never masks a truncation error.
        if !registries.materials.contains_handle(drawing.top_material_handle) {
            drawing.set_load_warning(MISSING_MATERIAL_DETECTED);
        }
        if let Some(handle) = drawing.bottom_material_handle {
            if !registries.materials.contains_handle(handle) {
                drawing.set_load_warning(MISSING_MATERIAL_DETECTED);
            }
        }
        if drawing
            .side_iron_handles
            .iter()
            .any(|&handle| !registries.side_irons.contains_handle(handle))
        {
            drawing.set_load_warning(MISSING_SIDE_IRONS_DETECTED);
        }
        if !registries.apertures.contains_handle(drawing.aperture_handle) {
            drawing.set_load_warning(INVALID_APERTURE_DETECTED);
        }
        if drawing
            .extra_apertures
            .iter()
            .any(|zone| !registries.apertures.contains_handle(zone.aperture_handle))
        {
            drawing.set_load_warning(INVALID_APERTURE_DETECTED);
        }
        let has_invalid_lap = drawing
            .sidelaps
            .iter()
            .chain(drawing.overlaps.iter())
            .flatten()
            .any(|lap| !registries.materials.contains_handle(lap.material_handle));
        if has_invalid_lap {
            drawing.set_load_warning(INVALID_LAPS_DETECTED);
        }
        let has_invalid_impact_pad = drawing.impact_pads.iter().any(|pad| {
            !registries.materials.contains_handle(pad.material_handle)
                || !registries.apertures.contains_handle(pad.aperture_handle)
        });
        if has_invalid_impact_pad {
            drawing.set_load_warning(INVALID_IMPACT_PAD_DETECTED);
        }
        let has_missing_material = drawing
            .dam_bars
            .iter()
            .map(|bar| bar.material_handle)
            .chain(drawing.deflectors.iter().map(|d| d.material_handle))
            .chain(drawing.divertors.iter().map(|d| d.material_handle))
            .any(|handle| !registries.materials.contains_handle(handle));
        if has_missing_material {
            drawing.set_load_warning(MISSING_MATERIAL_DETECTED);
        }

        Ok(drawing)
    }
}
