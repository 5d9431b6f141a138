//! Drawing summaries and their bit-packed wire compression.
//!
//! A search can return tens of thousands of summaries, so the server packs
//! each record down to the minimum number of bits per field. The field
//! widths are not fixed: a schema derives them from per-field maxima over
//! the result set and travels ahead of the records.

use bytes::{BufMut, BytesMut};
use codec::bits::{covering_bits, covering_bytes, read_from_bit_offset, write_at_bit_offset};
use codec::Reader;

use crate::drawing::{Side, TensionType};
use crate::registry::Registries;

/// The search-result projection of a drawing.
///
/// Dimensions and lap sizes are stored as `u32 = millimetres × 2` so that
/// half-millimetre precision survives without floats on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrawingSummary {
    pub mat_id: u32,
    pub drawing_number: String,
    width: u32,
    length: u32,
    pub aperture_handle: u32,
    /// The second handle is zero for single-layer mats.
    pub thickness_handles: [u32; 2],
    lap_sizes: [u32; 4],
    bar_spacings: Vec<u32>,
    extra_apertures: Vec<u32>,
}

impl DrawingSummary {
    pub fn width(&self) -> f32 {
        self.width as f32 / 2.0
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = (width * 2.0) as u32;
    }

    pub fn length(&self) -> f32 {
        self.length as f32 / 2.0
    }

    pub fn set_length(&mut self, length: f32) {
        self.length = (length * 2.0) as u32;
    }

    pub fn has_two_layers(&self) -> bool {
        self.thickness_handles[1] != 0
    }

    /// Index of the last occupied lap slot plus one; trailing empty slots
    /// are not transmitted.
    pub fn number_of_laps(&self) -> usize {
        match self.lap_sizes.iter().rposition(|&size| size != 0) {
            Some(last) => last + 1,
            None => 0,
        }
    }

    /// The summary slot a lap belongs in. Laps whose kind matches the
    /// tension type occupy slots 0/1, the mismatching kind 2/3, with the
    /// right-hand side in the odd slot of each pair.
    pub fn lap_slot(side: Side, overlap: bool, tension_type: TensionType) -> usize {
        let mismatch = match tension_type {
            TensionType::Side => overlap,
            TensionType::End => !overlap,
        };
        (side == Side::Right) as usize + 2 * mismatch as usize
    }

    pub fn lap_size(&self, index: usize) -> f32 {
        self.lap_sizes[index] as f32 / 2.0
    }

    pub fn set_lap_size(&mut self, index: usize, size: f32) {
        self.lap_sizes[index] = (size * 2.0) as u32;
    }

    /// All bar spacings, including the implicit final spacing that brings
    /// the total up to the mat width.
    pub fn bar_spacings(&self) -> Vec<f32> {
        let mut spacings: Vec<f32> = self.bar_spacings.iter().map(|&s| s as f32 / 2.0).collect();
        spacings.push(self.width() - spacings.iter().sum::<f32>());
        spacings
    }

    pub fn add_spacing(&mut self, spacing: f32) {
        self.bar_spacings.push((spacing * 2.0) as u32);
    }

    pub fn clear_spacings(&mut self) {
        self.bar_spacings.clear();
    }

    pub fn bar_spacing_count(&self) -> usize {
        self.bar_spacings.len() + 1
    }

    pub fn extra_apertures(&self) -> &[u32] {
        &self.extra_apertures
    }

    pub fn add_extra_aperture(&mut self, aperture_handle: u32) {
        self.extra_apertures.push(aperture_handle);
    }

    pub fn extra_aperture_count(&self) -> usize {
        self.extra_apertures.len()
    }

    /// Human-readable "laps+W+laps x laps+L+laps x thickness x aperture"
    /// line for the results table.
    pub fn summary_string(&self, registries: &Registries) -> String {
        use std::fmt::Write;
        let mut out = String::new();

        if self.lap_sizes[0] != 0 {
            let _ = write!(out, "{}+", self.lap_size(0));
        }
        let _ = write!(out, "{}", self.width());
        if self.lap_sizes[1] != 0 {
            let _ = write!(out, "+{}", self.lap_size(1));
        }
        let _ = write!(out, " x ");
        if self.lap_sizes[2] != 0 {
            let _ = write!(out, "{}+", self.lap_size(2));
        }
        let _ = write!(out, "{}", self.length());
        if self.lap_sizes[3] != 0 {
            let _ = write!(out, "+{}", self.lap_size(3));
        }

        let _ = write!(
            out,
            " x {}",
            registries.material_thickness(self.thickness_handles[0])
        );
        if self.has_two_layers() {
            let _ = write!(
                out,
                "+{}",
                registries.material_thickness(self.thickness_handles[1])
            );
        }

        let _ = write!(out, " x {}", registries.aperture_name(self.aperture_handle));
        for &extra in &self.extra_apertures {
            let _ = write!(out, " / {}", registries.aperture_name(extra));
        }

        out
    }
}

/// The per-field maxima a compression schema is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemaMaxima {
    pub max_mat_id: u32,
    pub max_width: f32,
    pub max_length: f32,
    pub max_thickness_handle: u32,
    pub max_lap_size: f32,
    pub max_aperture_handle: u32,
    pub max_bar_spacing_count: u8,
    pub max_bar_spacing: f32,
    pub max_drawing_number_length: u8,
    pub max_extra_aperture_count: u8,
}

/// Bit widths for one batch of packed summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryCompressionSchema {
    mat_id_bits: u8,
    width_bits: u8,
    length_bits: u8,
    thickness_handle_bits: u8,
    lap_bits: u8,
    aperture_handle_bits: u8,
    bar_spacing_count_bits: u8,
    bar_spacing_bits: u8,
    extra_aperture_count_bits: u8,
    max_drawing_number_length: u8,
    max_bar_spacing_count: u8,
    max_extra_aperture_count: u8,
}

impl SummaryCompressionSchema {
    /// Serialized size of the schema header itself.
    pub const WIRE_SIZE: usize = 12;

    pub fn from_maxima(maxima: &SchemaMaxima) -> Self {
        Self {
            mat_id_bits: covering_bits(maxima.max_mat_id),
            width_bits: covering_bits((maxima.max_width * 2.0) as u32),
            length_bits: covering_bits((maxima.max_length * 2.0) as u32),
            thickness_handle_bits: covering_bits(maxima.max_thickness_handle),
            lap_bits: covering_bits((maxima.max_lap_size * 2.0) as u32),
            aperture_handle_bits: covering_bits(maxima.max_aperture_handle),
            bar_spacing_count_bits: covering_bits(maxima.max_bar_spacing_count as u32),
            bar_spacing_bits: covering_bits((maxima.max_bar_spacing * 2.0) as u32),
            extra_aperture_count_bits: covering_bits(maxima.max_extra_aperture_count as u32),
            max_drawing_number_length: maxima.max_drawing_number_length,
            max_bar_spacing_count: maxima.max_bar_spacing_count,
            max_extra_aperture_count: maxima.max_extra_aperture_count,
        }
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.mat_id_bits);
        buf.put_u8(self.width_bits);
        buf.put_u8(self.length_bits);
        buf.put_u8(self.thickness_handle_bits);
        buf.put_u8(self.lap_bits);
        buf.put_u8(self.aperture_handle_bits);
        buf.put_u8(self.bar_spacing_count_bits);
        buf.put_u8(self.bar_spacing_bits);
        buf.put_u8(self.extra_aperture_count_bits);
        buf.put_u8(self.max_drawing_number_length);
        buf.put_u8(self.max_bar_spacing_count);
        buf.put_u8(self.max_extra_aperture_count);
    }

    pub fn deserialize(r: &mut Reader) -> codec::Result<Self> {
        Ok(Self {
            mat_id_bits: r.read_u8()?,
            width_bits: r.read_u8()?,
            length_bits: r.read_u8()?,
            thickness_handle_bits: r.read_u8()?,
            lap_bits: r.read_u8()?,
            aperture_handle_bits: r.read_u8()?,
            bar_spacing_count_bits: r.read_u8()?,
            bar_spacing_bits: r.read_u8()?,
            extra_aperture_count_bits: r.read_u8()?,
            max_drawing_number_length: r.read_u8()?,
            max_bar_spacing_count: r.read_u8()?,
            max_extra_aperture_count: r.read_u8()?,
        })
    }

    fn packed_bits(&self, summary: &DrawingSummary) -> usize {
        self.mat_id_bits as usize
            + self.width_bits as usize
            + self.length_bits as usize
            + self.aperture_handle_bits as usize
            + self.thickness_handle_bits as usize
            + 1
            + if summary.has_two_layers() {
                self.thickness_handle_bits as usize
            } else {
                0
            }
            + 3
            + summary.number_of_laps() * self.lap_bits as usize
            + self.bar_spacing_count_bits as usize
            + (summary.bar_spacing_count() - 1) * self.bar_spacing_bits as usize
            + self.extra_aperture_count_bits as usize
            + summary.extra_aperture_count() * self.aperture_handle_bits as usize
    }

    /// Exact byte length of one compressed summary.
    pub fn compressed_size(&self, summary: &DrawingSummary) -> usize {
        1 + summary.drawing_number.len() + covering_bytes(self.packed_bits(summary))
    }

    /// Upper bound for any summary conforming to the schema's maxima.
    pub fn max_compressed_size(&self) -> usize {
        1 + self.max_drawing_number_length as usize
            + covering_bytes(
                self.mat_id_bits as usize
                    + self.width_bits as usize
                    + self.length_bits as usize
                    + self.thickness_handle_bits as usize * 2
                    + 4
                    + self.lap_bits as usize * 4
                    + self.aperture_handle_bits as usize
                    + self.bar_spacing_count_bits as usize
                    + self.max_bar_spacing_count as usize * self.bar_spacing_bits as usize
                    + self.extra_aperture_count_bits as usize
                    + self.max_extra_aperture_count as usize * self.aperture_handle_bits as usize,
            )
    }

    pub fn compress_into(&self, summary: &DrawingSummary, buf: &mut BytesMut) {
        let len = summary.drawing_number.len().min(u8::MAX as usize);
        buf.put_u8(len as u8);
        buf.put_slice(&summary.drawing_number.as_bytes()[..len]);

        let mut packed = vec![0u8; covering_bytes(self.packed_bits(summary))];
        let mut offset = 0usize;

        let put = |value: u32, bits: u8, packed: &mut [u8], offset: &mut usize| {
            let bytes = covering_bytes(bits as usize);
            write_at_bit_offset(&value.to_le_bytes()[..bytes], packed, *offset);
            *offset += bits as usize;
        };

        put(summary.mat_id, self.mat_id_bits, &mut packed, &mut offset);
        put(summary.width, self.width_bits, &mut packed, &mut offset);
        put(summary.length, self.length_bits, &mut packed, &mut offset);
        put(
            summary.aperture_handle,
            self.aperture_handle_bits,
            &mut packed,
            &mut offset,
        );
        put(
            summary.thickness_handles[0],
            self.thickness_handle_bits,
            &mut packed,
            &mut offset,
        );
        put(summary.has_two_layers() as u32, 1, &mut packed, &mut offset);
        if summary.has_two_layers() {
            put(
                summary.thickness_handles[1],
                self.thickness_handle_bits,
                &mut packed,
                &mut offset,
            );
        }

        let laps = summary.number_of_laps();
        put(laps as u32, 3, &mut packed, &mut offset);
        for i in 0..laps {
            put(summary.lap_sizes[i], self.lap_bits, &mut packed, &mut offset);
        }

        put(
            summary.bar_spacings.len() as u32,
            self.bar_spacing_count_bits,
            &mut packed,
            &mut offset,
        );
        for &spacing in &summary.bar_spacings {
            put(spacing, self.bar_spacing_bits, &mut packed, &mut offset);
        }

        put(
            summary.extra_apertures.len() as u32,
            self.extra_aperture_count_bits,
            &mut packed,
            &mut offset,
        );
        for &aperture in &summary.extra_apertures {
            put(aperture, self.aperture_handle_bits, &mut packed, &mut offset);
        }

        buf.put_slice(&packed);
    }

    /// Unpacks one summary, consuming exactly `compressed_size` bytes from
    /// the reader.
    pub fn decompress(&self, r: &mut Reader) -> codec::Result<DrawingSummary> {
        let mut summary = DrawingSummary {
            drawing_number: r.read_str8()?,
            ..Default::default()
        };

        let packed = r.rest();
        let mut offset = 0usize;

        let get = |bits: u8, offset: &mut usize| -> u32 {
            let mut raw = [0u8; 4];
            read_from_bit_offset(packed, *offset, &mut raw, bits as usize);
            *offset += bits as usize;
            u32::from_le_bytes(raw)
        };

        summary.mat_id = get(self.mat_id_bits, &mut offset);
        summary.width = get(self.width_bits, &mut offset);
        summary.length = get(self.length_bits, &mut offset);
        summary.aperture_handle = get(self.aperture_handle_bits, &mut offset);
        summary.thickness_handles[0] = get(self.thickness_handle_bits, &mut offset);
        if get(1, &mut offset) != 0 {
            summary.thickness_handles[1] = get(self.thickness_handle_bits, &mut offset);
        }

        let laps = get(3, &mut offset) as usize;
        for i in 0..laps.min(4) {
            summary.lap_sizes[i] = get(self.lap_bits, &mut offset);
        }

        let spacings = get(self.bar_spacing_count_bits, &mut offset) as usize;
        for _ in 0..spacings {
            let spacing = get(self.bar_spacing_bits, &mut offset);
            summary.bar_spacings.push(spacing);
        }

        let extras = get(self.extra_aperture_count_bits, &mut offset) as usize;
        for _ in 0..extras {
            let aperture = get(self.aperture_handle_bits, &mut offset);
            summary.extra_apertures.push(aperture);
        }

        // All bit reads past the end of the buffer came back as zeros; the
        // final length check rejects the truncated record in one place.
        r.advance(covering_bytes(offset))?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_maxima() -> SchemaMaxima {
        SchemaMaxima {
            max_mat_id: 10_000,
            max_width: 5000.0,
            max_length: 10_000.0,
            max_thickness_handle: 200,
            max_lap_size: 500.0,
            max_aperture_handle: 2000,
            max_bar_spacing_count: 10,
            max_bar_spacing: 500.0,
            max_drawing_number_length: 8,
            max_extra_aperture_count: 4,
        }
    }

    #[test]
    fn schema_header_round_trips() {
        let schema = SummaryCompressionSchema::from_maxima(&test_maxima());
        let mut buf = BytesMut::new();
        schema.serialize_into(&mut buf);
        assert_eq!(buf.len(), SummaryCompressionSchema::WIRE_SIZE);

        let mut r = Reader::new(&buf);
        assert_eq!(SummaryCompressionSchema::deserialize(&mut r).unwrap(), schema);
    }

    #[test]
    fn trailing_zero_lap_slots_are_dropped() {
        let mut summary = DrawingSummary::default();
        assert_eq!(summary.number_of_laps(), 0);
        summary.set_lap_size(1, 50.0);
        assert_eq!(summary.number_of_laps(), 2);
        summary.set_lap_size(3, 25.0);
        assert_eq!(summary.number_of_laps(), 4);
    }

    #[test]
    fn lap_slots_follow_the_tension_type() {
        use crate::drawing::{Side, TensionType};
        // Side-tensioned: sidelaps are the matching kind.
        assert_eq!(DrawingSummary::lap_slot(Side::Left, false, TensionType::Side), 0);
        assert_eq!(DrawingSummary::lap_slot(Side::Right, false, TensionType::Side), 1);
        assert_eq!(DrawingSummary::lap_slot(Side::Left, true, TensionType::Side), 2);
        // End-tensioned: overlaps take the first pair instead.
        assert_eq!(DrawingSummary::lap_slot(Side::Left, true, TensionType::End), 0);
        assert_eq!(DrawingSummary::lap_slot(Side::Right, false, TensionType::End), 3);
    }

    #[test]
    fn implicit_final_bar_spacing() {
        let mut summary = DrawingSummary::default();
        summary.set_width(1000.0);
        summary.add_spacing(250.0);
        summary.add_spacing(250.0);
        assert_eq!(summary.bar_spacing_count(), 3);
        assert_eq!(summary.bar_spacings(), vec![250.0, 250.0, 500.0]);
    }

    #[test]
    fn concrete_summary_round_trips_under_twenty_bytes() {
        let schema = SummaryCompressionSchema::from_maxima(&test_maxima());

        let mut summary = DrawingSummary::default();
        summary.mat_id = 42;
        summary.drawing_number = "A01".into();
        summary.set_width(1000.0);
        summary.set_length(2000.0);
        summary.thickness_handles[0] = 17;
        summary.aperture_handle = 5;
        summary.add_spacing(250.0);
        summary.add_spacing(250.0);

        let mut buf = BytesMut::new();
        schema.compress_into(&summary, &mut buf);
        assert_eq!(buf.len(), schema.compressed_size(&summary));
        assert!(buf.len() < 20, "compressed to {} bytes", buf.len());
        assert!(buf.len() <= schema.max_compressed_size());

        let mut r = Reader::new(&buf);
        let out = schema.decompress(&mut r).unwrap();
        assert_eq!(out, summary);
        assert_eq!(r.remaining(), 0);
    }
}
