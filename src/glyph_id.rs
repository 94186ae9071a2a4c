use crate::glyph::MaterialRef;

pub const SUB_PIXEL_QUANTIZE: f32 = 256f32;

/// The same glyph is not guaranteed to receive the same `GlyphId` across program runs.
///
/// Material references are slots handed out by the glyph source, so an id is
/// only meaningful for the source that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphId {
    material: MaterialRef,
    glyph_index: u16,
    font_size: u32, // font size * SUB_PIXEL_QUANTIZE as u32
}

impl GlyphId {
    pub fn new(material: MaterialRef, glyph_index: u16, font_size: f32) -> Self {
        Self {
            material,
            glyph_index,
            font_size: (font_size.max(0.0) * SUB_PIXEL_QUANTIZE).round() as u32,
        }
    }

    pub fn material(&self) -> MaterialRef {
        self.material
    }

    pub fn glyph_index(&self) -> u16 {
        self.glyph_index
    }

    pub fn font_size(&self) -> f32 {
        self.font_size as f32 / SUB_PIXEL_QUANTIZE
    }

    /// Returns true when both glyphs come from the same material at the same
    /// quantized size, which is the only case kerning is applied for.
    pub fn same_run(&self, other: &GlyphId) -> bool {
        self.material == other.material && self.font_size == other.font_size
    }
}
