//! Synthetic fonts for layout tests.

use crate::glyph::{
    FaceMetrics, GlyphMetrics, GlyphRequest, GlyphSource, MaterialRef, SpriteGlyph, SpriteRequest,
};
use crate::glyph_id::GlyphId;

/// Material returned for `<font="mono-alt">`.
pub const ALT_MATERIAL: MaterialRef = MaterialRef(1);

/// Monospace font where every glyph is exactly one point size wide.
///
/// At size 10 each glyph advances 10px, ascends 8px and descends 2px.
/// Characters listed in `missing` have no glyph, and `A` followed by `V`
/// kerns by `-0.2` of the size.
#[derive(Clone, Debug, Default)]
pub struct MonoGlyphs {
    pub missing: Vec<char>,
    pub glyph_requests: usize,
    pub face_requests: usize,
}

impl MonoGlyphs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without(missing: &[char]) -> Self {
        Self {
            missing: missing.to_vec(),
            ..Default::default()
        }
    }
}

impl GlyphSource for MonoGlyphs {
    fn face_metrics(&mut self, _material: MaterialRef, point_size: f32) -> Option<FaceMetrics> {
        self.face_requests += 1;
        Some(FaceMetrics {
            ascender: point_size * 0.8,
            descender: point_size * -0.2,
            line_gap: 0.0,
        })
    }

    fn glyph(&mut self, request: &GlyphRequest) -> Option<GlyphMetrics> {
        self.glyph_requests += 1;
        if self.missing.contains(&request.character) {
            return None;
        }
        let size = request.point_size;
        let ink = !request.character.is_whitespace();
        Some(GlyphMetrics {
            glyph: GlyphId::new(request.material, request.character as u16, size),
            advance: size,
            bearing_x: 0.0,
            bearing_y: if ink { size * 0.8 } else { 0.0 },
            width: if ink { size } else { 0.0 },
            height: if ink { size } else { 0.0 },
        })
    }

    fn kerning(&mut self, left: GlyphId, right: GlyphId) -> f32 {
        if left.glyph_index() == 'A' as u16 && right.glyph_index() == 'V' as u16 {
            -0.2 * left.font_size()
        } else {
            0.0
        }
    }

    fn material_by_name(&mut self, name: &str) -> Option<MaterialRef> {
        (name == "mono-alt").then_some(ALT_MATERIAL)
    }

    fn sprite(&mut self, request: SpriteRequest<'_>, point_size: f32) -> Option<SpriteGlyph> {
        let sprite_index = match request {
            SpriteRequest::Index(index) if index < 4 => index,
            SpriteRequest::Name("smile") => 0,
            SpriteRequest::Name("heart") => 1,
            _ => return None,
        };
        Some(SpriteGlyph {
            sprite_index,
            advance: point_size,
            bearing_x: 0.0,
            bearing_y: point_size,
            width: point_size,
            height: point_size,
        })
    }
}
