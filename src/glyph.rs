//! The glyph lookup seam.
//!
//! Layout never touches font files directly. It asks a [`GlyphSource`] for
//! face metrics and per-glyph metrics, which keeps the line breaker testable
//! with synthetic fonts. [`FontStorage`](crate::FontStorage) is the
//! `fontdb`/`fontdue` backed implementation.

use crate::glyph_id::GlyphId;

/// Opaque reference to a font material (a face plus its atlas).
///
/// The numeric value is a slot handed out by the glyph source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialRef(pub u32);

/// Vertical metrics of a face at a given point size, in pixels.
///
/// `descender` is negative when it lies below the baseline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FaceMetrics {
    pub ascender: f32,
    pub descender: f32,
    pub line_gap: f32,
}

impl FaceMetrics {
    /// Distance from one baseline to the next before any spacing is applied.
    pub fn line_height(&self) -> f32 {
        self.ascender - self.descender + self.line_gap
    }
}

/// Horizontal and bounding-box metrics of one glyph, in pixels.
///
/// `bearing_y` is the distance from the baseline up to the top of the glyph
/// box, so the box spans `[bearing_y - height, bearing_y]` above the baseline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphMetrics {
    pub glyph: GlyphId,
    pub advance: f32,
    pub bearing_x: f32,
    pub bearing_y: f32,
    pub width: f32,
    pub height: f32,
}

/// Everything the glyph source needs to pick a glyph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphRequest {
    pub character: char,
    pub material: MaterialRef,
    pub point_size: f32,
    pub weight: u16,
    pub italic: bool,
}

/// Sprite lookup key taken from a `<sprite>` tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpriteRequest<'a> {
    Index(usize),
    Name(&'a str),
}

/// A resolved sprite from the sprite catalog, scaled to the requested size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteGlyph {
    pub sprite_index: usize,
    pub advance: f32,
    pub bearing_x: f32,
    pub bearing_y: f32,
    pub width: f32,
    pub height: f32,
}

/// Glyph and sprite lookup used by the layout engine.
///
/// Methods take `&mut self` so implementations can load fonts lazily.
pub trait GlyphSource {
    /// Vertical metrics of `material` at `point_size`.
    fn face_metrics(&mut self, material: MaterialRef, point_size: f32) -> Option<FaceMetrics>;

    /// Metrics for a single character, or `None` when the material has no glyph for it.
    fn glyph(&mut self, request: &GlyphRequest) -> Option<GlyphMetrics>;

    /// Kerning adjustment between two glyphs of the same run.
    fn kerning(&mut self, _left: GlyphId, _right: GlyphId) -> f32 {
        0.0
    }

    /// Resolves a `<font="name">` tag.
    fn material_by_name(&mut self, _name: &str) -> Option<MaterialRef> {
        None
    }

    /// Resolves a `<sprite>` tag.
    fn sprite(&mut self, _request: SpriteRequest<'_>, _point_size: f32) -> Option<SpriteGlyph> {
        None
    }
}

impl<S: GlyphSource + ?Sized> GlyphSource for &mut S {
    fn face_metrics(&mut self, material: MaterialRef, point_size: f32) -> Option<FaceMetrics> {
        (**self).face_metrics(material, point_size)
    }

    fn glyph(&mut self, request: &GlyphRequest) -> Option<GlyphMetrics> {
        (**self).glyph(request)
    }

    fn kerning(&mut self, left: GlyphId, right: GlyphId) -> f32 {
        (**self).kerning(left, right)
    }

    fn material_by_name(&mut self, name: &str) -> Option<MaterialRef> {
        (**self).material_by_name(name)
    }

    fn sprite(&mut self, request: SpriteRequest<'_>, point_size: f32) -> Option<SpriteGlyph> {
        (**self).sprite(request, point_size)
    }
}
