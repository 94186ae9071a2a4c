//! Records produced by a layout pass.
//!
//! Every record refers to characters by index into the pass's
//! [`CharacterInfo`] sequence. Text is reconstructed on demand from that
//! sequence, which the caller passes in explicitly.

use euclid::default::Point2D;

use crate::glyph::MaterialRef;
use crate::glyph_id::GlyphId;
use crate::text::extents::Extents;
use crate::text::layout::HorizontalAlign;
use crate::text::style_stack::{Color32, FontStyles, HighlightState, VertexGradient};

/// What a placement record stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Character,
    Sprite,
    /// Line feed, carriage return and other characters without a glyph.
    Control,
}

/// Effective style captured when a character was placed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterStyle {
    pub color: Color32,
    pub underline_color: Color32,
    pub strikethrough_color: Color32,
    pub highlight: Option<HighlightState>,
    pub gradient: Option<VertexGradient>,
    pub font_styles: FontStyles,
    pub font_weight: u16,
    pub point_size: f32,
    pub italic_angle: f32,
    pub baseline_offset: f32,
    pub material: MaterialRef,
}

/// Placement of one character or sprite.
///
/// Positions are in layout space with the Y axis pointing down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterInfo {
    pub character: char,
    /// Index of the character in the source text, counted in `char`s.
    pub source_index: usize,
    pub kind: ElementKind,
    pub glyph: Option<GlyphId>,
    pub style: CharacterStyle,
    /// Pen position before the glyph is drawn.
    pub origin: f32,
    pub x_advance: f32,
    pub ascender: f32,
    pub baseline: f32,
    pub descender: f32,
    pub top_left: Point2D<f32>,
    pub bottom_right: Point2D<f32>,
    pub line_number: usize,
    pub page_number: usize,
    pub is_visible: bool,
}

impl CharacterInfo {
    pub fn extents(&self) -> Extents {
        Extents::new(self.top_left, self.bottom_right)
    }

    pub(crate) fn translate(&mut self, dx: f32, dy: f32) {
        self.origin += dx;
        self.x_advance += dx;
        self.ascender += dy;
        self.baseline += dy;
        self.descender += dy;
        self.top_left.x += dx;
        self.top_left.y += dy;
        self.bottom_right.x += dx;
        self.bottom_right.y += dy;
    }
}

/// One visual line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineInfo {
    pub(crate) control_character_count: usize,

    pub character_count: usize,
    pub visible_character_count: usize,
    pub space_count: usize,
    pub word_count: usize,
    pub first_character_index: usize,
    pub first_visible_character_index: usize,
    pub last_character_index: usize,
    pub last_visible_character_index: usize,

    pub length: f32,
    pub line_height: f32,
    pub ascender: f32,
    pub baseline: f32,
    pub descender: f32,
    pub max_advance: f32,

    pub width: f32,
    pub margin_left: f32,
    pub margin_right: f32,

    pub alignment: HorizontalAlign,
    pub line_extents: Extents,
}

impl Default for LineInfo {
    fn default() -> Self {
        Self {
            control_character_count: 0,
            character_count: 0,
            visible_character_count: 0,
            space_count: 0,
            word_count: 0,
            first_character_index: 0,
            first_visible_character_index: 0,
            last_character_index: 0,
            last_visible_character_index: 0,
            length: 0.0,
            line_height: 0.0,
            ascender: 0.0,
            baseline: 0.0,
            descender: 0.0,
            max_advance: 0.0,
            width: 0.0,
            margin_left: 0.0,
            margin_right: 0.0,
            alignment: HorizontalAlign::Left,
            line_extents: Extents::ZERO,
        }
    }
}

impl LineInfo {
    /// Returns the record to its default state so the slot can be reused.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of line feed style characters on the line.
    pub fn control_character_count(&self) -> usize {
        self.control_character_count
    }

    pub fn contains(&self, character_index: usize) -> bool {
        (self.first_character_index..=self.last_character_index).contains(&character_index)
    }

    /// Reconstructs the full text of the line, control characters included.
    pub fn text(&self, characters: &[CharacterInfo]) -> String {
        collect_text(characters, self.first_character_index, self.last_character_index)
    }
}

/// A run of visible characters between whitespace.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WordInfo {
    pub first_character_index: usize,
    pub last_character_index: usize,
    pub character_count: usize,
    pub extents: Extents,
}

impl WordInfo {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn text(&self, characters: &[CharacterInfo]) -> String {
        collect_text(characters, self.first_character_index, self.last_character_index)
    }
}

/// A `<link>` span.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkInfo {
    pub hash_code: u32,
    /// Position of the identifier in the source text, counted in `char`s.
    pub link_id_first_character_index: usize,
    pub link_id_length: usize,
    /// Position of the displayed text in the character sequence.
    pub link_text_first_character_index: usize,
    pub link_text_length: usize,
    link_id: String,
}

impl LinkInfo {
    pub(crate) fn new(link_id: String, id_first: usize, id_length: usize, text_first: usize) -> Self {
        Self {
            hash_code: identifier_hash(&link_id),
            link_id_first_character_index: id_first,
            link_id_length: id_length,
            link_text_first_character_index: text_first,
            link_text_length: 0,
            link_id,
        }
    }

    pub fn reset(&mut self) {
        self.hash_code = 0;
        self.link_id_first_character_index = 0;
        self.link_id_length = 0;
        self.link_text_first_character_index = 0;
        self.link_text_length = 0;
        self.link_id.clear();
    }

    /// Identifier stored when the link was opened.
    pub fn link_id(&self) -> &str {
        &self.link_id
    }

    pub fn link_text(&self, characters: &[CharacterInfo]) -> String {
        let first = self.link_text_first_character_index;
        characters
            .iter()
            .skip(first)
            .take(self.link_text_length)
            .map(|info| info.character)
            .collect()
    }
}

/// Case-sensitive hash used to look links up by identifier.
pub fn identifier_hash(id: &str) -> u32 {
    fxhash::hash32(id)
}

/// An inline sprite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpriteInfo {
    /// Index of the sprite in the sprite catalog.
    pub sprite_index: usize,
    /// Placement record holding the sprite.
    pub character_index: usize,
    /// First vertex of the sprite quad in the emitted geometry.
    pub vertex_index: usize,
}

/// Number of vertices emitted per character quad.
pub const VERTICES_PER_QUAD: usize = 4;

/// One pagination unit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PageInfo {
    pub first_character_index: usize,
    pub last_character_index: usize,
    pub ascender: f32,
    pub baseline: f32,
    pub descender: f32,
}

impl PageInfo {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn collect_text(characters: &[CharacterInfo], first: usize, last: usize) -> String {
    if characters.is_empty() || first > last {
        return String::new();
    }
    let last = last.min(characters.len() - 1);
    characters
        .get(first..=last)
        .map(|slice| slice.iter().map(|info| info.character).collect())
        .unwrap_or_default()
}
