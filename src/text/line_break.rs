//! First layout stage: one pass over the source that interprets tags, places
//! characters and decides where lines end.
//!
//! Characters are placed relative to the start of their line and to the line
//! baseline. When a line is finished its characters are shifted down to the
//! line's final baseline; horizontal alignment happens later in
//! [`layout`](crate::text::layout).
//!
//! Wrapping is done by backtracking. After every break opportunity the whole
//! mutable state is captured in a [`WordWrapState`]. When a later character
//! does not fit, the state is restored, the line is closed at the break and
//! processing resumes after it. Output vectors are append-only between two
//! snapshots, so restoring only needs to truncate them to the recorded
//! lengths.

use euclid::default::Point2D;
use fxhash::FxHashMap;

use crate::error::{LayoutWarning, MarkupError, StyleStackError, unclosed_warning};
use crate::glyph::{FaceMetrics, GlyphRequest, GlyphSource, MaterialRef, SpriteGlyph, SpriteRequest};
use crate::glyph_id::GlyphId;
use crate::pool::LayoutBuffers;
use crate::text::extents::Extents;
use crate::text::info::{
    CharacterInfo, CharacterStyle, ElementKind, LineInfo, LinkInfo, PageInfo, SpriteInfo,
    VERTICES_PER_QUAD, WordInfo,
};
use crate::text::layout::{OverflowMode, TagStrictness, TextLayoutConfig, WrapStyle};
use crate::text::markup::{ParsedTag, SpriteRef, TagAction, TagContext, noparse_close_at, parse_tag};
use crate::text::style_stack::{
    DEFAULT_ITALIC_ANGLE, FontStyle, FontStyles, StyleDimension, StyleStacks, StyleValue,
};

/// Size factor applied per level of `<sup>`/`<sub>` nesting.
const SCRIPT_SCALE: f32 = 0.5;
/// Baseline raise of `<sup>`, relative to the enclosing size.
const SUPERSCRIPT_SHIFT: f32 = 0.35;
/// Baseline drop of `<sub>`, relative to the enclosing size.
const SUBSCRIPT_SHIFT: f32 = 0.15;
const SMALL_CAPS_SCALE: f32 = 0.8;
const BOLD_WEIGHT: u16 = 700;
/// Fallback advance of a whitespace character the font has no glyph for.
const SPACE_FALLBACK_EM: f32 = 0.25;
const FIT_EPSILON: f32 = 0.001;
const SPRITE_CHARACTER: char = '\u{FFFC}';

/// Why a line ended. Drives justification and paragraph spacing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LineEnd {
    Wrap,
    Mandatory,
    EndOfText,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Clip {
    None,
    /// Until the next break opportunity.
    Word,
    /// Until the end of the line.
    Line,
}

/// Output vector lengths at the time a snapshot was taken.
#[derive(Clone, Copy, Debug, Default)]
struct OutputLengths {
    characters: usize,
    words: usize,
    links: usize,
    sprites: usize,
    diagnostics: usize,
}

/// Complete mutable state of the line breaker between two characters.
#[derive(Clone, Debug)]
struct WordWrapState {
    source_index: usize,
    output: OutputLengths,

    line: LineInfo,
    x_advance: f32,
    max_ascender: f32,
    min_descender: f32,
    max_line_gap: f32,

    stacks: StyleStacks,
    character_spacing: f32,
    mono_spacing: Option<f32>,
    line_height: Option<f32>,
    margin_left: f32,
    margin_right: f32,
    no_parse: bool,
    no_break: bool,

    word_start: Option<usize>,
    word_last: usize,
    word_extents: Extents,
    open_link: Option<LinkInfo>,
    previous_glyph: Option<GlyphId>,
    clip: Clip,
    overflow_reported: bool,
}

impl WordWrapState {
    fn new(config: &TextLayoutConfig) -> Self {
        Self {
            source_index: 0,
            output: OutputLengths::default(),
            line: LineInfo::default(),
            x_advance: 0.0,
            max_ascender: 0.0,
            min_descender: 0.0,
            max_line_gap: 0.0,
            stacks: StyleStacks::new(config),
            character_spacing: 0.0,
            mono_spacing: None,
            line_height: None,
            margin_left: config.margin_left,
            margin_right: config.margin_right,
            no_parse: false,
            no_break: false,
            word_start: None,
            word_last: 0,
            word_extents: Extents::UNINITIALIZED,
            open_link: None,
            previous_glyph: None,
            clip: Clip::None,
            overflow_reported: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Ink {
    bearing_x: f32,
    bearing_y: f32,
    width: f32,
    height: f32,
}

/// A resolved element waiting to be placed on the current line.
#[derive(Clone, Copy, Debug)]
struct Placement {
    character: char,
    source_index: usize,
    kind: ElementKind,
    glyph: Option<GlyphId>,
    style: CharacterStyle,
    face: FaceMetrics,
    advance: f32,
    kerning: f32,
    /// Shift of the ink inside the advance, used by monospacing.
    x_offset: f32,
    ink: Option<Ink>,
    visible: bool,
}

impl Placement {
    fn is_space(&self) -> bool {
        self.kind == ElementKind::Character && self.character.is_whitespace()
    }
}

enum OverflowAction {
    /// State was rewound; the main loop continues from `state.source_index`.
    Restart,
    Place,
    Clip,
    Replace(Placement),
}

pub(crate) struct BrokenText {
    pub buffers: LayoutBuffers,
    pub line_ends: Vec<LineEnd>,
    pub page_heights: Vec<f32>,
    pub total_width: f32,
    pub total_height: f32,
}

pub(crate) struct LineBreaker<'a, S: GlyphSource> {
    config: &'a TextLayoutConfig,
    glyphs: S,
    source: &'a [char],
    out: LayoutBuffers,
    state: WordWrapState,
    last_break: Option<WordWrapState>,
    faces: FxHashMap<(MaterialRef, u32), FaceMetrics>,

    line_number: usize,
    page_number: usize,
    cursor_y: f32,
    line_ends: Vec<LineEnd>,
    page_start_line: usize,
    page_height: f32,
    page_heights: Vec<f32>,
    total_width: f32,
}

impl<'a, S: GlyphSource> LineBreaker<'a, S> {
    pub fn new(
        config: &'a TextLayoutConfig,
        glyphs: S,
        source: &'a [char],
        buffers: LayoutBuffers,
    ) -> Self {
        Self {
            config,
            glyphs,
            source,
            out: buffers,
            state: WordWrapState::new(config),
            last_break: None,
            faces: FxHashMap::default(),
            line_number: 0,
            page_number: 0,
            cursor_y: 0.0,
            line_ends: Vec::new(),
            page_start_line: 0,
            page_height: 0.0,
            page_heights: Vec::new(),
            total_width: 0.0,
        }
    }

    pub fn run(mut self) -> BrokenText {
        while self.step() {}
        self.finish()
    }

    /// Consumes one tag or character. Returns false at the end of the source.
    fn step(&mut self) -> bool {
        let index = self.state.source_index;
        let Some(&character) = self.source.get(index) else {
            return false;
        };
        if character == '<' && self.config.rich_text && self.try_tag(index) {
            return true;
        }
        self.state.source_index = index + 1;
        self.place_character(character, index);
        true
    }

    // ---- tags ----

    /// Returns true when a tag was consumed at `index`.
    fn try_tag(&mut self, index: usize) -> bool {
        if self.state.no_parse {
            return match noparse_close_at(self.source, index) {
                Some(consumed) => {
                    self.state.no_parse = false;
                    self.state.source_index = index + consumed;
                    true
                }
                None => false,
            };
        }

        let parsed = {
            let stacks = &self.state.stacks;
            let context = TagContext {
                font_size: stacks.size.current(),
                container_width: self.config.max_width.unwrap_or(0.0),
                current_color: stacks.color.current(),
                gradients: &self.config.gradients,
            };
            parse_tag(self.source, index, self.config.max_tag_length, &context)
        };

        match parsed {
            Ok(tag) => {
                self.state.source_index = index + tag.consumed;
                match self.apply_tag(tag, index) {
                    Ok(()) => true,
                    Err(warning) => {
                        self.warn(warning);
                        self.state.source_index = index;
                        false
                    }
                }
            }
            Err(MarkupError::NotATag) => false,
            Err(MarkupError::Malformed { reason }) => {
                self.warn(LayoutWarning::MalformedTag {
                    position: index,
                    reason,
                });
                false
            }
        }
    }

    /// Applies a recognized tag. An error means the tag is rejected and must
    /// be laid out as text.
    fn apply_tag(&mut self, tag: ParsedTag, position: usize) -> Result<(), LayoutWarning> {
        let capacity = self.state.stacks.capacity();
        let overflow = |name: &str| LayoutWarning::TagOverflow {
            tag: name.to_string(),
            position,
            capacity,
        };

        match tag.action {
            TagAction::Push(value) => {
                let dimension = value.dimension();
                self.state
                    .stacks
                    .push(value)
                    .map_err(|_| overflow(&tag.name))?;
                if dimension == StyleDimension::Indent {
                    self.apply_indent();
                }
            }
            TagAction::Pop(dimension) => {
                if self.state.stacks.pop(dimension).is_err() {
                    self.imbalanced(&tag.name, position);
                } else if dimension == StyleDimension::Indent {
                    self.apply_indent();
                }
            }
            TagAction::OpenStyle { style, value } => {
                self.open_style(style, value)
                    .map_err(|_| overflow(&tag.name))?;
            }
            TagAction::CloseStyle(style) => {
                if self.close_style(style).is_err() {
                    self.imbalanced(&tag.name, position);
                }
            }
            TagAction::Font(name) => {
                let material = self.glyphs.material_by_name(&name).ok_or_else(|| {
                    LayoutWarning::MalformedTag {
                        position,
                        reason: format!("unknown font `{name}`"),
                    }
                })?;
                self.state
                    .stacks
                    .push(StyleValue::Material(material))
                    .map_err(|_| overflow(&tag.name))?;
            }
            TagAction::CharacterSpacing(spacing) => {
                self.state.character_spacing = spacing.unwrap_or(0.0);
            }
            TagAction::MonoSpacing(spacing) => self.state.mono_spacing = spacing,
            TagAction::LineHeight(height) => self.state.line_height = height,
            TagAction::Margin { left, right } => {
                if left.is_none() && right.is_none() {
                    self.state.margin_left = self.config.margin_left;
                    self.state.margin_right = self.config.margin_right;
                }
                if let Some(left) = left {
                    self.state.margin_left = left;
                }
                if let Some(right) = right {
                    self.state.margin_right = right;
                }
            }
            TagAction::Space(width) => self.state.x_advance += width,
            TagAction::LinkOpen { id, first, length } => {
                if let Some(link) = self.state.open_link.take() {
                    self.close_link(link);
                }
                self.state.open_link = Some(LinkInfo::new(
                    id,
                    first,
                    length,
                    self.out.characters.len(),
                ));
            }
            TagAction::LinkClose => match self.state.open_link.take() {
                Some(link) => self.close_link(link),
                None => self.imbalanced(&tag.name, position),
            },
            TagAction::Sprite(sprite) => {
                let point_size = self.active_style().point_size;
                let request = match &sprite {
                    SpriteRef::Index(index) => SpriteRequest::Index(*index),
                    SpriteRef::Name(name) => SpriteRequest::Name(name),
                };
                let glyph = self.glyphs.sprite(request, point_size).ok_or_else(|| {
                    LayoutWarning::MalformedTag {
                        position,
                        reason: format!("unknown sprite {sprite:?}"),
                    }
                })?;
                self.place_sprite(glyph, position);
            }
            TagAction::LineBreak => self.place_line_feed('\n', position),
            TagAction::PageBreak => {
                if self.state.line.character_count > 0 {
                    self.finalize_line(LineEnd::Mandatory);
                }
                if self.lines_on_page() > 0 {
                    self.new_page();
                }
            }
            TagAction::NoBreak(enabled) => self.state.no_break = enabled,
            TagAction::NoParse(enabled) => self.state.no_parse = enabled,
        }
        Ok(())
    }

    fn open_style(
        &mut self,
        style: FontStyle,
        value: Option<StyleValue>,
    ) -> Result<(), StyleStackError> {
        let script_size = self.active_style().point_size;
        let stacks = &mut self.state.stacks;
        let companion = match style {
            FontStyle::Italic => Some(value.unwrap_or(StyleValue::ItalicAngle(DEFAULT_ITALIC_ANGLE))),
            FontStyle::Underline => {
                Some(value.unwrap_or(StyleValue::UnderlineColor(stacks.color.current())))
            }
            FontStyle::Strikethrough => {
                Some(value.unwrap_or(StyleValue::StrikethroughColor(stacks.color.current())))
            }
            FontStyle::Highlight => Some(value.unwrap_or(StyleValue::HighlightState(
                stacks.highlight_state.current(),
            ))),
            FontStyle::Superscript => Some(StyleValue::BaselineOffset(
                stacks.baseline_offset.current() + script_size * SUPERSCRIPT_SHIFT,
            )),
            FontStyle::Subscript => Some(StyleValue::BaselineOffset(
                stacks.baseline_offset.current() - script_size * SUBSCRIPT_SHIFT,
            )),
            _ => None,
        };

        let capacity = stacks.capacity();
        stacks.font_style.push(style, capacity)?;
        let Some(companion) = companion else {
            return Ok(());
        };
        if let Err(err) = stacks.push(companion) {
            let _ = stacks.font_style.pop(style);
            return Err(err);
        }
        if let StyleValue::HighlightState(state) = companion {
            if let Err(err) = stacks.push(StyleValue::HighlightColor(state.color)) {
                let _ = stacks.pop(StyleDimension::HighlightState);
                let _ = stacks.font_style.pop(style);
                return Err(err);
            }
        }
        Ok(())
    }

    fn close_style(&mut self, style: FontStyle) -> Result<(), StyleStackError> {
        let stacks = &mut self.state.stacks;
        stacks.font_style.pop(style)?;
        let companions: &[StyleDimension] = match style {
            FontStyle::Italic => &[StyleDimension::ItalicAngle],
            FontStyle::Underline => &[StyleDimension::UnderlineColor],
            FontStyle::Strikethrough => &[StyleDimension::StrikethroughColor],
            FontStyle::Highlight => &[StyleDimension::HighlightColor, StyleDimension::HighlightState],
            FontStyle::Superscript | FontStyle::Subscript => &[StyleDimension::BaselineOffset],
            _ => &[],
        };
        for dimension in companions {
            let _ = stacks.pop(*dimension);
        }
        Ok(())
    }

    fn apply_indent(&mut self) {
        if self.state.line.character_count == 0 {
            self.state.x_advance = self.state.stacks.indent.current();
        }
    }

    fn close_link(&mut self, mut link: LinkInfo) {
        link.link_text_length = self
            .out
            .characters
            .len()
            .saturating_sub(link.link_text_first_character_index);
        self.out.links.push(link);
    }

    fn imbalanced(&mut self, tag: &str, position: usize) {
        match self.config.tag_strictness {
            TagStrictness::Strict => self.warn(LayoutWarning::ImbalancedTag {
                tag: tag.to_string(),
                position,
            }),
            TagStrictness::Lenient => {
                log::debug!("ignoring unmatched </{tag}> at source index {position}");
            }
        }
    }

    fn warn(&mut self, warning: LayoutWarning) {
        log::warn!("{warning}");
        self.out.diagnostics.push(warning);
    }

    // ---- element resolution ----

    fn active_style(&self) -> CharacterStyle {
        let stacks = &self.state.stacks;
        let styles = stacks.font_style.styles();
        let script_levels = i32::from(stacks.font_style.count(FontStyle::Superscript))
            + i32::from(stacks.font_style.count(FontStyle::Subscript));
        let font_weight = if styles.contains(FontStyle::Bold) {
            stacks.font_weight.current().max(BOLD_WEIGHT)
        } else {
            stacks.font_weight.current()
        };

        CharacterStyle {
            color: stacks.color.current(),
            underline_color: stacks.underline_color.current(),
            strikethrough_color: stacks.strikethrough_color.current(),
            highlight: styles
                .contains(FontStyle::Highlight)
                .then(|| stacks.highlight_state.current()),
            gradient: stacks.gradient.current(),
            font_styles: styles,
            font_weight,
            point_size: stacks.size.current() * SCRIPT_SCALE.powi(script_levels),
            italic_angle: if styles.contains(FontStyle::Italic) {
                stacks.italic_angle.current()
            } else {
                0.0
            },
            baseline_offset: stacks.baseline_offset.current(),
            material: stacks.material.current(),
        }
    }

    fn face(&mut self, material: MaterialRef, point_size: f32) -> FaceMetrics {
        let key = (material, point_size.to_bits());
        if let Some(face) = self.faces.get(&key) {
            return *face;
        }
        let face = self
            .glyphs
            .face_metrics(material, point_size)
            .unwrap_or_else(|| {
                log::debug!("no face metrics for {material:?} at {point_size}px");
                FaceMetrics {
                    ascender: point_size * 0.8,
                    descender: point_size * -0.2,
                    line_gap: 0.0,
                }
            });
        self.faces.insert(key, face);
        face
    }

    fn request(style: &CharacterStyle, character: char) -> GlyphRequest {
        GlyphRequest {
            character,
            material: style.material,
            point_size: style.point_size,
            weight: style.font_weight,
            italic: style.font_styles.contains(FontStyle::Italic),
        }
    }

    fn place_character(&mut self, character: char, index: usize) {
        match character {
            '\n' => self.place_line_feed(character, index),
            '\t' => self.place_tab(index),
            '\u{00AD}' | '\u{200B}' => {
                let style = self.active_style();
                let face = self.face(style.material, style.point_size);
                self.place(
                    Placement {
                        character,
                        source_index: index,
                        kind: ElementKind::Character,
                        glyph: None,
                        style,
                        face,
                        advance: 0.0,
                        kerning: 0.0,
                        x_offset: 0.0,
                        ink: None,
                        visible: false,
                    },
                    index,
                );
            }
            c if c.is_control() => self.place_control(c, index),
            _ => self.place_glyph(character, index),
        }
    }

    fn place_glyph(&mut self, character: char, index: usize) {
        let mut style = self.active_style();
        let (display, scale) = transform_case(character, style.font_styles);
        style.point_size *= scale;
        let face = self.face(style.material, style.point_size);
        let whitespace = display.is_whitespace();

        let request = Self::request(&style, display);
        let mut metrics = self.glyphs.glyph(&request);
        if metrics.is_none() && !whitespace {
            log::debug!("no glyph for {display:?}, substituting {:?}", self.config.missing_glyph);
            metrics = self
                .glyphs
                .glyph(&Self::request(&style, self.config.missing_glyph));
        }

        let (mut advance, ink, glyph) = match metrics {
            Some(m) => (
                m.advance,
                (!whitespace).then_some(Ink {
                    bearing_x: m.bearing_x,
                    bearing_y: m.bearing_y,
                    width: m.width,
                    height: m.height,
                }),
                Some(m.glyph),
            ),
            None if whitespace => (style.point_size * SPACE_FALLBACK_EM, None, None),
            None => (0.0, None, None),
        };
        if whitespace {
            advance += self.config.word_spacing;
        }

        let kerning = match (self.state.previous_glyph, glyph) {
            (Some(left), Some(right)) if left.same_run(&right) => self.glyphs.kerning(left, right),
            _ => 0.0,
        };

        let (advance, x_offset) = match self.state.mono_spacing {
            Some(mono) => (mono, (mono - advance) / 2.0),
            None => (advance, 0.0),
        };

        self.place(
            Placement {
                character: display,
                source_index: index,
                kind: ElementKind::Character,
                glyph,
                style,
                face,
                advance,
                kerning,
                x_offset,
                ink,
                visible: !whitespace && glyph.is_some(),
            },
            index,
        );
    }

    fn place_tab(&mut self, index: usize) {
        let style = self.active_style();
        let face = self.face(style.material, style.point_size);
        let space = self
            .glyphs
            .glyph(&Self::request(&style, ' '))
            .map(|m| m.advance)
            .unwrap_or(style.point_size * SPACE_FALLBACK_EM);
        let stop = self.config.tab_size * space;
        let x = self.state.x_advance;
        let advance = if stop > 0.0 {
            ((x / stop).floor() + 1.0) * stop - x
        } else {
            0.0
        };

        self.place(
            Placement {
                character: '\t',
                source_index: index,
                kind: ElementKind::Character,
                glyph: None,
                style,
                face,
                advance,
                kerning: 0.0,
                x_offset: 0.0,
                ink: None,
                visible: false,
            },
            index,
        );
    }

    fn place_sprite(&mut self, sprite: SpriteGlyph, position: usize) {
        let style = self.active_style();
        let face = self.face(style.material, style.point_size);
        let placed = self.place(
            Placement {
                character: SPRITE_CHARACTER,
                source_index: position,
                kind: ElementKind::Sprite,
                glyph: None,
                style,
                face,
                advance: sprite.advance,
                kerning: 0.0,
                x_offset: 0.0,
                ink: Some(Ink {
                    bearing_x: sprite.bearing_x,
                    bearing_y: sprite.bearing_y,
                    width: sprite.width,
                    height: sprite.height,
                }),
                visible: true,
            },
            position,
        );
        if placed {
            let character_index = self.out.characters.len() - 1;
            self.out.sprites.push(SpriteInfo {
                sprite_index: sprite.sprite_index,
                character_index,
                vertex_index: character_index * VERTICES_PER_QUAD,
            });
        }
    }

    fn place_control(&mut self, character: char, index: usize) {
        let style = self.active_style();
        let face = self.face(style.material, style.point_size);
        self.place(
            Placement {
                character,
                source_index: index,
                kind: ElementKind::Control,
                glyph: None,
                style,
                face,
                advance: 0.0,
                kerning: 0.0,
                x_offset: 0.0,
                ink: None,
                visible: false,
            },
            index,
        );
    }

    fn place_line_feed(&mut self, character: char, index: usize) {
        self.place_control(character, index);
        self.finalize_line(LineEnd::Mandatory);
    }

    // ---- placement ----

    /// Places one element on the current line. Returns false when the
    /// element did not fit and the state was rewound instead.
    fn place(&mut self, placement: Placement, restart_index: usize) -> bool {
        let mut placement = placement;
        let space = placement.is_space();
        let control = placement.kind == ElementKind::Control;

        if space || control {
            self.close_word();
            if self.state.clip == Clip::Word {
                self.state.clip = Clip::None;
            }
        }

        let mut clipped = self.state.clip != Clip::None && !space && !control;
        if !clipped && !space && !control {
            if let (Some(limit), Some(ink)) = (self.line_limit(), placement.ink) {
                let origin = self.state.x_advance + placement.kerning;
                let right = origin + placement.x_offset + ink.bearing_x + ink.width;
                if right > limit + FIT_EPSILON {
                    match self.handle_overflow(&placement, origin, limit, restart_index) {
                        OverflowAction::Restart => return false,
                        OverflowAction::Place => {}
                        OverflowAction::Clip => clipped = true,
                        OverflowAction::Replace(replacement) => placement = replacement,
                    }
                }
            }
        }

        self.emit(&placement, clipped);

        let breakable = !self.state.no_break
            && placement.kind == ElementKind::Character
            && ((space && !is_non_breaking(placement.character))
                || self.config.break_characters.contains(&placement.character));
        if breakable {
            self.close_word();
            if self.state.clip == Clip::Word {
                self.state.clip = Clip::None;
            }
            if self.config.wrap_style == WrapStyle::WordWrap {
                self.take_snapshot();
            }
        }
        true
    }

    fn emit(&mut self, p: &Placement, clipped: bool) {
        let origin = self.state.x_advance + p.kerning;
        let advance = if clipped { 0.0 } else { p.advance };
        let spacing = if clipped || p.kind == ElementKind::Control {
            0.0
        } else {
            self.config.character_spacing + self.state.character_spacing
        };

        let baseline = -p.style.baseline_offset;
        let ascender = baseline - p.face.ascender;
        let descender = baseline - p.face.descender;
        let (top_left, bottom_right) = match p.ink {
            Some(ink) => {
                let left = origin + p.x_offset + ink.bearing_x;
                let top = baseline - ink.bearing_y;
                let shear = p.style.italic_angle.to_radians().tan();
                let shear_top = shear * ink.bearing_y;
                let shear_bottom = shear * (ink.bearing_y - ink.height);
                (
                    Point2D::new(left + shear_bottom.min(0.0), top),
                    Point2D::new(left + ink.width + shear_top.max(0.0), top + ink.height),
                )
            }
            None => (
                Point2D::new(origin, ascender),
                Point2D::new(origin + advance, descender),
            ),
        };

        let is_visible = p.visible && !clipped;
        let info = CharacterInfo {
            character: p.character,
            source_index: p.source_index,
            kind: p.kind,
            glyph: p.glyph,
            style: p.style,
            origin,
            x_advance: origin + advance,
            ascender,
            baseline,
            descender,
            top_left,
            bottom_right,
            line_number: self.line_number,
            page_number: self.page_number,
            is_visible,
        };

        let index = self.out.characters.len();
        let state = &mut self.state;
        let line = &mut state.line;
        if line.character_count == 0 {
            line.first_character_index = index;
            line.alignment = state.stacks.alignment.current();
            line.margin_left = state.margin_left;
            line.margin_right = state.margin_right;
            line.line_extents = Extents::UNINITIALIZED;
        }
        line.character_count += 1;
        line.last_character_index = index;
        line.max_advance = line.max_advance.max(info.x_advance);
        if is_visible {
            if line.visible_character_count == 0 {
                line.first_visible_character_index = index;
            }
            line.visible_character_count += 1;
            line.last_visible_character_index = index;
            line.line_extents.include(&info.extents());

            if state.word_start.is_none() {
                state.word_start = Some(index);
                state.word_extents = Extents::UNINITIALIZED;
            }
            state.word_last = index;
            state.word_extents.include(&info.extents());
        }
        if p.is_space() {
            line.space_count += 1;
        }
        if p.kind == ElementKind::Control {
            line.control_character_count += 1;
        }

        if !clipped {
            let (mut top, mut bottom) = (p.face.ascender, p.face.descender);
            if let (ElementKind::Sprite, Some(ink)) = (p.kind, p.ink) {
                top = top.max(ink.bearing_y);
                bottom = bottom.min(ink.bearing_y - ink.height);
            }
            state.max_ascender = state.max_ascender.max(top + p.style.baseline_offset);
            state.min_descender = state.min_descender.min(bottom + p.style.baseline_offset);
            state.max_line_gap = state.max_line_gap.max(p.face.line_gap);
        }

        state.x_advance = origin + advance + spacing;
        state.previous_glyph = p.glyph;
        self.out.characters.push(info);
    }

    fn line_limit(&self) -> Option<f32> {
        self.config
            .max_width
            .map(|width| (width - self.state.margin_left - self.state.margin_right).max(0.0))
    }

    fn handle_overflow(
        &mut self,
        placement: &Placement,
        origin: f32,
        limit: f32,
        restart_index: usize,
    ) -> OverflowAction {
        let config = self.config;
        if config.wrap_style == WrapStyle::NoWrap {
            return match config.overflow {
                OverflowMode::Truncate => {
                    self.report_overflow();
                    self.state.clip = Clip::Line;
                    OverflowAction::Clip
                }
                OverflowMode::Ellipsis => {
                    self.report_overflow();
                    self.ellipsis(placement, origin, limit, Clip::Line)
                }
                OverflowMode::CharacterWrap | OverflowMode::Overflow => OverflowAction::Place,
            };
        }

        // The first visible element of a line is always placed.
        if self.state.line.visible_character_count > 0 {
            if config.wrap_style == WrapStyle::WordWrap {
                if let Some(snapshot) = self.last_break.take() {
                    if snapshot.line.visible_character_count > 0 {
                        self.restore(snapshot);
                        self.finalize_line(LineEnd::Wrap);
                        return OverflowAction::Restart;
                    }
                }
            }
            if config.wrap_style == WrapStyle::CharWrap
                || config.overflow == OverflowMode::CharacterWrap
            {
                self.finalize_line(LineEnd::Wrap);
                self.state.source_index = restart_index;
                return OverflowAction::Restart;
            }
        }

        match config.overflow {
            OverflowMode::CharacterWrap => OverflowAction::Place,
            OverflowMode::Overflow => {
                self.report_overflow();
                OverflowAction::Place
            }
            OverflowMode::Truncate => {
                self.report_overflow();
                self.state.clip = Clip::Word;
                OverflowAction::Clip
            }
            OverflowMode::Ellipsis => {
                self.report_overflow();
                self.ellipsis(placement, origin, limit, Clip::Word)
            }
        }
    }

    fn report_overflow(&mut self) {
        if self.state.overflow_reported {
            return;
        }
        self.state.overflow_reported = true;
        let character_index = self
            .state
            .word_start
            .unwrap_or(self.out.characters.len());
        self.warn(LayoutWarning::OverflowPolicyViolation {
            line: self.line_number,
            character_index,
            policy: self.config.overflow,
        });
    }

    /// Hides characters from the end of the line until the ellipsis fits and
    /// returns the ellipsis as the replacement of `placement`.
    fn ellipsis(
        &mut self,
        placement: &Placement,
        origin: f32,
        limit: f32,
        scope: Clip,
    ) -> OverflowAction {
        self.state.clip = scope;
        let request = Self::request(&placement.style, self.config.ellipsis);
        let Some(metrics) = self.glyphs.glyph(&request) else {
            log::debug!("no ellipsis glyph, truncating instead");
            return OverflowAction::Clip;
        };

        let first = if self.state.line.character_count > 0 {
            self.state.line.first_character_index
        } else {
            self.out.characters.len()
        };
        let mut cut = self.out.characters.len();
        let mut pen = origin;
        while pen + metrics.advance > limit + FIT_EPSILON && cut > first {
            cut -= 1;
            pen = self.out.characters[cut].origin;
        }
        if cut < self.out.characters.len() {
            for info in &mut self.out.characters[cut..] {
                info.is_visible = false;
            }
            self.recount_line();
        }
        self.state.x_advance = pen;

        OverflowAction::Replace(Placement {
            character: self.config.ellipsis,
            glyph: Some(metrics.glyph),
            advance: metrics.advance,
            kerning: 0.0,
            x_offset: 0.0,
            ink: Some(Ink {
                bearing_x: metrics.bearing_x,
                bearing_y: metrics.bearing_y,
                width: metrics.width,
                height: metrics.height,
            }),
            visible: true,
            ..*placement
        })
    }

    /// Rebuilds the visible counters of the current line after characters
    /// were hidden.
    fn recount_line(&mut self) {
        let line = &mut self.state.line;
        if line.character_count == 0 {
            return;
        }
        line.visible_character_count = 0;
        line.line_extents = Extents::UNINITIALIZED;
        let range = line.first_character_index..=line.last_character_index;
        for (offset, info) in self.out.characters[range.clone()].iter().enumerate() {
            if !info.is_visible {
                continue;
            }
            let index = range.start() + offset;
            if line.visible_character_count == 0 {
                line.first_visible_character_index = index;
            }
            line.visible_character_count += 1;
            line.last_visible_character_index = index;
            line.line_extents.include(&info.extents());
        }

        if let Some(start) = self.state.word_start {
            let visible = self.out.characters[start..]
                .iter()
                .enumerate()
                .filter(|(_, info)| info.is_visible)
                .map(|(offset, info)| (start + offset, info.extents()))
                .collect::<Vec<_>>();
            match visible.last() {
                Some((last, _)) => {
                    self.state.word_last = *last;
                    self.state.word_extents = Extents::UNINITIALIZED;
                    for (_, extents) in &visible {
                        self.state.word_extents.include(extents);
                    }
                }
                None => self.state.word_start = None,
            }
        }
    }

    // ---- words, snapshots and lines ----

    fn close_word(&mut self) {
        self.state.overflow_reported = false;
        let Some(first) = self.state.word_start.take() else {
            return;
        };
        let last = self.state.word_last;
        self.out.words.push(WordInfo {
            first_character_index: first,
            last_character_index: last,
            character_count: last - first + 1,
            extents: self.state.word_extents.or_zero(),
        });
        self.state.line.word_count += 1;
    }

    fn take_snapshot(&mut self) {
        let mut snapshot = self.state.clone();
        snapshot.output = OutputLengths {
            characters: self.out.characters.len(),
            words: self.out.words.len(),
            links: self.out.links.len(),
            sprites: self.out.sprites.len(),
            diagnostics: self.out.diagnostics.len(),
        };
        self.last_break = Some(snapshot);
    }

    fn restore(&mut self, snapshot: WordWrapState) {
        let lengths = snapshot.output;
        log::trace!(
            "wrapping at source index {} (dropping {} characters)",
            snapshot.source_index,
            self.out.characters.len() - lengths.characters
        );
        self.out.characters.truncate(lengths.characters);
        self.out.words.truncate(lengths.words);
        self.out.links.truncate(lengths.links);
        self.out.sprites.truncate(lengths.sprites);
        self.out.diagnostics.truncate(lengths.diagnostics);
        self.state = snapshot;
    }

    fn finalize_line(&mut self, end: LineEnd) {
        self.close_word();
        self.last_break = None;
        if self.state.line.character_count == 0 {
            return;
        }

        let natural = self.state.max_ascender - self.state.min_descender + self.state.max_line_gap;
        let line_height = self
            .state
            .line_height
            .unwrap_or(natural * self.config.line_height_scale);

        if self.config.paginate && self.lines_on_page() > 0 {
            if let Some(max_height) = self.config.max_height {
                if self.cursor_y + line_height > max_height + FIT_EPSILON {
                    self.new_page();
                }
            }
        }

        let top = self.cursor_y;
        let baseline = top + self.state.max_ascender;
        let mut line = std::mem::take(&mut self.state.line);

        for info in &mut self.out.characters[line.first_character_index..=line.last_character_index] {
            info.translate(0.0, baseline);
            info.line_number = self.line_number;
            info.page_number = self.page_number;
        }
        let words = self.out.words.len();
        for word in &mut self.out.words[words - line.word_count..] {
            word.extents.translate(0.0, baseline);
        }

        line.line_extents.translate(0.0, baseline);
        line.line_extents = line.line_extents.or_zero();
        line.line_height = line_height;
        line.ascender = top;
        line.baseline = baseline;
        line.descender = baseline - self.state.min_descender;
        line.length = if line.visible_character_count > 0 {
            self.out.characters[line.last_visible_character_index].x_advance
        } else {
            0.0
        };
        line.width = self.line_limit().unwrap_or(line.length);

        self.total_width = self
            .total_width
            .max(line.length + line.margin_left + line.margin_right);
        self.page_height = self.page_height.max(top + line_height);
        self.cursor_y = top + line_height + self.config.line_spacing;
        if end == LineEnd::Mandatory {
            self.cursor_y += self.config.paragraph_spacing;
        }
        self.out.lines.push(line);
        self.line_ends.push(end);
        self.line_number += 1;

        let state = &mut self.state;
        state.x_advance = state.stacks.indent.current();
        state.max_ascender = 0.0;
        state.min_descender = 0.0;
        state.max_line_gap = 0.0;
        state.previous_glyph = None;
        if state.clip == Clip::Line {
            state.clip = Clip::None;
        }
    }

    fn lines_on_page(&self) -> usize {
        self.out.lines.len() - self.page_start_line
    }

    fn close_page(&mut self) {
        if self.lines_on_page() == 0 {
            return;
        }
        let first = &self.out.lines[self.page_start_line];
        let last = &self.out.lines[self.out.lines.len() - 1];
        self.out.pages.push(PageInfo {
            first_character_index: first.first_character_index,
            last_character_index: last.last_character_index,
            ascender: first.ascender,
            baseline: first.baseline,
            descender: last.descender,
        });
        self.page_heights.push(self.page_height);
        self.page_height = 0.0;
        self.page_start_line = self.out.lines.len();
    }

    fn new_page(&mut self) {
        self.close_page();
        self.page_number += 1;
        self.cursor_y = 0.0;
    }

    fn finish(mut self) -> BrokenText {
        if self.state.line.character_count > 0 {
            self.finalize_line(LineEnd::EndOfText);
        } else {
            self.close_word();
        }

        let end = self.source.len();
        if let Some(link) = self.state.open_link.take() {
            self.imbalanced("link", end);
            self.close_link(link);
        }
        if self.config.tag_strictness == TagStrictness::Strict && !self.state.stacks.is_balanced() {
            for dimension in self.state.stacks.unclosed() {
                self.warn(unclosed_warning(dimension, end));
            }
            for style in FontStyle::ALL {
                if self.state.stacks.font_style.count(style) > 0 {
                    self.warn(LayoutWarning::ImbalancedTag {
                        tag: style.tag_name().to_string(),
                        position: end,
                    });
                }
            }
        }
        self.close_page();

        let total_height = self.page_heights.iter().copied().fold(0.0, f32::max);
        BrokenText {
            buffers: self.out,
            line_ends: self.line_ends,
            page_heights: self.page_heights,
            total_width: self.total_width,
            total_height,
        }
    }
}

/// Applies case-changing styles. Returns the displayed character and the
/// size factor it is drawn at.
fn transform_case(character: char, styles: FontStyles) -> (char, f32) {
    let upper = |c: char| c.to_uppercase().next().unwrap_or(c);
    if styles.contains(FontStyle::UpperCase) {
        (upper(character), 1.0)
    } else if styles.contains(FontStyle::LowerCase) {
        (character.to_lowercase().next().unwrap_or(character), 1.0)
    } else if styles.contains(FontStyle::SmallCaps) && character.is_lowercase() {
        (upper(character), SMALL_CAPS_SCALE)
    } else {
        (character, 1.0)
    }
}

fn is_non_breaking(character: char) -> bool {
    matches!(character, '\u{00A0}' | '\u{2007}' | '\u{202F}')
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::test_utils::MonoGlyphs;

    fn config(max_width: Option<f32>) -> TextLayoutConfig {
        TextLayoutConfig {
            max_width,
            font_size: 10.0,
            ..Default::default()
        }
    }

    fn break_text(text: &str, config: &TextLayoutConfig) -> BrokenText {
        let source: Vec<char> = text.chars().collect();
        LineBreaker::new(config, MonoGlyphs::new(), &source, LayoutBuffers::default()).run()
    }

    #[test]
    fn restore_rewinds_state_and_output() {
        let config = config(Some(100.0));
        let source: Vec<char> = "abc".chars().collect();
        let mut breaker =
            LineBreaker::new(&config, MonoGlyphs::new(), &source, LayoutBuffers::default());

        breaker.out.words.push(WordInfo::default());
        breaker.state.x_advance = 20.0;
        breaker.take_snapshot();

        breaker.out.words.push(WordInfo::default());
        breaker.out.diagnostics.push(LayoutWarning::ImbalancedTag {
            tag: "b".to_string(),
            position: 1,
        });
        breaker.state.x_advance = 90.0;
        breaker.state.source_index = 2;

        let snapshot = breaker.last_break.take().unwrap();
        breaker.restore(snapshot);
        assert_eq!(breaker.out.words.len(), 1);
        assert!(breaker.out.diagnostics.is_empty());
        assert_eq!(breaker.state.x_advance, 20.0);
        assert_eq!(breaker.state.source_index, 0);
    }

    #[test]
    fn stacks_are_balanced_after_matched_tags() {
        let config = config(None);
        let source: Vec<char> = "Hello <color=red>world</color>!".chars().collect();
        let mut breaker =
            LineBreaker::new(&config, MonoGlyphs::new(), &source, LayoutBuffers::default());

        let mut saw_color = false;
        while breaker.step() {
            saw_color |= breaker.state.stacks.depth(StyleDimension::Color) > 0;
        }
        assert!(saw_color);
        assert!(breaker.state.stacks.is_balanced());
        assert_eq!(breaker.out.characters.len(), 12);
        assert!(breaker.out.characters[6..11]
            .iter()
            .all(|info| info.style.color == crate::text::style_stack::rgb(255, 0, 0)));

        let source: Vec<char> = "Hello <color=red>world".chars().collect();
        let mut breaker =
            LineBreaker::new(&config, MonoGlyphs::new(), &source, LayoutBuffers::default());
        while breaker.step() {}
        assert!(!breaker.state.stacks.is_balanced());
    }

    #[test]
    fn face_metrics_are_fetched_once_per_size() {
        let config = config(None);
        let source: Vec<char> = "ab <size=20>cd</size> ef".chars().collect();
        let mut glyphs = MonoGlyphs::new();
        let broken = LineBreaker::new(&config, &mut glyphs, &source, LayoutBuffers::default()).run();

        assert_eq!(broken.buffers.characters.len(), 8);
        assert_eq!(glyphs.glyph_requests, 8);
        assert_eq!(glyphs.face_requests, 2);

        // a missing glyph asks again for the substitute
        let source: Vec<char> = "ax".chars().collect();
        let mut glyphs = MonoGlyphs::without(&['x']);
        LineBreaker::new(&config, &mut glyphs, &source, LayoutBuffers::default()).run();
        assert_eq!(glyphs.glyph_requests, 3);
        assert_eq!(glyphs.face_requests, 1);
    }

    #[test]
    fn line_ends_record_why_lines_ended() {
        let wrapped = break_text("aa bb cc", &config(Some(50.0)));
        assert_eq!(wrapped.line_ends, vec![LineEnd::Wrap, LineEnd::EndOfText]);

        let explicit = break_text("ab\ncd", &config(None));
        assert_eq!(explicit.line_ends, vec![LineEnd::Mandatory, LineEnd::EndOfText]);
        assert_eq!(explicit.page_heights.len(), 1);
    }

    #[test]
    fn case_transforms() {
        let mut styles = FontStyles::default();
        assert_eq!(transform_case('a', styles), ('a', 1.0));

        styles.insert(FontStyle::SmallCaps);
        assert_eq!(transform_case('a', styles), ('A', SMALL_CAPS_SCALE));
        assert_eq!(transform_case('B', styles), ('B', 1.0));

        styles.insert(FontStyle::LowerCase);
        assert_eq!(transform_case('B', styles), ('b', 1.0));
        styles.insert(FontStyle::UpperCase);
        assert_eq!(transform_case('b', styles), ('B', 1.0));
    }

    #[test]
    fn non_breaking_spaces() {
        assert!(is_non_breaking('\u{00A0}'));
        assert!(is_non_breaking('\u{202F}'));
        assert!(!is_non_breaking(' '));
    }
}
