//! Nested-scope style state.
//!
//! Every style dimension a tag can change has its own [`StyleStack`]. Tags of
//! different dimensions nest independently, so `<color><size></color></size>`
//! is valid and restores each dimension on its own close tag.

use smallvec::SmallVec;

use crate::error::StyleStackError;
use crate::glyph::MaterialRef;
use crate::text::layout::{HorizontalAlign, TextLayoutConfig};

/// 8-bit sRGB color with alpha.
pub type Color32 = palette::Srgba<u8>;

/// Builds an opaque [`Color32`].
pub const fn rgb(r: u8, g: u8, b: u8) -> Color32 {
    palette::Srgba::new(r, g, b, 255)
}

/// Four corner colors applied across a glyph quad.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexGradient {
    pub top_left: Color32,
    pub top_right: Color32,
    pub bottom_left: Color32,
    pub bottom_right: Color32,
}

impl VertexGradient {
    pub fn solid(color: Color32) -> Self {
        Self {
            top_left: color,
            top_right: color,
            bottom_left: color,
            bottom_right: color,
        }
    }
}

/// Highlight drawn behind text opened by `<mark>`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HighlightState {
    pub color: Color32,
    pub padding: f32,
}

impl Default for HighlightState {
    fn default() -> Self {
        Self {
            color: palette::Srgba::new(0, 0, 0, 0),
            padding: 0.0,
        }
    }
}

/// Bounded stack holding the effective value of one style dimension.
///
/// The base value is not stored in the stack: [`current`](Self::current)
/// falls back to it when nothing has been pushed.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleStack<T: Copy> {
    items: SmallVec<[T; 4]>,
    base: T,
    capacity: usize,
}

impl<T: Copy> StyleStack<T> {
    pub fn new(base: T, capacity: usize) -> Self {
        Self {
            items: SmallVec::new(),
            base,
            capacity,
        }
    }

    /// Makes `value` the effective value until the matching [`pop`](Self::pop).
    pub fn push(&mut self, value: T) -> Result<(), StyleStackError> {
        if self.items.len() >= self.capacity {
            return Err(StyleStackError::Overflow {
                capacity: self.capacity,
            });
        }
        self.items.push(value);
        Ok(())
    }

    /// Discards the top value and returns it.
    pub fn pop(&mut self) -> Result<T, StyleStackError> {
        self.items.pop().ok_or(StyleStackError::Underflow)
    }

    pub fn current(&self) -> T {
        self.items.last().copied().unwrap_or(self.base)
    }

    /// Number of values pushed above the base.
    pub fn depth(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Toggle styles tracked by [`FontStyleStack`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontStyle {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Highlight,
    Superscript,
    Subscript,
    LowerCase,
    UpperCase,
    SmallCaps,
}

impl FontStyle {
    const COUNT: usize = 10;

    pub const ALL: [FontStyle; Self::COUNT] = [
        FontStyle::Bold,
        FontStyle::Italic,
        FontStyle::Underline,
        FontStyle::Strikethrough,
        FontStyle::Highlight,
        FontStyle::Superscript,
        FontStyle::Subscript,
        FontStyle::LowerCase,
        FontStyle::UpperCase,
        FontStyle::SmallCaps,
    ];

    pub fn tag_name(self) -> &'static str {
        match self {
            FontStyle::Bold => "b",
            FontStyle::Italic => "i",
            FontStyle::Underline => "u",
            FontStyle::Strikethrough => "s",
            FontStyle::Highlight => "mark",
            FontStyle::Superscript => "sup",
            FontStyle::Subscript => "sub",
            FontStyle::LowerCase => "lowercase",
            FontStyle::UpperCase => "uppercase",
            FontStyle::SmallCaps => "smallcaps",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Set of active [`FontStyle`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FontStyles(u16);

impl FontStyles {
    pub const NORMAL: FontStyles = FontStyles(0);

    pub fn contains(self, style: FontStyle) -> bool {
        self.0 & style.bit() != 0
    }

    pub fn insert(&mut self, style: FontStyle) {
        self.0 |= style.bit();
    }

    pub fn remove(&mut self, style: FontStyle) {
        self.0 &= !style.bit();
    }

    pub fn is_normal(self) -> bool {
        self.0 == 0
    }
}

/// Open-count per toggle style; a style is active while its count is non-zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FontStyleStack {
    counts: [u8; FontStyle::COUNT],
}

impl FontStyleStack {
    pub fn push(&mut self, style: FontStyle, capacity: usize) -> Result<(), StyleStackError> {
        let count = &mut self.counts[style as usize];
        if usize::from(*count) >= capacity.min(u8::MAX as usize) {
            return Err(StyleStackError::Overflow { capacity });
        }
        *count += 1;
        Ok(())
    }

    pub fn pop(&mut self, style: FontStyle) -> Result<(), StyleStackError> {
        let count = &mut self.counts[style as usize];
        if *count == 0 {
            return Err(StyleStackError::Underflow);
        }
        *count -= 1;
        Ok(())
    }

    pub fn count(&self, style: FontStyle) -> u8 {
        self.counts[style as usize]
    }

    pub fn styles(&self) -> FontStyles {
        let mut styles = FontStyles::NORMAL;
        for (index, count) in self.counts.iter().enumerate() {
            if *count > 0 {
                styles.0 |= 1 << index;
            }
        }
        styles
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|count| *count == 0)
    }
}

/// Style dimension addressed by a push or pop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StyleDimension {
    Color,
    UnderlineColor,
    StrikethroughColor,
    HighlightColor,
    HighlightState,
    Gradient,
    Size,
    Indent,
    FontWeight,
    BaselineOffset,
    ItalicAngle,
    Material,
    Alignment,
}

impl StyleDimension {
    /// Name of the tag that opens this dimension, used in diagnostics.
    pub fn tag_name(self) -> &'static str {
        match self {
            StyleDimension::Color => "color",
            StyleDimension::UnderlineColor => "u",
            StyleDimension::StrikethroughColor => "s",
            StyleDimension::HighlightColor | StyleDimension::HighlightState => "mark",
            StyleDimension::Gradient => "gradient",
            StyleDimension::Size => "size",
            StyleDimension::Indent => "indent",
            StyleDimension::FontWeight => "font-weight",
            StyleDimension::BaselineOffset => "voffset",
            StyleDimension::ItalicAngle => "i",
            StyleDimension::Material => "font",
            StyleDimension::Alignment => "align",
        }
    }
}

/// A typed value for one style dimension.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StyleValue {
    Color(Color32),
    UnderlineColor(Color32),
    StrikethroughColor(Color32),
    HighlightColor(Color32),
    HighlightState(HighlightState),
    Gradient(VertexGradient),
    Size(f32),
    Indent(f32),
    FontWeight(u16),
    BaselineOffset(f32),
    ItalicAngle(f32),
    Material(MaterialRef),
    Alignment(HorizontalAlign),
}

impl StyleValue {
    pub fn dimension(&self) -> StyleDimension {
        match self {
            StyleValue::Color(_) => StyleDimension::Color,
            StyleValue::UnderlineColor(_) => StyleDimension::UnderlineColor,
            StyleValue::StrikethroughColor(_) => StyleDimension::StrikethroughColor,
            StyleValue::HighlightColor(_) => StyleDimension::HighlightColor,
            StyleValue::HighlightState(_) => StyleDimension::HighlightState,
            StyleValue::Gradient(_) => StyleDimension::Gradient,
            StyleValue::Size(_) => StyleDimension::Size,
            StyleValue::Indent(_) => StyleDimension::Indent,
            StyleValue::FontWeight(_) => StyleDimension::FontWeight,
            StyleValue::BaselineOffset(_) => StyleDimension::BaselineOffset,
            StyleValue::ItalicAngle(_) => StyleDimension::ItalicAngle,
            StyleValue::Material(_) => StyleDimension::Material,
            StyleValue::Alignment(_) => StyleDimension::Alignment,
        }
    }
}

/// One stack per style dimension, owned by a single layout pass.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleStacks {
    pub color: StyleStack<Color32>,
    pub underline_color: StyleStack<Color32>,
    pub strikethrough_color: StyleStack<Color32>,
    pub highlight_color: StyleStack<Color32>,
    pub highlight_state: StyleStack<HighlightState>,
    pub gradient: StyleStack<Option<VertexGradient>>,
    pub size: StyleStack<f32>,
    pub indent: StyleStack<f32>,
    pub font_weight: StyleStack<u16>,
    pub baseline_offset: StyleStack<f32>,
    pub italic_angle: StyleStack<f32>,
    pub material: StyleStack<MaterialRef>,
    pub alignment: StyleStack<HorizontalAlign>,
    pub font_style: FontStyleStack,
    capacity: usize,
}

/// Italic shear used when `<i>` carries no `angle` attribute.
pub const DEFAULT_ITALIC_ANGLE: f32 = 15.0;

impl StyleStacks {
    pub fn new(config: &TextLayoutConfig) -> Self {
        let capacity = config.max_nesting_depth;
        Self {
            color: StyleStack::new(config.default_color, capacity),
            underline_color: StyleStack::new(config.default_color, capacity),
            strikethrough_color: StyleStack::new(config.default_color, capacity),
            highlight_color: StyleStack::new(HighlightState::default().color, capacity),
            highlight_state: StyleStack::new(HighlightState::default(), capacity),
            gradient: StyleStack::new(None, capacity),
            size: StyleStack::new(config.font_size, capacity),
            indent: StyleStack::new(0.0, capacity),
            font_weight: StyleStack::new(config.font_weight, capacity),
            baseline_offset: StyleStack::new(0.0, capacity),
            italic_angle: StyleStack::new(DEFAULT_ITALIC_ANGLE, capacity),
            material: StyleStack::new(config.default_material, capacity),
            alignment: StyleStack::new(config.horizontal_align, capacity),
            font_style: FontStyleStack::default(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, value: StyleValue) -> Result<(), StyleStackError> {
        match value {
            StyleValue::Color(v) => self.color.push(v),
            StyleValue::UnderlineColor(v) => self.underline_color.push(v),
            StyleValue::StrikethroughColor(v) => self.strikethrough_color.push(v),
            StyleValue::HighlightColor(v) => self.highlight_color.push(v),
            StyleValue::HighlightState(v) => self.highlight_state.push(v),
            StyleValue::Gradient(v) => self.gradient.push(Some(v)),
            StyleValue::Size(v) => self.size.push(v),
            StyleValue::Indent(v) => self.indent.push(v),
            StyleValue::FontWeight(v) => self.font_weight.push(v),
            StyleValue::BaselineOffset(v) => self.baseline_offset.push(v),
            StyleValue::ItalicAngle(v) => self.italic_angle.push(v),
            StyleValue::Material(v) => self.material.push(v),
            StyleValue::Alignment(v) => self.alignment.push(v),
        }
    }

    pub fn pop(&mut self, dimension: StyleDimension) -> Result<(), StyleStackError> {
        match dimension {
            StyleDimension::Color => self.color.pop().map(drop),
            StyleDimension::UnderlineColor => self.underline_color.pop().map(drop),
            StyleDimension::StrikethroughColor => self.strikethrough_color.pop().map(drop),
            StyleDimension::HighlightColor => self.highlight_color.pop().map(drop),
            StyleDimension::HighlightState => self.highlight_state.pop().map(drop),
            StyleDimension::Gradient => self.gradient.pop().map(drop),
            StyleDimension::Size => self.size.pop().map(drop),
            StyleDimension::Indent => self.indent.pop().map(drop),
            StyleDimension::FontWeight => self.font_weight.pop().map(drop),
            StyleDimension::BaselineOffset => self.baseline_offset.pop().map(drop),
            StyleDimension::ItalicAngle => self.italic_angle.pop().map(drop),
            StyleDimension::Material => self.material.pop().map(drop),
            StyleDimension::Alignment => self.alignment.pop().map(drop),
        }
    }

    pub fn depth(&self, dimension: StyleDimension) -> usize {
        match dimension {
            StyleDimension::Color => self.color.depth(),
            StyleDimension::UnderlineColor => self.underline_color.depth(),
            StyleDimension::StrikethroughColor => self.strikethrough_color.depth(),
            StyleDimension::HighlightColor => self.highlight_color.depth(),
            StyleDimension::HighlightState => self.highlight_state.depth(),
            StyleDimension::Gradient => self.gradient.depth(),
            StyleDimension::Size => self.size.depth(),
            StyleDimension::Indent => self.indent.depth(),
            StyleDimension::FontWeight => self.font_weight.depth(),
            StyleDimension::BaselineOffset => self.baseline_offset.depth(),
            StyleDimension::ItalicAngle => self.italic_angle.depth(),
            StyleDimension::Material => self.material.depth(),
            StyleDimension::Alignment => self.alignment.depth(),
        }
    }

    /// Dimensions with values still pushed, in declaration order.
    pub fn unclosed(&self) -> Vec<StyleDimension> {
        use StyleDimension::*;
        // HighlightState and ItalicAngle always move with their toggle style,
        // which is reported through the highlight color and italic tags.
        [
            Color,
            UnderlineColor,
            StrikethroughColor,
            HighlightColor,
            Gradient,
            Size,
            Indent,
            FontWeight,
            BaselineOffset,
            Material,
            Alignment,
        ]
        .into_iter()
        .filter(|dimension| self.depth(*dimension) > 0)
        .collect()
    }

    pub fn is_balanced(&self) -> bool {
        self.unclosed().is_empty()
            && self.highlight_state.is_empty()
            && self.italic_angle.is_empty()
            && self.font_style.is_empty()
    }
}
