/// Defines the input data structure for text layout.
pub mod data;
/// Axis-aligned bounding boxes.
pub mod extents;
/// Records produced by a layout pass.
pub mod info;
/// The layout entry point, configuration and alignment stage.
pub mod layout;
/// Inline markup tag recognition.
pub mod markup;
/// Nested-scope style state.
pub mod style_stack;

mod line_break;

#[cfg(test)]
pub(crate) mod test_utils;

pub use data::TextData;
pub use extents::Extents;
pub use info::{
    CharacterInfo, CharacterStyle, ElementKind, LineInfo, LinkInfo, PageInfo, SpriteInfo, WordInfo,
};
pub use layout::{
    HorizontalAlign, OverflowMode, TagStrictness, TextLayout, TextLayoutConfig, VerticalAlign,
    WrapStyle,
};
pub use style_stack::{
    Color32, FontStyle, FontStyles, HighlightState, StyleDimension, StyleStack, StyleStacks,
    StyleValue, VertexGradient,
};
