//! Inline markup tag recognition.
//!
//! [`parse_tag`] looks at a `<` in the source text and, if a known tag starts
//! there, returns how many characters it spans and the [`TagAction`] it asks
//! for. It never touches layout state; the engine applies the action.

use std::hash::Hasher;
use std::sync::OnceLock;

use fxhash::{FxHashMap, FxHasher};

use crate::error::MarkupError;
use crate::text::layout::HorizontalAlign;
use crate::text::style_stack::{
    Color32, FontStyle, HighlightState, StyleDimension, StyleValue, VertexGradient, rgb,
};

/// Unit qualifier of a numeric attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    /// Bare numbers and `px`.
    Pixels,
    /// `em`, relative to the current font size.
    FontUnits,
    /// `%`, relative to a dimension-specific base.
    Percentage,
}

/// Values tags may be resolved against.
#[derive(Clone, Copy, Debug)]
pub struct TagContext<'a> {
    /// Effective font size where the tag opens.
    pub font_size: f32,
    /// Width percentages for indents and margins resolve against.
    pub container_width: f32,
    pub current_color: Color32,
    pub gradients: &'a FxHashMap<String, VertexGradient>,
}

/// Sprite addressed by a `<sprite>` tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpriteRef {
    Index(usize),
    Name(String),
}

/// What a recognized tag asks the layout engine to do.
#[derive(Clone, Debug, PartialEq)]
pub enum TagAction {
    Push(StyleValue),
    Pop(StyleDimension),
    /// Opens a toggle style. `value` is the companion value pushed with it,
    /// e.g. the italic angle or the underline color.
    OpenStyle {
        style: FontStyle,
        value: Option<StyleValue>,
    },
    CloseStyle(FontStyle),
    /// `<font="name">`; the material is looked up by the glyph source.
    Font(String),
    CharacterSpacing(Option<f32>),
    MonoSpacing(Option<f32>),
    LineHeight(Option<f32>),
    Margin {
        left: Option<f32>,
        right: Option<f32>,
    },
    Space(f32),
    LinkOpen {
        id: String,
        first: usize,
        length: usize,
    },
    LinkClose,
    Sprite(SpriteRef),
    LineBreak,
    PageBreak,
    NoBreak(bool),
    NoParse(bool),
}

/// A recognized tag.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedTag {
    /// Number of source characters the tag spans, delimiters included.
    pub consumed: usize,
    pub name: String,
    pub closing: bool,
    pub action: TagAction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TagName {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Mark,
    Superscript,
    Subscript,
    LowerCase,
    UpperCase,
    SmallCaps,
    Color,
    Size,
    Indent,
    FontWeight,
    VOffset,
    Font,
    Align,
    CSpace,
    MSpace,
    Margin,
    MarginLeft,
    MarginRight,
    LineHeight,
    Space,
    Link,
    Sprite,
    LineBreak,
    Page,
    NoBreak,
    NoParse,
    Gradient,
}

const TAG_NAMES: &[(&str, TagName)] = &[
    ("b", TagName::Bold),
    ("i", TagName::Italic),
    ("u", TagName::Underline),
    ("s", TagName::Strikethrough),
    ("mark", TagName::Mark),
    ("sup", TagName::Superscript),
    ("sub", TagName::Subscript),
    ("lowercase", TagName::LowerCase),
    ("uppercase", TagName::UpperCase),
    ("allcaps", TagName::UpperCase),
    ("smallcaps", TagName::SmallCaps),
    ("color", TagName::Color),
    ("size", TagName::Size),
    ("indent", TagName::Indent),
    ("font-weight", TagName::FontWeight),
    ("voffset", TagName::VOffset),
    ("font", TagName::Font),
    ("align", TagName::Align),
    ("cspace", TagName::CSpace),
    ("mspace", TagName::MSpace),
    ("margin", TagName::Margin),
    ("margin-left", TagName::MarginLeft),
    ("margin-right", TagName::MarginRight),
    ("line-height", TagName::LineHeight),
    ("space", TagName::Space),
    ("link", TagName::Link),
    ("sprite", TagName::Sprite),
    ("br", TagName::LineBreak),
    ("page", TagName::Page),
    ("nobr", TagName::NoBreak),
    ("noparse", TagName::NoParse),
    ("gradient", TagName::Gradient),
];

/// Case-insensitive hash of a tag name.
pub fn tag_hash(name: &str) -> u64 {
    let mut hasher = FxHasher::default();
    for ch in name.chars() {
        hasher.write_u32(ch.to_ascii_lowercase() as u32);
    }
    hasher.finish()
}

fn tag_table() -> &'static FxHashMap<u64, (&'static str, TagName)> {
    static TABLE: OnceLock<FxHashMap<u64, (&'static str, TagName)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        TAG_NAMES
            .iter()
            .map(|(name, tag)| (tag_hash(name), (*name, *tag)))
            .collect()
    })
}

fn lookup(name: &str) -> Option<TagName> {
    tag_table()
        .get(&tag_hash(name))
        .filter(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, tag)| *tag)
}

/// An attribute value as written in the source.
#[derive(Clone, Debug, PartialEq)]
struct RawValue {
    text: String,
    /// Source index of the first character of the value, quotes excluded.
    start: usize,
}

#[derive(Clone, Debug, PartialEq)]
struct RawTag {
    name: String,
    closing: bool,
    value: Option<RawValue>,
    attributes: Vec<(String, RawValue)>,
    consumed: usize,
}

impl RawTag {
    fn attribute(&self, key: &str) -> Option<&RawValue> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }
}

/// Returns the length of a `</noparse>` tag starting at `position`, if any.
pub fn noparse_close_at(source: &[char], position: usize) -> Option<usize> {
    const CLOSE: &str = "</noparse>";
    let len = CLOSE.chars().count();
    let candidate = source.get(position..position + len)?;
    candidate
        .iter()
        .zip(CLOSE.chars())
        .all(|(a, b)| a.eq_ignore_ascii_case(&b))
        .then_some(len)
}

/// Tries to recognize a tag at `position`, which must hold `<`.
///
/// `NotATag` means the `<` is ordinary text. `Malformed` means it looked
/// like a tag but could not be resolved; it is also laid out as text but
/// worth a diagnostic.
pub fn parse_tag(
    source: &[char],
    position: usize,
    max_length: usize,
    context: &TagContext<'_>,
) -> Result<ParsedTag, MarkupError> {
    let raw = scan(source, position, max_length)?;
    let action = resolve(&raw, context)?;
    Ok(ParsedTag {
        consumed: raw.consumed,
        name: raw.name,
        closing: raw.closing,
        action,
    })
}

fn scan(source: &[char], position: usize, max_length: usize) -> Result<RawTag, MarkupError> {
    if source.get(position) != Some(&'<') {
        return Err(MarkupError::NotATag);
    }
    let first = *source.get(position + 1).ok_or(MarkupError::NotATag)?;
    if !(first.is_alphabetic() || first == '/' || first == '#') {
        return Err(MarkupError::NotATag);
    }

    let limit = source.len().min(position.saturating_add(max_length));
    let mut end = None;
    let mut quote = None;
    for (index, ch) in source.iter().enumerate().take(limit).skip(position + 1) {
        match (quote, *ch) {
            (None, '"' | '\'') => quote = Some(*ch),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => {
                end = Some(index);
                break;
            }
            (None, '<') => return Err(MarkupError::NotATag),
            _ => {}
        }
    }
    let end = end.ok_or(MarkupError::NotATag)?;

    let mut cursor = position + 1;
    let mut body_end = end;
    let closing = source[cursor] == '/';
    if closing {
        cursor += 1;
    }
    // `<br/>` style self-closing tags
    if !closing && body_end > cursor && source[body_end - 1] == '/' {
        body_end -= 1;
    }

    let name_start = cursor;
    while cursor < body_end && source[cursor] != '=' && !source[cursor].is_whitespace() {
        cursor += 1;
    }
    let name: String = source[name_start..cursor].iter().collect();
    if name.is_empty() {
        return Err(MarkupError::malformed("missing tag name"));
    }

    let mut value = None;
    if cursor < body_end && source[cursor] == '=' {
        let (parsed, next) = scan_value(source, cursor + 1, body_end)?;
        value = Some(parsed);
        cursor = next;
    }

    let mut attributes = Vec::new();
    loop {
        while cursor < body_end && source[cursor].is_whitespace() {
            cursor += 1;
        }
        if cursor >= body_end {
            break;
        }
        let key_start = cursor;
        while cursor < body_end && source[cursor] != '=' && !source[cursor].is_whitespace() {
            cursor += 1;
        }
        let key: String = source[key_start..cursor].iter().collect();
        if cursor >= body_end || source[cursor] != '=' {
            return Err(MarkupError::malformed(format!(
                "attribute `{key}` has no value"
            )));
        }
        let (parsed, next) = scan_value(source, cursor + 1, body_end)?;
        attributes.push((key, parsed));
        cursor = next;
    }

    Ok(RawTag {
        name,
        closing,
        value,
        attributes,
        consumed: end - position + 1,
    })
}

fn scan_value(source: &[char], start: usize, end: usize) -> Result<(RawValue, usize), MarkupError> {
    let Some(&first) = source.get(start).filter(|_| start < end) else {
        return Err(MarkupError::malformed("empty attribute value"));
    };
    if first == '"' || first == '\'' {
        let value_start = start + 1;
        let close = (value_start..end)
            .find(|index| source[*index] == first)
            .ok_or_else(|| MarkupError::malformed("unterminated quoted value"))?;
        let text = source[value_start..close].iter().collect();
        return Ok((
            RawValue {
                text,
                start: value_start,
            },
            close + 1,
        ));
    }

    let mut cursor = start;
    while cursor < end && !source[cursor].is_whitespace() {
        cursor += 1;
    }
    Ok((
        RawValue {
            text: source[start..cursor].iter().collect(),
            start,
        },
        cursor,
    ))
}

fn resolve(raw: &RawTag, context: &TagContext<'_>) -> Result<TagAction, MarkupError> {
    if let Some(hex) = raw.name.strip_prefix('#') {
        if raw.closing {
            return Err(MarkupError::malformed("color shorthand cannot be closed"));
        }
        let color = parse_hex_color(hex)
            .ok_or_else(|| MarkupError::malformed(format!("invalid color `#{hex}`")))?;
        return Ok(TagAction::Push(StyleValue::Color(color)));
    }

    let tag = lookup(&raw.name)
        .ok_or_else(|| MarkupError::malformed(format!("unknown tag `{}`", raw.name)))?;

    if raw.closing {
        if raw.value.is_some() || !raw.attributes.is_empty() {
            return Err(MarkupError::malformed("closing tags take no attributes"));
        }
        return close_action(tag);
    }
    open_action(tag, raw, context)
}

fn close_action(tag: TagName) -> Result<TagAction, MarkupError> {
    let action = match tag {
        TagName::Bold => TagAction::CloseStyle(FontStyle::Bold),
        TagName::Italic => TagAction::CloseStyle(FontStyle::Italic),
        TagName::Underline => TagAction::CloseStyle(FontStyle::Underline),
        TagName::Strikethrough => TagAction::CloseStyle(FontStyle::Strikethrough),
        TagName::Mark => TagAction::CloseStyle(FontStyle::Highlight),
        TagName::Superscript => TagAction::CloseStyle(FontStyle::Superscript),
        TagName::Subscript => TagAction::CloseStyle(FontStyle::Subscript),
        TagName::LowerCase => TagAction::CloseStyle(FontStyle::LowerCase),
        TagName::UpperCase => TagAction::CloseStyle(FontStyle::UpperCase),
        TagName::SmallCaps => TagAction::CloseStyle(FontStyle::SmallCaps),
        TagName::Color => TagAction::Pop(StyleDimension::Color),
        TagName::Size => TagAction::Pop(StyleDimension::Size),
        TagName::Indent => TagAction::Pop(StyleDimension::Indent),
        TagName::FontWeight => TagAction::Pop(StyleDimension::FontWeight),
        TagName::VOffset => TagAction::Pop(StyleDimension::BaselineOffset),
        TagName::Font => TagAction::Pop(StyleDimension::Material),
        TagName::Align => TagAction::Pop(StyleDimension::Alignment),
        TagName::Gradient => TagAction::Pop(StyleDimension::Gradient),
        TagName::CSpace => TagAction::CharacterSpacing(None),
        TagName::MSpace => TagAction::MonoSpacing(None),
        TagName::LineHeight => TagAction::LineHeight(None),
        TagName::Margin | TagName::MarginLeft | TagName::MarginRight => TagAction::Margin {
            left: None,
            right: None,
        },
        TagName::Link => TagAction::LinkClose,
        TagName::NoBreak => TagAction::NoBreak(false),
        TagName::NoParse => TagAction::NoParse(false),
        TagName::Space | TagName::Sprite | TagName::LineBreak | TagName::Page => {
            return Err(MarkupError::malformed("tag cannot be closed"));
        }
    };
    Ok(action)
}

fn open_action(
    tag: TagName,
    raw: &RawTag,
    context: &TagContext<'_>,
) -> Result<TagAction, MarkupError> {
    let required = || {
        raw.value
            .as_ref()
            .ok_or_else(|| MarkupError::malformed(format!("<{}> needs a value", raw.name)))
    };
    let font_size = context.font_size;
    let width = context.container_width;

    let action = match tag {
        TagName::Bold => TagAction::OpenStyle {
            style: FontStyle::Bold,
            value: None,
        },
        TagName::Italic => {
            let angle = raw
                .attribute("angle")
                .map(|value| parse_number(&value.text).map(|(angle, _)| angle))
                .transpose()?;
            TagAction::OpenStyle {
                style: FontStyle::Italic,
                value: angle.map(StyleValue::ItalicAngle),
            }
        }
        TagName::Underline | TagName::Strikethrough => {
            let color = raw
                .attribute("color")
                .or(raw.value.as_ref())
                .map(|value| color_value(&value.text))
                .transpose()?
                .unwrap_or(context.current_color);
            if tag == TagName::Underline {
                TagAction::OpenStyle {
                    style: FontStyle::Underline,
                    value: Some(StyleValue::UnderlineColor(color)),
                }
            } else {
                TagAction::OpenStyle {
                    style: FontStyle::Strikethrough,
                    value: Some(StyleValue::StrikethroughColor(color)),
                }
            }
        }
        TagName::Mark => {
            let color = raw
                .value
                .as_ref()
                .or(raw.attribute("color"))
                .map(|value| color_value(&value.text))
                .transpose()?
                .unwrap_or(rgb(255, 255, 0));
            let padding = raw
                .attribute("padding")
                .map(|value| length_value(&value.text, font_size, width))
                .transpose()?
                .unwrap_or(0.0);
            TagAction::OpenStyle {
                style: FontStyle::Highlight,
                value: Some(StyleValue::HighlightState(HighlightState { color, padding })),
            }
        }
        TagName::Superscript => TagAction::OpenStyle {
            style: FontStyle::Superscript,
            value: None,
        },
        TagName::Subscript => TagAction::OpenStyle {
            style: FontStyle::Subscript,
            value: None,
        },
        TagName::LowerCase => TagAction::OpenStyle {
            style: FontStyle::LowerCase,
            value: None,
        },
        TagName::UpperCase => TagAction::OpenStyle {
            style: FontStyle::UpperCase,
            value: None,
        },
        TagName::SmallCaps => TagAction::OpenStyle {
            style: FontStyle::SmallCaps,
            value: None,
        },
        TagName::Color => TagAction::Push(StyleValue::Color(color_value(&required()?.text)?)),
        TagName::Size => TagAction::Push(StyleValue::Size(size_value(&required()?.text, font_size)?)),
        TagName::Indent => TagAction::Push(StyleValue::Indent(length_value(
            &required()?.text,
            font_size,
            width,
        )?)),
        TagName::FontWeight => {
            let text = &required()?.text;
            let weight = text
                .parse::<u16>()
                .ok()
                .filter(|weight| (1..=1000).contains(weight))
                .ok_or_else(|| MarkupError::malformed(format!("invalid weight `{text}`")))?;
            TagAction::Push(StyleValue::FontWeight(weight))
        }
        TagName::VOffset => TagAction::Push(StyleValue::BaselineOffset(length_value(
            &required()?.text,
            font_size,
            font_size,
        )?)),
        TagName::Font => {
            let name = required()?.text.trim().to_string();
            if name.is_empty() {
                return Err(MarkupError::malformed("empty font name"));
            }
            TagAction::Font(name)
        }
        TagName::Align => {
            let text = &required()?.text;
            let align = match text.to_ascii_lowercase().as_str() {
                "left" => HorizontalAlign::Left,
                "center" => HorizontalAlign::Center,
                "right" => HorizontalAlign::Right,
                "justified" => HorizontalAlign::Justified,
                "flush" => HorizontalAlign::Flush,
                _ => return Err(MarkupError::malformed(format!("invalid alignment `{text}`"))),
            };
            TagAction::Push(StyleValue::Alignment(align))
        }
        TagName::CSpace => {
            TagAction::CharacterSpacing(Some(length_value(&required()?.text, font_size, font_size)?))
        }
        TagName::MSpace => {
            TagAction::MonoSpacing(Some(length_value(&required()?.text, font_size, font_size)?))
        }
        TagName::LineHeight => {
            TagAction::LineHeight(Some(length_value(&required()?.text, font_size, font_size)?))
        }
        TagName::Margin => {
            let margin = length_value(&required()?.text, font_size, width)?;
            TagAction::Margin {
                left: Some(margin),
                right: Some(margin),
            }
        }
        TagName::MarginLeft => TagAction::Margin {
            left: Some(length_value(&required()?.text, font_size, width)?),
            right: None,
        },
        TagName::MarginRight => TagAction::Margin {
            left: None,
            right: Some(length_value(&required()?.text, font_size, width)?),
        },
        TagName::Space => TagAction::Space(length_value(&required()?.text, font_size, width)?),
        TagName::Link => {
            let value = required()?;
            if value.text.is_empty() {
                return Err(MarkupError::malformed("empty link identifier"));
            }
            TagAction::LinkOpen {
                id: value.text.clone(),
                first: value.start,
                length: value.text.chars().count(),
            }
        }
        TagName::Sprite => {
            if let Some(name) = raw.attribute("name") {
                TagAction::Sprite(SpriteRef::Name(name.text.clone()))
            } else if let Some(index) = raw.attribute("index").or(raw.value.as_ref()) {
                match index.text.parse::<usize>() {
                    Ok(index) => TagAction::Sprite(SpriteRef::Index(index)),
                    Err(_) if !index.text.is_empty() && raw.value.as_ref() == Some(index) => {
                        TagAction::Sprite(SpriteRef::Name(index.text.clone()))
                    }
                    Err(_) => {
                        return Err(MarkupError::malformed(format!(
                            "invalid sprite index `{}`",
                            index.text
                        )));
                    }
                }
            } else {
                return Err(MarkupError::malformed("<sprite> needs an index or a name"));
            }
        }
        TagName::Gradient => {
            let name = &required()?.text;
            let gradient = context
                .gradients
                .get(name.as_str())
                .copied()
                .ok_or_else(|| MarkupError::malformed(format!("unknown gradient `{name}`")))?;
            TagAction::Push(StyleValue::Gradient(gradient))
        }
        TagName::LineBreak => TagAction::LineBreak,
        TagName::Page => TagAction::PageBreak,
        TagName::NoBreak => TagAction::NoBreak(true),
        TagName::NoParse => TagAction::NoParse(true),
    };

    Ok(action)
}

/// Parses `12`, `-3.5px`, `1.5em` or `150%`.
fn parse_number(text: &str) -> Result<(f32, Unit), MarkupError> {
    let text = text.trim();
    let (number, unit) = if let Some(number) = text.strip_suffix('%') {
        (number, Unit::Percentage)
    } else if let Some(number) = strip_suffix_ignore_case(text, "em") {
        (number, Unit::FontUnits)
    } else if let Some(number) = strip_suffix_ignore_case(text, "px") {
        (number, Unit::Pixels)
    } else {
        (text, Unit::Pixels)
    };
    let value = number
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| MarkupError::malformed(format!("invalid number `{text}`")))?;
    Ok((value, unit))
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let split = text.len().checked_sub(suffix.len())?;
    let (head, tail) = (text.get(..split)?, text.get(split..)?);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

/// Resolves a length. Percentages are taken of `percent_base`.
fn length_value(text: &str, font_size: f32, percent_base: f32) -> Result<f32, MarkupError> {
    let (value, unit) = parse_number(text)?;
    Ok(match unit {
        Unit::Pixels => value,
        Unit::FontUnits => value * font_size,
        Unit::Percentage => value * percent_base / 100.0,
    })
}

/// Resolves a font size against the enclosing size.
///
/// Signed pixel values are offsets, every relative unit compounds.
fn size_value(text: &str, font_size: f32) -> Result<f32, MarkupError> {
    let trimmed = text.trim();
    let (value, unit) = parse_number(trimmed)?;
    let signed = trimmed.starts_with('+') || trimmed.starts_with('-');
    let size = match unit {
        Unit::Pixels if signed => font_size + value,
        Unit::Pixels => value,
        Unit::FontUnits => font_size * value,
        Unit::Percentage => font_size * value / 100.0,
    };
    if size <= 0.0 {
        return Err(MarkupError::malformed(format!("size `{text}` is not positive")));
    }
    Ok(size)
}

fn color_value(text: &str) -> Result<Color32, MarkupError> {
    parse_color(text).ok_or_else(|| MarkupError::malformed(format!("invalid color `{text}`")))
}

/// Parses `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa` or a CSS color name.
pub fn parse_color(text: &str) -> Option<Color32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#') {
        return parse_hex_color(hex);
    }
    let named = palette::named::from_str(&text.to_ascii_lowercase())?;
    Some(rgb(named.red, named.green, named.blue))
}

fn parse_hex_color(hex: &str) -> Option<Color32> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |index: usize| u8::from_str_radix(hex.get(index..index + 1)?, 16).ok();
    let pair = |index: usize| u8::from_str_radix(hex.get(index..index + 2)?, 16).ok();
    match hex.len() {
        3 | 4 => {
            let alpha = if hex.len() == 4 { digit(3)? * 17 } else { 255 };
            Some(palette::Srgba::new(
                digit(0)? * 17,
                digit(1)? * 17,
                digit(2)? * 17,
                alpha,
            ))
        }
        6 | 8 => {
            let alpha = if hex.len() == 8 { pair(6)? } else { 255 };
            Some(palette::Srgba::new(pair(0)?, pair(2)?, pair(4)?, alpha))
        }
        _ => None,
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    fn parse(text: &str) -> Result<ParsedTag, MarkupError> {
        let gradients = FxHashMap::default();
        let context = TagContext {
            font_size: 20.0,
            container_width: 200.0,
            current_color: rgb(1, 2, 3),
            gradients: &gradients,
        };
        parse_tag(&chars(text), 0, 128, &context)
    }

    #[test]
    fn color_tag_pushes_named_color() {
        let tag = parse("<color=red>world").unwrap();
        assert_eq!(tag.consumed, 11);
        assert!(!tag.closing);
        assert_eq!(tag.action, TagAction::Push(StyleValue::Color(rgb(255, 0, 0))));

        let tag = parse("</COLOR>").unwrap();
        assert!(tag.closing);
        assert_eq!(tag.action, TagAction::Pop(StyleDimension::Color));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_color("#FF8000"), Some(rgb(255, 128, 0)));
        assert_eq!(parse_color("#f00"), Some(rgb(255, 0, 0)));
        assert_eq!(
            parse_color("#00000080"),
            Some(palette::Srgba::new(0, 0, 0, 128))
        );
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#gg0000"), None);

        let tag = parse("<#00ff00>").unwrap();
        assert_eq!(tag.action, TagAction::Push(StyleValue::Color(rgb(0, 255, 0))));
    }

    #[test]
    fn size_units() {
        let size = |text: &str| match parse(text).unwrap().action {
            TagAction::Push(StyleValue::Size(size)) => size,
            other => panic!("unexpected action {other:?}"),
        };
        assert_eq!(size("<size=30>"), 30.0);
        assert_eq!(size("<size=30px>"), 30.0);
        assert_eq!(size("<size=150%>"), 30.0);
        assert_eq!(size("<size=2em>"), 40.0);
        assert_eq!(size("<size=+5>"), 25.0);
        assert_eq!(size("<size=-5>"), 15.0);
        assert!(matches!(parse("<size=-25>"), Err(MarkupError::Malformed { .. })));
    }

    #[test]
    fn percentages_of_container_width() {
        assert_eq!(
            parse("<indent=10%>").unwrap().action,
            TagAction::Push(StyleValue::Indent(20.0))
        );
        assert_eq!(
            parse("<margin=1em>").unwrap().action,
            TagAction::Margin {
                left: Some(20.0),
                right: Some(20.0)
            }
        );
    }

    #[test]
    fn link_keeps_identifier_range() {
        let tag = parse("<link=\"home page\">Home</link>").unwrap();
        assert_eq!(tag.consumed, 18);
        assert_eq!(
            tag.action,
            TagAction::LinkOpen {
                id: "home page".into(),
                first: 7,
                length: 9
            }
        );
    }

    #[test]
    fn attributes_and_self_closing() {
        assert_eq!(
            parse("<i angle=20>").unwrap().action,
            TagAction::OpenStyle {
                style: FontStyle::Italic,
                value: Some(StyleValue::ItalicAngle(20.0))
            }
        );
        assert_eq!(
            parse("<u>").unwrap().action,
            TagAction::OpenStyle {
                style: FontStyle::Underline,
                value: Some(StyleValue::UnderlineColor(rgb(1, 2, 3)))
            }
        );
        assert_eq!(parse("<br/>").unwrap().action, TagAction::LineBreak);
        assert_eq!(
            parse("<sprite name=\"smile\">").unwrap().action,
            TagAction::Sprite(SpriteRef::Name("smile".into()))
        );
        assert_eq!(
            parse("<sprite=4>").unwrap().action,
            TagAction::Sprite(SpriteRef::Index(4))
        );
    }

    #[test]
    fn text_that_is_not_a_tag() {
        assert_eq!(parse("< 5").unwrap_err(), MarkupError::NotATag);
        assert_eq!(parse("<b").unwrap_err(), MarkupError::NotATag);
        assert_eq!(parse("<a<b>").unwrap_err(), MarkupError::NotATag);
        assert!(matches!(parse("<blink>"), Err(MarkupError::Malformed { .. })));
        assert!(matches!(parse("<color>"), Err(MarkupError::Malformed { .. })));
        assert!(matches!(parse("</color=red>"), Err(MarkupError::Malformed { .. })));
        assert!(matches!(parse("<size=big>"), Err(MarkupError::Malformed { .. })));
    }

    #[test]
    fn tag_length_is_bounded() {
        let gradients = FxHashMap::default();
        let context = TagContext {
            font_size: 20.0,
            container_width: 200.0,
            current_color: rgb(0, 0, 0),
            gradients: &gradients,
        };
        let source = chars("<link=\"aaaaaaaaaaaaaaaaaaaa\">");
        assert_eq!(
            parse_tag(&source, 0, 8, &context).unwrap_err(),
            MarkupError::NotATag
        );

        let source = chars("a<b>c</b>");
        let tag = parse_tag(&source, 1, usize::MAX, &context).unwrap();
        assert_eq!(tag.consumed, 3);
        let tag = parse_tag(&source, 5, usize::MAX, &context).unwrap();
        assert!(tag.closing);
    }

    #[test]
    fn hash_is_case_insensitive() {
        assert_eq!(tag_hash("Color"), tag_hash("COLOR"));
        assert_ne!(tag_hash("color"), tag_hash("size"));
        assert_eq!(noparse_close_at(&chars("</NoParse>x"), 0), Some(10));
        assert_eq!(noparse_close_at(&chars("</noparse"), 0), None);
    }
}
