use std::collections::{HashMap, HashSet};

use crate::error::LayoutWarning;
use crate::glyph::{GlyphSource, MaterialRef};
use crate::pool::LayoutBuffers;
use crate::text::TextData;
use crate::text::extents::Extents;
use crate::text::info::{CharacterInfo, LineInfo, LinkInfo, PageInfo, SpriteInfo, WordInfo};
use crate::text::line_break::{LineBreaker, LineEnd};
use crate::text::style_stack::{Color32, VertexGradient, rgb};

/// Configuration knobs used by the text layout pipeline.
///
/// All parameters are honored during a single `TextData::layout` call so the
/// caller can measure or place text inside arbitrary rectangles.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLayoutConfig {
    pub max_width: Option<f32>,
    pub max_height: Option<f32>,
    pub margin_left: f32,
    pub margin_right: f32,
    pub horizontal_align: HorizontalAlign,
    pub vertical_align: VerticalAlign,
    pub line_height_scale: f32,
    /// Extra space added after every line.
    pub line_spacing: f32,
    /// Extra space added after a line feed.
    pub paragraph_spacing: f32,
    pub character_spacing: f32,
    pub word_spacing: f32,
    /// Tab stop distance in multiples of the space advance.
    pub tab_size: f32,
    pub wrap_style: WrapStyle,
    pub overflow: OverflowMode,
    /// Characters after which a line may wrap, in addition to whitespace.
    pub break_characters: HashSet<char, fxhash::FxBuildHasher>,
    pub font_size: f32,
    pub font_weight: u16,
    pub default_color: Color32,
    pub default_material: MaterialRef,
    pub rich_text: bool,
    pub tag_strictness: TagStrictness,
    pub max_nesting_depth: usize,
    pub max_tag_length: usize,
    pub gradients: HashMap<String, VertexGradient, fxhash::FxBuildHasher>,
    /// Splits lines into pages of `max_height`.
    pub paginate: bool,
    pub missing_glyph: char,
    pub ellipsis: char,
}

impl Default for TextLayoutConfig {
    fn default() -> Self {
        Self {
            max_width: None,
            max_height: None,
            margin_left: 0.0,
            margin_right: 0.0,
            horizontal_align: HorizontalAlign::Left,
            vertical_align: VerticalAlign::Top,
            line_height_scale: 1.0,
            line_spacing: 0.0,
            paragraph_spacing: 0.0,
            character_spacing: 0.0,
            word_spacing: 0.0,
            tab_size: 4.0,
            wrap_style: WrapStyle::WordWrap,
            overflow: OverflowMode::CharacterWrap,
            break_characters: ['-', '\u{00AD}', '\u{200B}'].into_iter().collect(),
            font_size: 16.0,
            font_weight: 400,
            default_color: rgb(255, 255, 255),
            default_material: MaterialRef::default(),
            rich_text: true,
            tag_strictness: TagStrictness::Lenient,
            max_nesting_depth: 16,
            max_tag_length: 128,
            gradients: HashMap::default(),
            paginate: false,
            missing_glyph: '\u{25A1}',
            ellipsis: '\u{2026}',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Horizontal justification applied after each line is assembled.
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
    /// Stretches wrapped lines to the full width. The last line of a
    /// paragraph stays left aligned.
    Justified,
    /// Stretches every line, including the last line of a paragraph.
    Flush,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Vertical alignment strategy for the entire block of text.
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Wrapping rules that define where line breaks may occur.
pub enum WrapStyle {
    NoWrap,
    WordWrap,
    CharWrap,
}

/// What to do with a word that does not fit on a line by itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowMode {
    /// Break the word between characters.
    CharacterWrap,
    /// Let the word run past the line width.
    Overflow,
    /// Hide the characters that do not fit.
    Truncate,
    /// Replace the last characters that fit with an ellipsis and hide the rest.
    Ellipsis,
}

/// How unmatched tags are reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagStrictness {
    /// Unmatched tags are dropped silently.
    Lenient,
    /// Unmatched tags are dropped and reported as diagnostics.
    Strict,
}

/// Final layout output produced by [`TextData::layout`].
///
/// All records index into `characters`.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLayout {
    pub config: TextLayoutConfig,
    pub total_width: f32,
    pub total_height: f32,
    pub extents: Extents,
    pub characters: Vec<CharacterInfo>,
    pub lines: Vec<LineInfo>,
    pub words: Vec<WordInfo>,
    pub links: Vec<LinkInfo>,
    pub sprites: Vec<SpriteInfo>,
    pub pages: Vec<PageInfo>,
    pub diagnostics: Vec<LayoutWarning>,
}

impl TextLayout {
    pub fn word_text(&self, word: usize) -> Option<String> {
        self.words.get(word).map(|w| w.text(&self.characters))
    }

    pub fn line_text(&self, line: usize) -> Option<String> {
        self.lines.get(line).map(|l| l.text(&self.characters))
    }

    /// Visible characters of a line, with clipped characters and line feeds dropped.
    pub fn visible_line_text(&self, line: usize) -> Option<String> {
        let line = self.lines.get(line)?;
        Some(
            self.characters[line.first_character_index..=line.last_character_index]
                .iter()
                .filter(|info| info.is_visible || info.character.is_whitespace())
                .filter(|info| !info.character.is_control())
                .map(|info| info.character)
                .collect::<String>()
                .trim_end()
                .to_string(),
        )
    }

    pub fn link_text(&self, link: usize) -> Option<String> {
        self.links.get(link).map(|l| l.link_text(&self.characters))
    }

    /// Finds a link by identifier using its precomputed hash.
    pub fn find_link(&self, id: &str) -> Option<&LinkInfo> {
        let hash = crate::text::info::identifier_hash(id);
        self.links
            .iter()
            .find(|link| link.hash_code == hash && link.link_id() == id)
    }

    /// Returns the buffers so they can go back into a [`BufferPool`](crate::BufferPool).
    pub fn into_buffers(self) -> LayoutBuffers {
        LayoutBuffers {
            characters: self.characters,
            lines: self.lines,
            words: self.words,
            links: self.links,
            sprites: self.sprites,
            pages: self.pages,
            diagnostics: self.diagnostics,
        }
    }
}

impl TextData {
    /// Computes the bounding box that would be produced by [`Self::layout`].
    ///
    /// The size is returned as `[width, height]`.
    pub fn measure(&self, config: &TextLayoutConfig, glyphs: &mut impl GlyphSource) -> [f32; 2] {
        let layout = self.layout(config, glyphs);
        [layout.total_width, layout.total_height]
    }

    /// Performs layout with freshly allocated buffers.
    pub fn layout(&self, config: &TextLayoutConfig, glyphs: &mut impl GlyphSource) -> TextLayout {
        self.layout_with_buffers(config, glyphs, LayoutBuffers::default())
    }

    /// Performs layout according to the provided configuration.
    ///
    /// The implementation follows a two-stage pipeline:
    /// 1. The line breaker walks the source once, interpreting tags and
    ///    placing characters relative to each line's start and baseline.
    /// 2. The finished lines are aligned inside the container and the block
    ///    extents are accumulated.
    ///
    /// `buffers` are cleared before use; nothing in them is trusted.
    pub fn layout_with_buffers(
        &self,
        config: &TextLayoutConfig,
        glyphs: &mut impl GlyphSource,
        mut buffers: LayoutBuffers,
    ) -> TextLayout {
        buffers.clear();
        let source: Vec<char> = self.content.chars().collect();
        log::trace!("layout pass over {} characters", source.len());

        let breaker = LineBreaker::new(config, glyphs, &source, buffers);
        let broken = breaker.run();

        let mut layout = TextLayout {
            config: config.clone(),
            total_width: broken.total_width,
            total_height: broken.total_height,
            extents: Extents::ZERO,
            characters: broken.buffers.characters,
            lines: broken.buffers.lines,
            words: broken.buffers.words,
            links: broken.buffers.links,
            sprites: broken.buffers.sprites,
            pages: broken.buffers.pages,
            diagnostics: broken.buffers.diagnostics,
        };

        align_lines(&mut layout, &broken.line_ends, &broken.page_heights);

        log::trace!(
            "layout produced {} lines, {} words, {} pages",
            layout.lines.len(),
            layout.words.len(),
            layout.pages.len()
        );
        layout
    }
}

/// Stage two: horizontal and vertical alignment, then extents.
fn align_lines(layout: &mut TextLayout, line_ends: &[LineEnd], page_heights: &[f32]) {
    let config = &layout.config;
    let container_width = config.max_width.unwrap_or(layout.total_width);
    let target_height = config.max_height.unwrap_or(layout.total_height);

    let mut page_of_line = Vec::with_capacity(layout.lines.len());
    for line in &layout.lines {
        page_of_line.push(
            layout
                .characters
                .get(line.first_character_index)
                .map(|info| info.page_number)
                .unwrap_or(0),
        );
    }

    for (index, line) in layout.lines.iter_mut().enumerate() {
        let available = (container_width - line.margin_left - line.margin_right).max(0.0);
        let slack = available - line.length;
        let page_height = page_heights
            .get(page_of_line[index])
            .copied()
            .unwrap_or(layout.total_height);

        let vertical_offset = match config.vertical_align {
            VerticalAlign::Top => 0.0,
            VerticalAlign::Middle => (target_height - page_height) / 2.0,
            VerticalAlign::Bottom => target_height - page_height,
        };

        let end = line_ends.get(index).copied().unwrap_or(LineEnd::EndOfText);
        let stretch = match line.alignment {
            HorizontalAlign::Justified => end == LineEnd::Wrap,
            HorizontalAlign::Flush => true,
            _ => false,
        };
        let horizontal_offset = line.margin_left
            + match line.alignment {
                HorizontalAlign::Center => slack / 2.0,
                HorizontalAlign::Right => slack,
                _ => 0.0,
            };

        let characters =
            &mut layout.characters[line.first_character_index..=line.last_character_index];
        let inner = line.first_visible_character_index..line.last_visible_character_index;
        let is_gap = |character_index: usize, info: &CharacterInfo| {
            is_stretchable_space(info.character) && inner.contains(&character_index)
        };
        let gaps = if stretch && slack > 0.0 && line.visible_character_count > 0 {
            characters
                .iter()
                .enumerate()
                .filter(|(offset, info)| is_gap(line.first_character_index + offset, info))
                .count()
        } else {
            0
        };
        let gap_width = if gaps > 0 { slack / gaps as f32 } else { 0.0 };

        let mut gaps_passed = 0usize;
        let mut extents = Extents::UNINITIALIZED;
        for (offset, info) in characters.iter_mut().enumerate() {
            let character_index = line.first_character_index + offset;
            let dx = horizontal_offset + gap_width * gaps_passed as f32;
            info.translate(dx, vertical_offset);
            if info.is_visible {
                extents.include(&info.extents());
            }
            if gap_width > 0.0 && is_gap(character_index, info) {
                gaps_passed += 1;
            }
        }

        line.width = available;
        line.ascender += vertical_offset;
        line.baseline += vertical_offset;
        line.descender += vertical_offset;
        if gap_width > 0.0 {
            line.length = available;
        }
        line.line_extents = extents.or_zero();
    }

    for word in &mut layout.words {
        let mut extents = Extents::UNINITIALIZED;
        for info in layout
            .characters
            .get(word.first_character_index..=word.last_character_index)
            .unwrap_or_default()
        {
            if info.is_visible {
                extents.include(&info.extents());
            }
        }
        word.extents = extents.or_zero();
    }

    for page in &mut layout.pages {
        let page_number = layout
            .characters
            .get(page.first_character_index)
            .map(|info| info.page_number)
            .unwrap_or(0);
        let page_height = page_heights
            .get(page_number)
            .copied()
            .unwrap_or(layout.total_height);
        let vertical_offset = match config.vertical_align {
            VerticalAlign::Top => 0.0,
            VerticalAlign::Middle => (target_height - page_height) / 2.0,
            VerticalAlign::Bottom => target_height - page_height,
        };
        page.ascender += vertical_offset;
        page.baseline += vertical_offset;
        page.descender += vertical_offset;
    }

    let mut block = Extents::UNINITIALIZED;
    for line in &layout.lines {
        if line.visible_character_count > 0 {
            block.include(&line.line_extents);
        }
    }
    layout.extents = block.or_zero();
}

fn is_stretchable_space(character: char) -> bool {
    character.is_whitespace() && !character.is_control()
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::info::ElementKind;
    use crate::text::style_stack::FontStyle;
    use crate::text::test_utils::{ALT_MATERIAL, MonoGlyphs};

    fn config(max_width: Option<f32>) -> TextLayoutConfig {
        TextLayoutConfig {
            max_width,
            font_size: 10.0,
            ..Default::default()
        }
    }

    fn run(text: &str, config: &TextLayoutConfig) -> TextLayout {
        TextData::new(text).layout(config, &mut MonoGlyphs::new())
    }

    fn assert_contiguous(layout: &TextLayout) {
        let mut next = 0;
        for line in &layout.lines {
            assert_eq!(line.first_character_index, next);
            assert!(line.last_character_index >= line.first_character_index);
            next = line.last_character_index + 1;
        }
        assert_eq!(next, layout.characters.len());
    }

    #[test]
    fn color_tag_styles_enclosed_word_only() {
        let layout = run("<color=red>Hello</color> world", &config(None));
        assert_eq!(layout.characters.len(), 11);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.words.len(), 2);
        assert_eq!(layout.word_text(0).unwrap(), "Hello");
        assert_eq!(layout.word_text(1).unwrap(), "world");
        assert_eq!(layout.characters[0].style.color, rgb(255, 0, 0));
        assert_eq!(layout.characters[6].style.color, rgb(255, 255, 255));
        assert!(layout.diagnostics.is_empty());
    }

    #[test]
    fn words_rebuild_visible_line_text() {
        let text = "<b>The</b> quick <color=red>brown fox</color> jumps <size=120%>over</size> the lazy dog";
        let layout = run(text, &config(Some(100.0)));
        assert!(layout.lines.len() >= 3);
        assert_contiguous(&layout);

        for word in &layout.words {
            let owners = layout
                .lines
                .iter()
                .filter(|line| {
                    line.contains(word.first_character_index) && line.contains(word.last_character_index)
                })
                .count();
            assert_eq!(owners, 1);
        }

        for (index, line) in layout.lines.iter().enumerate() {
            let words: Vec<&WordInfo> = layout
                .words
                .iter()
                .filter(|word| line.contains(word.first_character_index))
                .collect();
            assert_eq!(words.len(), line.word_count);

            let mut rebuilt = String::new();
            for (position, word) in words.iter().enumerate() {
                if position > 0 {
                    let separator = &layout.characters
                        [words[position - 1].last_character_index + 1..word.first_character_index];
                    rebuilt.extend(separator.iter().map(|info| info.character));
                }
                rebuilt.push_str(&word.text(&layout.characters));
            }
            assert_eq!(rebuilt, layout.visible_line_text(index).unwrap());
        }
    }

    #[test]
    fn unbounded_tag_length_still_parses_tags() {
        let config = TextLayoutConfig {
            max_tag_length: usize::MAX,
            ..config(None)
        };
        let layout = run("a<b>c</b>", &config);
        assert_eq!(layout.characters.len(), 2);
        assert!(layout.characters[1].style.font_styles.contains(FontStyle::Bold));
        assert!(layout.diagnostics.is_empty());
    }

    #[test]
    fn extents_far_from_origin() {
        let config = TextLayoutConfig {
            horizontal_align: HorizontalAlign::Right,
            ..config(Some(50000.0))
        };
        let layout = run("ab", &config);
        assert_eq!(layout.lines[0].line_extents.min.x, 49980.0);
        assert_eq!(layout.words[0].extents.min.x, 49980.0);
        assert_eq!(layout.extents.min.x, 49980.0);
    }

    #[test]
    fn long_word_is_split_between_characters() {
        let layout = run("aaaaaaaaaa", &config(Some(50.0)));
        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.words.len(), 2);
        assert_eq!(layout.line_text(0).unwrap(), "aaaaa");
        assert_eq!(layout.line_text(1).unwrap(), "aaaaa");
        assert_eq!(layout.characters[5].origin, 0.0);
        assert_eq!(layout.characters[5].line_number, 1);
        assert_contiguous(&layout);
    }

    #[test]
    fn line_break_tag_forces_a_new_line() {
        let layout = run("Hello<br>world", &config(None));
        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.characters.len(), 11);
        assert_eq!(layout.characters[5].kind, ElementKind::Control);
        assert_eq!(layout.lines[0].control_character_count(), 1);
        assert_eq!(layout.visible_line_text(0).unwrap(), "Hello");
        assert_eq!(layout.line_text(1).unwrap(), "world");
        assert_contiguous(&layout);
    }

    #[test]
    fn unmatched_close_tag_is_dropped() {
        let layout = run("Hello</color> world", &config(None));
        assert_eq!(layout.characters.len(), 11);
        assert!(layout.diagnostics.is_empty());
        assert!(
            layout
                .characters
                .iter()
                .all(|info| info.style.color == rgb(255, 255, 255))
        );

        let strict = TextLayoutConfig {
            tag_strictness: TagStrictness::Strict,
            ..config(None)
        };
        let layout = run("Hello</color> world", &strict);
        assert_eq!(
            layout.diagnostics,
            vec![LayoutWarning::ImbalancedTag {
                tag: "color".into(),
                position: 5
            }]
        );
    }

    #[test]
    fn words_wrap_at_the_last_space() {
        let layout = run("Hello world", &config(Some(80.0)));
        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.line_text(0).unwrap(), "Hello ");
        assert_eq!(layout.line_text(1).unwrap(), "world");
        assert_eq!(layout.words.len(), 2);
        assert_eq!(layout.lines[0].length, 50.0);
        assert_eq!(layout.lines[0].word_count, 1);
        assert_eq!(layout.lines[0].space_count, 1);

        assert_eq!(layout.lines[0].baseline, 8.0);
        assert_eq!(layout.lines[0].line_height, 10.0);
        assert_eq!(layout.lines[1].baseline, 18.0);
        assert_eq!(layout.characters[6].baseline, 18.0);
        assert_eq!(layout.characters[6].origin, 0.0);
        assert_contiguous(&layout);
    }

    #[test]
    fn hyphen_is_a_break_opportunity() {
        let layout = run("well-known", &config(Some(70.0)));
        assert_eq!(layout.line_text(0).unwrap(), "well-");
        assert_eq!(layout.line_text(1).unwrap(), "known");
        assert_eq!(layout.word_text(0).unwrap(), "well-");
    }

    #[test]
    fn nobr_keeps_words_together() {
        let layout = run("aa <nobr>bb cc</nobr>", &config(Some(70.0)));
        assert_eq!(layout.line_text(0).unwrap(), "aa ");
        assert_eq!(layout.line_text(1).unwrap(), "bb cc");
    }

    #[test]
    fn backtracking_drops_diagnostics_of_the_rewound_span() {
        let layout = run("aa <foo>bbbbbb", &config(Some(50.0)));
        assert_eq!(layout.diagnostics.len(), 1);
        assert!(matches!(
            layout.diagnostics[0],
            LayoutWarning::MalformedTag { position: 3, .. }
        ));
        assert_eq!(layout.line_text(0).unwrap(), "aa ");
    }

    #[test]
    fn layout_is_deterministic() {
        let text = "<b>Lorem</b> ipsum <color=#00ff00>dolor sit</color> amet, <i>consectetur</i>";
        let config = config(Some(90.0));
        assert_eq!(run(text, &config), run(text, &config));
    }

    #[test]
    fn alignment_offsets_lines() {
        let centered = TextLayoutConfig {
            horizontal_align: HorizontalAlign::Center,
            ..config(Some(100.0))
        };
        assert_eq!(run("ab", &centered).characters[0].origin, 40.0);

        let right = run("<align=right>ab</align>", &config(Some(100.0)));
        assert_eq!(right.characters[0].origin, 80.0);
        assert_eq!(right.lines[0].alignment, HorizontalAlign::Right);
    }

    #[test]
    fn justified_lines_stretch_except_paragraph_end() {
        let justified = TextLayoutConfig {
            horizontal_align: HorizontalAlign::Justified,
            ..config(Some(60.0))
        };
        let layout = run("aa bb cc dd", &justified);
        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.characters[3].origin, 40.0);
        assert_eq!(layout.characters[4].x_advance, 60.0);
        assert_eq!(layout.characters[9].origin, 30.0);

        let flush = TextLayoutConfig {
            horizontal_align: HorizontalAlign::Flush,
            ..config(Some(60.0))
        };
        let layout = run("aa bb cc dd", &flush);
        assert_eq!(layout.characters[9].origin, 40.0);
    }

    #[test]
    fn margins_and_indent_shift_the_line() {
        let layout = run("<indent=20>ab", &config(None));
        assert_eq!(layout.characters[0].origin, 20.0);

        let margins = TextLayoutConfig {
            margin_left: 5.0,
            margin_right: 5.0,
            ..config(Some(40.0))
        };
        let layout = run("abcd", &margins);
        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.characters[0].origin, 5.0);
        assert_eq!(layout.lines[0].width, 30.0);
    }

    #[test]
    fn tag_overflow_falls_back_to_literal_text() {
        let shallow = TextLayoutConfig {
            max_nesting_depth: 1,
            ..config(None)
        };
        let layout = run("<b><b>x", &shallow);
        let text: String = layout.characters.iter().map(|info| info.character).collect();
        assert_eq!(text, "<b>x");
        assert_eq!(
            layout.diagnostics,
            vec![LayoutWarning::TagOverflow {
                tag: "b".into(),
                position: 3,
                capacity: 1
            }]
        );
        assert!(layout.characters[3].style.font_styles.contains(FontStyle::Bold));
    }

    #[test]
    fn malformed_tags_are_text() {
        let layout = run("a<foo>b", &config(None));
        assert_eq!(layout.characters.len(), 7);
        assert!(matches!(
            layout.diagnostics[0],
            LayoutWarning::MalformedTag { position: 1, .. }
        ));

        let plain = TextLayoutConfig {
            rich_text: false,
            ..config(None)
        };
        let layout = run("<b>x</b>", &plain);
        assert_eq!(layout.characters.len(), 8);
        assert!(layout.diagnostics.is_empty());
    }

    #[test]
    fn noparse_content_is_literal() {
        let layout = run("<noparse><b></noparse>x", &config(None));
        let text: String = layout.characters.iter().map(|info| info.character).collect();
        assert_eq!(text, "<b>x");
        assert!(layout.characters[3].style.font_styles.is_normal());
    }

    #[test]
    fn links_record_identifier_and_text() {
        let layout = run("see <link=\"docs\">here</link> now", &config(None));
        assert_eq!(layout.links.len(), 1);
        assert_eq!(layout.links[0].link_id(), "docs");
        assert_eq!(layout.link_text(0).unwrap(), "here");
        assert_eq!(layout.links[0].link_id_length, 4);
        assert!(layout.find_link("docs").is_some());
        assert!(layout.find_link("missing").is_none());
    }

    #[test]
    fn sprites_are_placed_inline() {
        let layout = run("a<sprite=2>b", &config(None));
        assert_eq!(layout.characters.len(), 3);
        assert_eq!(layout.characters[1].kind, ElementKind::Sprite);
        assert_eq!(layout.characters[2].origin, 20.0);
        assert_eq!(
            layout.sprites,
            vec![SpriteInfo {
                sprite_index: 2,
                character_index: 1,
                vertex_index: 4
            }]
        );

        let layout = run("<sprite=9>", &config(None));
        assert!(layout.sprites.is_empty());
        assert_eq!(layout.characters.len(), 10);
        assert_eq!(layout.diagnostics.len(), 1);
    }

    #[test]
    fn scripts_scale_and_shift_the_baseline() {
        let layout = run("x<sup>2</sup>", &config(None));
        let base = &layout.characters[0];
        let script = &layout.characters[1];
        assert_eq!(script.style.point_size, 5.0);
        assert!((script.style.baseline_offset - 3.5).abs() < 1e-4);
        assert!((script.baseline - (base.baseline - 3.5)).abs() < 1e-4);

        let layout = run("x<sub>2</sub>", &config(None));
        let drop = layout.characters[1].baseline - layout.characters[0].baseline;
        assert!((drop - 1.5).abs() < 1e-4);
    }

    #[test]
    fn case_styles_transform_characters() {
        let layout = run("<smallcaps>aB</smallcaps><uppercase>c</uppercase>", &config(None));
        let text: String = layout.characters.iter().map(|info| info.character).collect();
        assert_eq!(text, "ABC");
        assert_eq!(layout.characters[0].style.point_size, 8.0);
        assert_eq!(layout.characters[1].style.point_size, 10.0);
    }

    #[test]
    fn nested_relative_sizes_compound() {
        let layout = run("<size=200%><size=50%>a</size>b</size>c", &config(None));
        assert_eq!(layout.characters[0].style.point_size, 10.0);
        assert_eq!(layout.characters[1].style.point_size, 20.0);
        assert_eq!(layout.characters[2].style.point_size, 10.0);
    }

    #[test]
    fn spacing_tags_adjust_advances() {
        assert_eq!(run("AV", &config(None)).characters[1].origin, 8.0);
        assert_eq!(run("<cspace=5>ab", &config(None)).characters[1].origin, 15.0);

        let mono = run("<mspace=20>ab", &config(None));
        assert_eq!(mono.characters[1].origin, 20.0);
        assert_eq!(mono.characters[0].top_left.x, 5.0);

        assert_eq!(run("\ta", &config(None)).characters[1].origin, 40.0);
    }

    #[test]
    fn missing_glyphs_use_the_substitute() {
        let config = config(None);
        let layout = TextData::new("z").layout(&config, &mut MonoGlyphs::without(&['z']));
        assert!(layout.characters[0].is_visible);
        assert_eq!(layout.characters[0].character, 'z');

        let layout =
            TextData::new("z").layout(&config, &mut MonoGlyphs::without(&['z', '\u{25A1}']));
        assert!(!layout.characters[0].is_visible);
        assert!(layout.characters[0].glyph.is_none());
    }

    #[test]
    fn font_tag_selects_material() {
        let layout = run("<font=\"mono-alt\">a</font>b", &config(None));
        assert_eq!(layout.characters[0].style.material, ALT_MATERIAL);
        assert_eq!(layout.characters[1].style.material, MaterialRef::default());

        let layout = run("<font=\"nope\">a", &config(None));
        assert_eq!(layout.diagnostics.len(), 1);
    }

    #[test]
    fn truncate_hides_the_rest_of_the_word() {
        let truncate = TextLayoutConfig {
            overflow: OverflowMode::Truncate,
            ..config(Some(50.0))
        };
        let layout = run("aaaaaaa", &truncate);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.visible_line_text(0).unwrap(), "aaaaa");
        assert_eq!(
            layout.diagnostics,
            vec![LayoutWarning::OverflowPolicyViolation {
                line: 0,
                character_index: 0,
                policy: OverflowMode::Truncate
            }]
        );
    }

    #[test]
    fn ellipsis_replaces_the_last_fitting_character() {
        let ellipsis = TextLayoutConfig {
            overflow: OverflowMode::Ellipsis,
            ..config(Some(50.0))
        };
        let layout = run("aaaaaaa", &ellipsis);
        assert_eq!(layout.visible_line_text(0).unwrap(), "aaaa\u{2026}");
        assert!(!layout.characters[4].is_visible);
        assert_eq!(layout.characters[5].character, '\u{2026}');
        assert_eq!(layout.characters[5].origin, 40.0);
        assert_eq!(layout.characters[5].source_index, 5);
        assert_eq!(layout.lines[0].length, 50.0);
    }

    #[test]
    fn overflow_mode_lets_words_run_past_the_edge() {
        let overflow = TextLayoutConfig {
            overflow: OverflowMode::Overflow,
            ..config(Some(50.0))
        };
        let layout = run("aaaaaaa", &overflow);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].length, 70.0);
        assert_eq!(layout.diagnostics.len(), 1);

        let no_wrap = TextLayoutConfig {
            wrap_style: WrapStyle::NoWrap,
            ..config(Some(50.0))
        };
        let layout = run("aaa aaa", &no_wrap);
        assert_eq!(layout.lines.len(), 1);
        assert!(layout.diagnostics.is_empty());
    }

    #[test]
    fn char_wrap_breaks_anywhere() {
        let char_wrap = TextLayoutConfig {
            wrap_style: WrapStyle::CharWrap,
            ..config(Some(30.0))
        };
        let layout = run("abcd ef", &char_wrap);
        assert_eq!(layout.lines.len(), 3);
        assert_eq!(layout.line_text(0).unwrap(), "abc");
        assert_eq!(layout.line_text(1).unwrap(), "d e");
        assert_eq!(layout.line_text(2).unwrap(), "f");
        assert_contiguous(&layout);
    }

    #[test]
    fn pages_split_at_max_height() {
        let paged = TextLayoutConfig {
            paginate: true,
            max_height: Some(25.0),
            ..config(None)
        };
        let layout = run("a\nb\nc", &paged);
        assert_eq!(layout.pages.len(), 2);
        assert_eq!(layout.pages[0].first_character_index, 0);
        assert_eq!(layout.pages[0].last_character_index, 3);
        assert_eq!(layout.pages[1].first_character_index, 4);
        assert_eq!(layout.characters[4].page_number, 1);
        assert_eq!(layout.lines[2].baseline, 8.0);

        let layout = run("a<page>b", &config(None));
        assert_eq!(layout.pages.len(), 2);
        assert_eq!(layout.lines.len(), 2);
    }

    #[test]
    fn vertical_alignment_moves_the_block() {
        let middle = TextLayoutConfig {
            vertical_align: VerticalAlign::Middle,
            max_height: Some(100.0),
            ..config(None)
        };
        let layout = run("a", &middle);
        assert_eq!(layout.characters[0].baseline, 53.0);
        assert_eq!(layout.lines[0].baseline, 53.0);
        assert_eq!(layout.pages[0].baseline, 53.0);
    }

    #[test]
    fn extents_contain_their_parts() {
        let layout = run("ab", &config(None));
        assert_eq!(
            layout.extents,
            Extents::new(euclid::point2(0.0, 0.0), euclid::point2(20.0, 10.0))
        );

        let layout = run("<i>Lorem</i> ipsum dolor <size=20>sit</size> amet", &config(Some(80.0)));
        for line in &layout.lines {
            assert!(layout.extents.contains(&line.line_extents));
            for info in &layout.characters[line.first_character_index..=line.last_character_index] {
                if info.is_visible {
                    assert!(line.line_extents.contains(&info.extents()));
                }
            }
        }
        for word in &layout.words {
            assert!(layout.extents.contains(&word.extents));
        }
    }

    #[test]
    fn italic_shear_widens_the_box() {
        let layout = run("<i>a</i>", &config(None));
        let info = &layout.characters[0];
        assert!(info.style.font_styles.contains(FontStyle::Italic));
        assert_eq!(info.style.italic_angle, 15.0);
        assert!(info.bottom_right.x > 10.0);
        assert!(info.top_left.x < 0.0);
    }

    #[test]
    fn preferred_size_and_spacing() {
        let layout = run("abc\na", &config(None));
        assert_eq!(layout.total_width, 30.0);
        assert_eq!(layout.total_height, 20.0);
        assert_eq!(
            TextData::new("abc\na").measure(&config(None), &mut MonoGlyphs::new()),
            [30.0, 20.0]
        );

        let spaced = TextLayoutConfig {
            line_spacing: 5.0,
            paragraph_spacing: 2.0,
            ..config(None)
        };
        let layout = run("a\nb", &spaced);
        assert_eq!(layout.lines[1].baseline, 25.0);
    }

    #[test]
    fn unclosed_tags_are_reported_when_strict() {
        let strict = TextLayoutConfig {
            tag_strictness: TagStrictness::Strict,
            ..config(None)
        };
        let layout = run("<b><color=red>a", &strict);
        assert_eq!(
            layout.diagnostics,
            vec![
                LayoutWarning::ImbalancedTag {
                    tag: "color".into(),
                    position: 15
                },
                LayoutWarning::ImbalancedTag {
                    tag: "b".into(),
                    position: 15
                },
            ]
        );
        assert!(run("<b><color=red>a", &config(None)).diagnostics.is_empty());
    }

    #[test]
    fn empty_text_has_no_records() {
        let layout = run("", &config(Some(100.0)));
        assert!(layout.characters.is_empty());
        assert!(layout.lines.is_empty());
        assert!(layout.pages.is_empty());
        assert_eq!(layout.extents, Extents::ZERO);
        assert_eq!(layout.total_height, 0.0);
    }

    #[test]
    fn buffers_round_trip_through_layout() {
        let config = config(Some(50.0));
        let first = run("aaaaaaaaaa", &config);
        let expected = first.clone();
        let buffers = first.into_buffers();
        let again =
            TextData::new("aaaaaaaaaa").layout_with_buffers(&config, &mut MonoGlyphs::new(), buffers);
        assert_eq!(again, expected);
    }
}
