/// Marked-up source text of one paragraph block.
///
/// The content may contain inline tags such as `<b>` or `<color=red>`; they
/// are interpreted during layout when
/// [`TextLayoutConfig::rich_text`](crate::text::TextLayoutConfig::rich_text)
/// is set. Keeping the source here lets the caller lay out the same text
/// repeatedly with different configurations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextData {
    /// The marked-up source text.
    pub content: String,
}

impl TextData {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Appends text to the end of the source.
    ///
    /// Tags may span multiple appends; nothing is parsed until layout.
    pub fn append(&mut self, text: &str) {
        self.content.push_str(text);
    }

    /// Removes all text so the builder can be reused.
    pub fn clear(&mut self) {
        self.content.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl From<&str> for TextData {
    fn from(content: &str) -> Self {
        Self::new(content)
    }
}

impl From<String> for TextData {
    fn from(content: String) -> Self {
        Self::new(content)
    }
}
