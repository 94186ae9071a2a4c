//! Error and diagnostic types.
//!
//! A layout pass never fails. Every problem found in the markup or in the
//! geometry is recovered locally and reported as a [`LayoutWarning`] in
//! [`TextLayout::diagnostics`](crate::text::TextLayout::diagnostics).

use thiserror::Error;

use crate::text::{OverflowMode, StyleDimension};

/// Recovered problem reported by a layout pass.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum LayoutWarning {
    /// A `<` that looked like a tag could not be parsed. It was laid out as
    /// literal text.
    #[error("malformed tag at source index {position}: {reason}")]
    MalformedTag { position: usize, reason: String },

    /// A closing tag had no matching open tag, or an open tag was never closed.
    #[error("imbalanced <{tag}> tag at source index {position}")]
    ImbalancedTag { tag: String, position: usize },

    /// Opening the tag would exceed the configured nesting depth. The tag was
    /// laid out as literal text.
    #[error("<{tag}> at source index {position} exceeds nesting depth {capacity}")]
    TagOverflow {
        tag: String,
        position: usize,
        capacity: usize,
    },

    /// A single word is wider than the line and could not be broken.
    #[error("word starting at character {character_index} overflows line {line} ({policy:?})")]
    OverflowPolicyViolation {
        line: usize,
        character_index: usize,
        policy: OverflowMode,
    },
}

/// Failure of a single [`StyleStack`](crate::text::StyleStack) operation.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleStackError {
    #[error("style stack is full (capacity {capacity})")]
    Overflow { capacity: usize },
    #[error("style stack is already at its base value")]
    Underflow,
}

/// Failure to recognize a tag at a `<` delimiter.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum MarkupError {
    /// The delimiter does not start anything tag shaped.
    #[error("not a tag")]
    NotATag,
    /// The delimiter starts a tag but its name or attributes are invalid.
    #[error("malformed tag: {reason}")]
    Malformed { reason: String },
}

impl MarkupError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Dimension that was left open at the end of the text.
pub(crate) fn unclosed_warning(dimension: StyleDimension, position: usize) -> LayoutWarning {
    LayoutWarning::ImbalancedTag {
        tag: dimension.tag_name().to_string(),
        position,
    }
}
