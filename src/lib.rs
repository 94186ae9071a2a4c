//! # Sumi
//!
//! A rich-text paragraph layout library for Rust.
//!
//! ## Overview
//!
//! `Sumi` turns marked-up text into positioned characters, lines, words,
//! links, sprites and pages. Inline tags such as `<b>`, `<color=red>` or
//! `<size=150%>` change the style of the text they enclose; lines are
//! wrapped at word boundaries by a backtracking line breaker.
//!
//! Glyph metrics come from a [`GlyphSource`]. [`FontStorage`] implements it
//! with `fontdb` and `fontdue`, and [`FontSystem`] wraps storage and a pool
//! of output buffers behind locks.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sumi::{FontSystem, text::{TextData, TextLayoutConfig}};
//!
//! let font_system = FontSystem::new();
//! font_system.load_system_fonts();
//! font_system.register_query(
//!     "sans",
//!     &sumi::fontdb::Query {
//!         families: &[sumi::fontdb::Family::SansSerif],
//!         ..Default::default()
//!     },
//! );
//!
//! let config = TextLayoutConfig {
//!     max_width: Some(320.0),
//!     ..Default::default()
//! };
//! let data = TextData::new("Hello <color=red>world</color>!");
//! let layout = font_system.layout_text(&data, &config);
//! for line in &layout.lines {
//!     println!("{}", line.text(&layout.characters));
//! }
//! font_system.recycle(layout);
//! ```
//!
//! ## Features
//!
//! *   **Rich text**: Nested style tags with per-dimension stacks.
//! *   **Word wrap**: Backtracking line breaks, justification and overflow policies.
//! *   **Font Management**: Easy loading of system fonts and custom font files.
//! *   **Thread Safety**: Designed with internal locking for safe concurrent use.

pub mod error;
pub mod font_storage;
pub mod font_system;
pub mod glyph;
pub mod glyph_id;
pub mod pool;
pub mod text;

// common re-exports
pub use error::{LayoutWarning, MarkupError, StyleStackError};
pub use font_storage::FontStorage;
pub use font_system::FontSystem;
pub use glyph::{GlyphSource, MaterialRef};
pub use glyph_id::GlyphId;
pub use pool::{BufferPool, LayoutBuffers};

// re-export dependencies
pub use fontdb;
pub use fontdue;
pub use palette;
pub use parking_lot;
