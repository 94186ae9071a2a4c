use std::{path::PathBuf, sync::Arc};

use parking_lot::Mutex;

use crate::{
    font_storage::FontStorage,
    glyph::MaterialRef,
    pool::BufferPool,
    text::{TextData, TextLayout, TextLayoutConfig},
};

/// High-level entry point for the layout system.
///
/// This struct coordinates `FontStorage` and a `BufferPool` of layout
/// buffers. It provides a unified interface for loading fonts, registering
/// materials and laying out text.
///
/// Use `Mutex` to allow shared mutable access, which is common in UI frameworks.
///
/// The fields are public to allow direct access to the underlying storage and pool when necessary
/// (e.g. to lay out several blocks under a single lock).
pub struct FontSystem {
    /// The underlying font storage.
    pub font_storage: Mutex<FontStorage>,
    /// Buffers recycled between layout passes.
    pub buffer_pool: Mutex<BufferPool>,
}

impl Default for FontSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FontSystem {
    /// Creates a new font system with default storage and buffer pool.
    pub fn new() -> Self {
        Self {
            font_storage: Mutex::new(FontStorage::new()),
            buffer_pool: Mutex::new(BufferPool::default()),
        }
    }

    /// Creates a font system whose pool uses the given `(capacity, max_idle)` classes.
    pub fn with_pool_classes(classes: &[(usize, usize)]) -> Self {
        Self {
            font_storage: Mutex::new(FontStorage::new()),
            buffer_pool: Mutex::new(BufferPool::new(classes)),
        }
    }
}

/// font storage initialization
impl FontSystem {
    /// Loads the system fonts into the storage.
    pub fn load_system_fonts(&self) {
        self.font_storage.lock().load_system_fonts();
    }

    /// Loads a font from binary data.
    pub fn load_font_binary(&self, data: impl Into<Vec<u8>>) {
        self.font_storage.lock().load_font_binary(data);
    }

    /// Loads a font from a file path.
    pub fn load_font_file(&self, path: PathBuf) -> Result<(), std::io::Error> {
        self.font_storage.lock().load_font_file(path)
    }

    /// Loads all fonts from a directory.
    pub fn load_fonts_dir(&self, dir: PathBuf) {
        self.font_storage.lock().load_fonts_dir(dir)
    }

    pub fn is_empty(&self) -> bool {
        self.font_storage.lock().is_empty()
    }

    /// Returns the number of loaded faces.
    pub fn len(&self) -> usize {
        self.font_storage.lock().len()
    }

    /// Queries for a font matching the description.
    pub fn query(&self, query: &fontdb::Query) -> Option<(fontdb::ID, Arc<fontdue::Font>)> {
        self.font_storage.lock().query(query)
    }
}

/// materials
impl FontSystem {
    /// Registers a face as a material selectable with `<font="name">`.
    pub fn register_material(&self, name: impl Into<String>, id: fontdb::ID) -> MaterialRef {
        self.font_storage.lock().register_material(name, id)
    }

    /// Queries for a face and registers it as a material.
    pub fn register_query(
        &self,
        name: impl Into<String>,
        query: &fontdb::Query,
    ) -> Option<MaterialRef> {
        self.font_storage.lock().register_query(name, query)
    }
}

/// text layout
impl FontSystem {
    /// Performs text layout using the fonts in this system.
    ///
    /// Output buffers are taken from the pool; give them back with
    /// [`Self::recycle`] once the layout is no longer needed.
    pub fn layout_text(&self, data: &TextData, config: &TextLayoutConfig) -> TextLayout {
        let buffers = self
            .buffer_pool
            .lock()
            .checkout(data.content.chars().count());
        let mut storage = self.font_storage.lock();
        data.layout_with_buffers(config, &mut *storage, buffers)
    }

    /// Returns `[width, height]` of the laid out text.
    pub fn measure_text(&self, data: &TextData, config: &TextLayoutConfig) -> [f32; 2] {
        let layout = self.layout_text(data, config);
        let size = [layout.total_width, layout.total_height];
        self.recycle(layout);
        size
    }

    /// Returns the buffers of a finished layout to the pool.
    pub fn recycle(&self, layout: TextLayout) {
        self.buffer_pool.lock().checkin(layout.into_buffers());
    }
}
