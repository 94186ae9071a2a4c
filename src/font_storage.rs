use std::{collections::HashMap, path::PathBuf, sync::Arc};

use crate::glyph::{FaceMetrics, GlyphMetrics, GlyphRequest, GlyphSource, MaterialRef};
use crate::glyph_id::GlyphId;

/// Manages font loading and retrieval using `fontdb` and `fontdue`.
///
/// This struct combines a database of available fonts (`fontdb`) with a cache of loaded
/// font instances (`fontdue`). Faces used for layout are registered as materials; a
/// [`MaterialRef`] is the slot a face was registered under. Bold and italic variants
/// requested during layout are resolved through `fontdb` and get slots of their own.
pub struct FontStorage {
    /// This is the font set that has been loaded by fontdb.
    font_db: fontdb::Database,
    /// This is the font that has been loaded by fontdue.
    /// Not all fonts in fontdb are necessarily loaded here.
    loaded_font: HashMap<fontdb::ID, Arc<fontdue::Font>, fxhash::FxBuildHasher>,

    materials: Vec<fontdb::ID>,
    material_names: HashMap<String, MaterialRef, fxhash::FxBuildHasher>,
    /// (base material, weight, italic) -> material of the matching face
    variants: HashMap<(MaterialRef, u16, bool), MaterialRef, fxhash::FxBuildHasher>,
}

impl Default for FontStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FontStorage {
    /// Creates a new empty font storage.
    pub fn new() -> Self {
        Self {
            font_db: fontdb::Database::new(),
            loaded_font: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            materials: Vec::new(),
            material_names: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            variants: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
        }
    }
}

/// Loading fonts into fontdb.
impl FontStorage {
    pub fn load_font_binary(&mut self, data: impl Into<Vec<u8>>) {
        self.font_db.load_font_data(data.into());
    }

    pub fn load_font_file(&mut self, path: PathBuf) -> Result<(), std::io::Error> {
        self.font_db.load_font_file(path)
    }

    pub fn load_fonts_dir(&mut self, dir: PathBuf) {
        self.font_db.load_fonts_dir(dir)
    }

    pub fn load_system_fonts(&mut self) {
        self.font_db.load_system_fonts();
    }

    pub fn is_empty(&self) -> bool {
        self.font_db.is_empty()
    }

    /// Returns the number of loaded faces.
    pub fn len(&self) -> usize {
        self.font_db.len()
    }

    pub fn faces(&self) -> impl Iterator<Item = &fontdb::FaceInfo> {
        self.font_db.faces()
    }
}

/// Materials
impl FontStorage {
    /// Registers a face as a material that `<font="name">` can select.
    ///
    /// The first registered material gets slot 0, which is the default
    /// material of [`TextLayoutConfig`](crate::text::TextLayoutConfig).
    /// Registering an existing name points it at the new face.
    pub fn register_material(&mut self, name: impl Into<String>, id: fontdb::ID) -> MaterialRef {
        let material = self.push_material(id);
        self.material_names.insert(name.into(), material);
        material
    }

    /// Queries fontdb and registers the best match under `name`.
    pub fn register_query(
        &mut self,
        name: impl Into<String>,
        query: &fontdb::Query,
    ) -> Option<MaterialRef> {
        let id = self.font_db.query(query)?;
        Some(self.register_material(name, id))
    }

    /// Returns the face a material slot refers to.
    pub fn material_face(&self, material: MaterialRef) -> Option<fontdb::ID> {
        self.materials.get(material.0 as usize).copied()
    }

    fn push_material(&mut self, id: fontdb::ID) -> MaterialRef {
        if let Some(index) = self.materials.iter().position(|face| *face == id) {
            return MaterialRef(index as u32);
        }
        self.materials.push(id);
        MaterialRef(self.materials.len() as u32 - 1)
    }

    /// Resolves the weight and slant of a request to a face of the same family.
    fn styled_material(&mut self, material: MaterialRef, weight: u16, italic: bool) -> MaterialRef {
        if let Some(variant) = self.variants.get(&(material, weight, italic)) {
            return *variant;
        }

        let variant = self
            .material_face(material)
            .and_then(|id| self.font_db.face(id))
            .and_then(|face| {
                let (family, _) = face.families.first()?;
                let family = family.clone();
                if face.weight.0 == weight && (face.style != fontdb::Style::Normal) == italic {
                    return None;
                }
                self.font_db.query(&fontdb::Query {
                    families: &[fontdb::Family::Name(&family)],
                    weight: fontdb::Weight(weight),
                    stretch: fontdb::Stretch::Normal,
                    style: if italic {
                        fontdb::Style::Italic
                    } else {
                        fontdb::Style::Normal
                    },
                })
            })
            .map(|id| self.push_material(id))
            .unwrap_or(material);

        log::trace!("material {material:?} at weight {weight}, italic {italic} -> {variant:?}");
        self.variants.insert((material, weight, italic), variant);
        variant
    }

    fn material_font(&mut self, material: MaterialRef) -> Option<Arc<fontdue::Font>> {
        let id = self.material_face(material)?;
        self.font(id)
    }
}

/// Get `Font`
impl FontStorage {
    /// Queries for a font matching the description.
    ///
    /// Returns the ID and the loaded font if found.
    pub fn query(&mut self, query: &fontdb::Query) -> Option<(fontdb::ID, Arc<fontdue::Font>)> {
        let id = self.font_db.query(query)?;
        self.font(id).map(|font| (id, font))
    }

    /// Retrieves a loaded font by ID, loading it if necessary.
    pub fn font(&mut self, id: fontdb::ID) -> Option<Arc<fontdue::Font>> {
        use std::collections::hash_map::Entry;

        match self.loaded_font.entry(id) {
            Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let font_result = self.font_db.with_face_data(id, |data, index| {
                    fontdue::Font::from_bytes(
                        data,
                        fontdue::FontSettings {
                            collection_index: index,
                            scale: 40.0,
                            load_substitutions: true,
                        },
                    )
                })?;

                match font_result {
                    Ok(font) => {
                        let r: &mut Arc<fontdue::Font> = entry.insert(Arc::new(font));
                        Some(Arc::clone(r))
                    }
                    Err(e) => {
                        log::error!("Failed to load font (id: {:?}): {}", id, e);
                        None
                    }
                }
            }
        }
    }
}

impl GlyphSource for FontStorage {
    fn face_metrics(&mut self, material: MaterialRef, point_size: f32) -> Option<FaceMetrics> {
        let font = self.material_font(material)?;
        let metrics = font.horizontal_line_metrics(point_size)?;
        Some(FaceMetrics {
            ascender: metrics.ascent,
            descender: metrics.descent,
            line_gap: metrics.line_gap,
        })
    }

    fn glyph(&mut self, request: &GlyphRequest) -> Option<GlyphMetrics> {
        let material = self.styled_material(request.material, request.weight, request.italic);
        let font = self.material_font(material)?;

        // index 0 is .notdef
        let glyph_index = font.lookup_glyph_index(request.character);
        if glyph_index == 0 {
            return None;
        }

        let metrics = font.metrics_indexed(glyph_index, request.point_size);
        Some(GlyphMetrics {
            glyph: GlyphId::new(material, glyph_index, request.point_size),
            advance: metrics.advance_width,
            bearing_x: metrics.xmin as f32,
            bearing_y: metrics.ymin as f32 + metrics.height as f32,
            width: metrics.width as f32,
            height: metrics.height as f32,
        })
    }

    fn kerning(&mut self, left: GlyphId, right: GlyphId) -> f32 {
        let Some(font) = self.material_font(left.material()) else {
            return 0.0;
        };
        font.horizontal_kern_indexed(left.glyph_index(), right.glyph_index(), left.font_size())
            .unwrap_or(0.0)
    }

    fn material_by_name(&mut self, name: &str) -> Option<MaterialRef> {
        self.material_names.get(name).copied()
    }
}
