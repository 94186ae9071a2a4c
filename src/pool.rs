use std::num::NonZeroUsize;

use crate::error::LayoutWarning;
use crate::text::info::{CharacterInfo, LineInfo, LinkInfo, PageInfo, SpriteInfo, WordInfo};

/// Output vectors of one layout pass.
///
/// A finished [`TextLayout`](crate::text::TextLayout) can be turned back into
/// its buffers and returned to a [`BufferPool`] so the next pass of similar
/// size does not allocate.
#[derive(Clone, Debug, Default)]
pub struct LayoutBuffers {
    pub characters: Vec<CharacterInfo>,
    pub lines: Vec<LineInfo>,
    pub words: Vec<WordInfo>,
    pub links: Vec<LinkInfo>,
    pub sprites: Vec<SpriteInfo>,
    pub pages: Vec<PageInfo>,
    pub diagnostics: Vec<LayoutWarning>,
}

impl LayoutBuffers {
    /// Allocates buffers for roughly `characters` characters.
    pub fn with_capacity(characters: usize) -> Self {
        Self {
            characters: Vec::with_capacity(characters),
            lines: Vec::with_capacity(characters / 16 + 1),
            words: Vec::with_capacity(characters / 4 + 1),
            links: Vec::new(),
            sprites: Vec::new(),
            pages: Vec::with_capacity(1),
            diagnostics: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.characters.clear();
        self.lines.clear();
        self.words.clear();
        self.links.clear();
        self.sprites.clear();
        self.pages.clear();
        self.diagnostics.clear();
    }

    /// Number of characters the buffers hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.characters.capacity()
    }
}

struct SizeClass {
    capacity: usize,
    max_idle: usize,
    idle: Vec<LayoutBuffers>,
}

/// Reusable [`LayoutBuffers`] grouped by capacity.
///
/// A checkout takes buffers from the smallest class that can hold the
/// request. Requests larger than every class are allocated directly and are
/// not kept on checkin.
pub struct BufferPool {
    /// must be sorted by capacity
    classes: Vec<SizeClass>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(&Self::DEFAULT_CLASSES)
    }
}

impl BufferPool {
    /// Character capacities of the default classes, each keeping up to 8
    /// idle buffer sets.
    pub const DEFAULT_CLASSES: [(usize, usize); 4] = [(64, 8), (256, 8), (1024, 8), (4096, 8)];

    /// Builds a pool from `(capacity, max_idle)` pairs.
    pub fn new(classes: &[(usize, usize)]) -> Self {
        let mut sorted: Vec<(NonZeroUsize, usize)> = classes
            .iter()
            .filter_map(|(capacity, max_idle)| Some((NonZeroUsize::new(*capacity)?, *max_idle)))
            .collect();
        sorted.sort_by_key(|(capacity, _)| *capacity);
        sorted.dedup_by_key(|(capacity, _)| *capacity);

        let classes = sorted
            .into_iter()
            .map(|(capacity, max_idle)| SizeClass {
                capacity: capacity.get(),
                max_idle,
                idle: Vec::with_capacity(max_idle),
            })
            .collect();

        Self { classes }
    }

    /// Returns cleared buffers able to hold `characters` characters.
    pub fn checkout(&mut self, characters: usize) -> LayoutBuffers {
        let Some(class) = self
            .classes
            .iter_mut()
            .find(|class| class.capacity >= characters)
        else {
            log::trace!("buffer request for {characters} characters exceeds every size class");
            return LayoutBuffers::with_capacity(characters);
        };

        match class.idle.pop() {
            Some(mut buffers) => {
                buffers.clear();
                buffers
            }
            None => LayoutBuffers::with_capacity(class.capacity),
        }
    }

    /// Gives buffers back. They are filed under the largest class their
    /// capacity still satisfies and dropped when that class is full.
    pub fn checkin(&mut self, mut buffers: LayoutBuffers) {
        let capacity = buffers.capacity();
        let Some(class) = self
            .classes
            .iter_mut()
            .rev()
            .find(|class| class.capacity <= capacity)
        else {
            return;
        };
        if class.idle.len() >= class.max_idle {
            return;
        }
        buffers.clear();
        class.idle.push(buffers);
    }

    /// Number of idle buffer sets across all classes.
    pub fn idle(&self) -> usize {
        self.classes.iter().map(|class| class.idle.len()).sum()
    }

    pub fn clear(&mut self) {
        for class in &mut self.classes {
            class.idle.clear();
        }
    }
}
