use std::fmt;

use euclid::default::Point2D;

/// Axis-aligned bounding box of a text region.
///
/// Coordinates follow the layout convention: the Y axis points down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extents {
    pub min: Point2D<f32>,
    pub max: Point2D<f32>,
}

impl Extents {
    /// An empty box at the origin.
    pub const ZERO: Extents = Extents {
        min: Point2D::new(0.0, 0.0),
        max: Point2D::new(0.0, 0.0),
    };

    /// Accumulator seed. Folding any real point into it replaces both bounds.
    pub const UNINITIALIZED: Extents = Extents {
        min: Point2D::new(f32::MAX, f32::MAX),
        max: Point2D::new(f32::MIN, f32::MIN),
    };

    pub fn new(min: Point2D<f32>, max: Point2D<f32>) -> Self {
        Self { min, max }
    }

    /// True once at least one point has been folded in.
    pub fn is_initialized(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    pub fn include_point(&mut self, point: Point2D<f32>) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Folds another box into this one. Uninitialized boxes are ignored.
    pub fn include(&mut self, other: &Extents) {
        if !other.is_initialized() {
            return;
        }
        self.include_point(other.min);
        self.include_point(other.max);
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        if !self.is_initialized() {
            return;
        }
        self.min.x += dx;
        self.min.y += dy;
        self.max.x += dx;
        self.max.y += dy;
    }

    pub fn width(&self) -> f32 {
        if self.is_initialized() {
            self.max.x - self.min.x
        } else {
            0.0
        }
    }

    pub fn height(&self) -> f32 {
        if self.is_initialized() {
            self.max.y - self.min.y
        } else {
            0.0
        }
    }

    /// Returns [`Extents::ZERO`] when nothing was accumulated.
    pub fn or_zero(self) -> Self {
        if self.is_initialized() { self } else { Self::ZERO }
    }

    /// True when `other` lies completely inside this box.
    pub fn contains(&self, other: &Extents) -> bool {
        !other.is_initialized()
            || (self.min.x <= other.min.x
                && self.min.y <= other.min.y
                && self.max.x >= other.max.x
                && self.max.y >= other.max.y)
    }
}

impl Default for Extents {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Extents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Min ({:.2}, {:.2})   Max ({:.2}, {:.2})",
            self.min.x, self.min.y, self.max.x, self.max.y
        )
    }
}
