// THEORY:
// A `Blob` is a snapshot of one player's hand in one tick: the dominant connected
// region of that player's mask. Like the other per-tick data it is a "dumb" data
// container. It is derived fresh every tick, never mutated afterwards, and carries
// no memory of earlier frames. Memory over time belongs to the tracker.

use serde::{Deserialize, Serialize};

/// A pixel coordinate on the frame. Signed so contour geometry can take
/// differences without casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A sub-pixel position, used for centroids and filter estimates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned box; `width` and `height` count pixels, so both are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    pub fn center(&self) -> Position {
        Position::new(
            self.x as f32 + (self.width as f32 - 1.0) / 2.0,
            self.y as f32 + (self.height as f32 - 1.0) / 2.0,
        )
    }
}

/// The dominant connected region found in a player's mask for a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Outer boundary, traced clockwise from the top-left-most pixel.
    pub contour: Vec<Point>,
    pub bounding_box: BoundingBox,
    /// Mean of the contour points.
    pub centroid: Position,
    /// Foreground pixel count of the region.
    pub area: u32,
}

impl Blob {
    /// area / bounding-box area. 1.0 for a filled rectangle.
    pub fn fill_ratio(&self) -> f32 {
        let box_area = self.bounding_box.area();
        if box_area == 0 {
            return 0.0;
        }
        self.area as f32 / box_area as f32
    }

    /// width / height of the bounding box.
    pub fn aspect_ratio(&self) -> f32 {
        self.bounding_box.width as f32 / self.bounding_box.height.max(1) as f32
    }

    /// Long side over short side; 1.0 for a square regardless of orientation.
    pub fn elongation(&self) -> f32 {
        let BoundingBox { width, height, .. } = self.bounding_box;
        width.max(height) as f32 / width.min(height).max(1) as f32
    }
}
