//! Coordinate Normalizer
//!
//! Damage tags are stored as fractions of the *rendered image*, never as
//! container pixels. Photos are drawn aspect-fit, so a container usually
//! shows letterbox bars on two sides; taps that land in a bar create nothing.

use serde::{Deserialize, Serialize};

/// Default drag margin, as a fraction of the image side.
pub const DEFAULT_TAG_MARGIN: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in container coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Closed on all four sides. A tap exactly on an image edge belongs to
    /// the image (fraction 0 or 1); only points strictly inside a letterbox
    /// bar are outside.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }
}

/// Tag position relative to the rendered image, each axis in [0, 1].
///
/// Deserialized positions go through `new`, so a stored or posted value
/// outside the image is clamped on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPosition")]
pub struct PositionFraction {
    pub x: f64,
    pub y: f64,
}

impl PositionFraction {
    /// Clamps both axes into [0, 1]; NaN becomes 0.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x, 0.0, 1.0),
            y: clamp_unit(y, 0.0, 1.0),
        }
    }
}

#[derive(Deserialize)]
struct RawPosition {
    x: f64,
    y: f64,
}

impl From<RawPosition> for PositionFraction {
    fn from(raw: RawPosition) -> Self {
        Self::new(raw.x, raw.y)
    }
}

fn clamp_unit(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() {
        lo
    } else {
        v.clamp(lo, hi)
    }
}

/// Bounding box of `image` drawn aspect-fit and centered inside `container`.
pub fn fit_rect(image: Size, container: Size) -> Option<Rect> {
    if !image.is_drawable() || !container.is_drawable() {
        return None;
    }

    let scale = (container.width / image.width).min(container.height / image.height);
    let width = image.width * scale;
    let height = image.height * scale;

    Some(Rect {
        x: (container.width - width) / 2.0,
        y: (container.height - height) / 2.0,
        width,
        height,
    })
}

/// Natural image size plus the container it is currently displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub image: Size,
    pub container: Size,
}

impl ImageGeometry {
    pub fn new(image: Size, container: Size) -> Self {
        Self { image, container }
    }

    pub fn rendered(&self) -> Option<Rect> {
        fit_rect(self.image, self.container)
    }

    /// Container tap to image fraction. `None` for letterbox taps or
    /// degenerate geometry.
    pub fn normalize(&self, tap: Point) -> Option<PositionFraction> {
        let rect = self.rendered()?;
        if !rect.contains(tap) {
            return None;
        }
        Some(PositionFraction::new(
            (tap.x - rect.x) / rect.width,
            (tap.y - rect.y) / rect.height,
        ))
    }

    /// Stored fraction back to container pixels for the current container.
    pub fn denormalize(&self, pos: PositionFraction) -> Option<Point> {
        let rect = self.rendered()?;
        Some(Point::new(
            rect.x + pos.x * rect.width,
            rect.y + pos.y * rect.height,
        ))
    }

    /// Reposition a tag by a pointer delta in container pixels. The result
    /// is kept inside the margin band so marker labels are never clipped.
    pub fn drag(&self, start: PositionFraction, delta: Point, margin: MarginPolicy) -> PositionFraction {
        let Some(rect) = self.rendered() else {
            return margin.apply(start);
        };
        let moved = PositionFraction {
            x: start.x + delta.x / rect.width,
            y: start.y + delta.y / rect.height,
        };
        margin.apply(moved)
    }
}

/// Keeps dragged tags a fixed fraction away from every image edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginPolicy {
    margin: f64,
}

impl MarginPolicy {
    /// Margin is clamped into [0, 0.5].
    pub fn new(margin: f64) -> Self {
        Self {
            margin: clamp_unit(margin, 0.0, 0.5),
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn apply(&self, pos: PositionFraction) -> PositionFraction {
        let lo = self.margin;
        let hi = 1.0 - self.margin;
        PositionFraction {
            x: clamp_unit(pos.x, lo, hi),
            y: clamp_unit(pos.y, lo, hi),
        }
    }
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TAG_MARGIN)
    }
}
