//! Core record model for labeled text regions.

/// A position in source-image pixel space.
///
/// Coordinates are fractional; (0, 0) is the top-left corner of the image
/// and y grows downwards.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns true if both coordinates are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

/// Four corner points exactly as the labeling tool emitted them.
///
/// No ordering is implied; use [`crate::geometry::order_corners`] to resolve
/// the corner roles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
    pub points: [Point; 4],
}

impl Quad {
    pub fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// Builds a quad from raw `[x, y]` pairs, or `None` unless there are exactly four.
    pub fn from_pairs(pairs: &[[f64; 2]]) -> Option<Self> {
        let points: [[f64; 2]; 4] = pairs.try_into().ok()?;
        Some(Self::new(points.map(Point::from)))
    }

    pub fn is_finite(&self) -> bool {
        self.points.iter().all(Point::is_finite)
    }
}

/// A labeled text region: its boundary and the text written inside it.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub quad: Quad,

    /// Ground-truth text. May be empty.
    pub transcription: String,
}

impl Annotation {
    pub fn new(quad: Quad, transcription: impl Into<String>) -> Self {
        Self {
            quad,
            transcription: transcription.into(),
        }
    }
}

/// One line of a label file: a source image and its annotations.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRecord {
    /// 1-based line number in the label file.
    pub line: usize,

    /// Image path as written in the label file, relative to the image root.
    pub image_path: String,

    /// Annotations in the order they appear on the line. The position of an
    /// annotation in this list becomes the index suffix of its crop.
    pub annotations: Vec<Annotation>,
}
