use serde::{Deserialize, Serialize};

/// Numeric character code (a Unicode scalar value).
pub type CharCode = u32;

/// Renders a character code as UTF-8 text.
///
/// Codes that are not valid Unicode scalar values fall back to `U+XXXX`.
#[must_use]
pub fn render_code(code: CharCode) -> String {
    match char::from_u32(code) {
        Some(c) => c.to_string(),
        None => format!("U+{code:04X}"),
    }
}

/// A pen coordinate. Serialized as a two-element `[x, y]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<[i32; 2]> for Point {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [i32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// One pen-down to pen-up trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stroke {
    pub points: Vec<Point>,
}

impl Stroke {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Builds a stroke from `(x, y)` pairs.
    pub fn from_coords(coords: &[(i32, i32)]) -> Self {
        Self {
            points: coords.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        }
    }
}

/// An ordered list of strokes making up one written character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Writing {
    pub strokes: Vec<Stroke>,
}

impl Writing {
    pub fn new(strokes: Vec<Stroke>) -> Self {
        Self { strokes }
    }

    /// Number of strokes in the writing.
    pub fn n_strokes(&self) -> usize {
        self.strokes.len()
    }

    /// Total number of points across all strokes.
    pub fn n_points(&self) -> usize {
        self.strokes.iter().map(|s| s.points.len()).sum()
    }

    /// All points in stroke order, as one stream.
    pub fn points(&self) -> impl Iterator<Item = &Point> + '_ {
        self.strokes.iter().flat_map(|s| s.points.iter())
    }
}
