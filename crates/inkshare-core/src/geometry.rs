//! Point buffer for a single freehand stroke.

use kurbo::{BezPath, Line, Point, Rect};
use serde::{Deserialize, Serialize};

/// The growing, append-only point list of one stroke.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeometryBuffer {
    points: Vec<Point>,
}

impl GeometryBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from existing points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Append a point to the end of the stroke.
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Consecutive point pairs as straight segments.
    ///
    /// Yields `len - 1` lines, or nothing while the stroke has fewer than two points.
    pub fn segments(&self) -> impl ExactSizeIterator<Item = Line> + '_ {
        self.points.windows(2).map(|pair| Line::new(pair[0], pair[1]))
    }

    /// Axis-aligned bounds of all points, `Rect::ZERO` when empty.
    pub fn bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        self.points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |rect, p| rect.union_pt(*p))
    }

    /// The stroke as a polyline path.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut points = self.points.iter();
        if let Some(first) = points.next() {
            path.move_to(*first);
            for point in points {
                path.line_to(*point);
            }
        }
        path
    }
}

impl Extend<Point> for GeometryBuffer {
    fn extend<T: IntoIterator<Item = Point>>(&mut self, iter: T) {
        self.points.extend(iter);
    }
}
