//! Stroke identity and state.

use std::fmt;

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::color::StrokeColor;
use crate::geometry::GeometryBuffer;

/// Stroke identifier, scoped to its owner.
pub type StrokeId = u64;

/// Key of a stroke in the table: the owning user plus the owner's stroke id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrokeKey {
    pub user: String,
    pub id: StrokeId,
}

impl StrokeKey {
    pub fn new(user: impl Into<String>, id: StrokeId) -> Self {
        Self { user: user.into(), id }
    }
}

impl fmt::Display for StrokeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.user, self.id)
    }
}

/// One continuous freehand line.
///
/// The color is fixed when the stroke is created. Points are only ever
/// appended; a stroke has no closed state, it simply stops growing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    key: StrokeKey,
    color: StrokeColor,
    geometry: GeometryBuffer,
}

impl Stroke {
    /// Create an empty stroke.
    pub fn new(key: StrokeKey, color: StrokeColor) -> Self {
        Self {
            key,
            color,
            geometry: GeometryBuffer::new(),
        }
    }

    pub fn key(&self) -> &StrokeKey {
        &self.key
    }

    pub fn user(&self) -> &str {
        &self.key.user
    }

    pub fn id(&self) -> StrokeId {
        self.key.id
    }

    pub fn color(&self) -> StrokeColor {
        self.color
    }

    pub fn geometry(&self) -> &GeometryBuffer {
        &self.geometry
    }

    pub fn points(&self) -> &[Point] {
        self.geometry.points()
    }

    /// Append a point.
    pub fn push(&mut self, point: Point) {
        self.geometry.push(point);
    }

    /// Whether the renderer has anything to draw yet.
    pub fn is_drawable(&self) -> bool {
        self.geometry.len() >= 2
    }
}
