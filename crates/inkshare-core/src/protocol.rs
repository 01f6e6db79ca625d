//! Wire format for stroke deltas.
//!
//! Every message on the canvas channel is a JSON object of the form
//! ```json
//! { "user": "alice", "step": { "id": 0, "coords": [12, 40], "color": "#ef4444" } }
//! ```
//! where `coords` is a flat `x0, y0, x1, y1, ...` list. Live deltas carry a
//! single point; history entries may carry a whole stroke.

use kurbo::Point;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::color::{ColorParseError, StrokeColor};
use crate::stroke::{StrokeId, StrokeKey};

/// Reasons an inbound message is dropped before it reaches the table.
#[derive(Debug, Error)]
pub enum DeltaError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message from {user} carries no step")]
    MissingStep { user: String },
    #[error("step has no coordinates")]
    EmptyCoords,
    #[error("odd number of coordinates ({0})")]
    OddCoords(usize),
    #[error("invalid point ({x}, {y})")]
    InvalidPoint { x: f64, y: f64 },
    #[error(transparent)]
    Color(#[from] ColorParseError),
}

/// The `step` object of a wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireStep {
    pub id: StrokeId,
    #[serde(serialize_with = "serialize_coords")]
    pub coords: Vec<f64>,
    pub color: String,
}

/// A message as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<WireStep>,
}

/// A validated "append these points to (user, id)" unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub user: String,
    pub id: StrokeId,
    pub points: Vec<Point>,
    pub color: StrokeColor,
}

impl Delta {
    /// A single-point delta, the shape every live update takes.
    pub fn point(user: impl Into<String>, id: StrokeId, point: Point, color: StrokeColor) -> Self {
        Self {
            user: user.into(),
            id,
            points: vec![point],
            color,
        }
    }

    pub fn key(&self) -> StrokeKey {
        StrokeKey::new(self.user.clone(), self.id)
    }

    /// Parse and validate one inbound text message.
    pub fn from_json(text: &str) -> Result<Self, DeltaError> {
        let message: WireMessage = serde_json::from_str(text)?;
        Self::try_from(message)
    }

    /// Serialize for the transport.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&WireMessage::from(self))
    }
}

/// Flatten points into the wire's `x0, y0, x1, y1, ...` list.
pub fn flatten_coords(points: &[Point]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, p.y]).collect()
}

/// Largest magnitude an `f64` holds as an exact integer.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Write whole-pixel coordinates as JSON integers and anything else as a
/// float. Relays that type `coords` as integers reject `5.0`.
pub fn serialize_coords<S: Serializer>(coords: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(coords.len()))?;
    for &value in coords {
        if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INT {
            seq.serialize_element(&(value as i64))?;
        } else {
            seq.serialize_element(&value)?;
        }
    }
    seq.end()
}

/// Pair up a flat coordinate list, rejecting anything that is not a
/// non-empty sequence of finite, non-negative points.
pub fn parse_coords(coords: &[f64]) -> Result<Vec<Point>, DeltaError> {
    if coords.is_empty() {
        return Err(DeltaError::EmptyCoords);
    }
    if coords.len() % 2 != 0 {
        return Err(DeltaError::OddCoords(coords.len()));
    }
    coords
        .chunks_exact(2)
        .map(|pair| {
            let (x, y) = (pair[0], pair[1]);
            if x.is_finite() && y.is_finite() && x >= 0.0 && y >= 0.0 {
                Ok(Point::new(x, y))
            } else {
                Err(DeltaError::InvalidPoint { x, y })
            }
        })
        .collect()
}

impl TryFrom<WireMessage> for Delta {
    type Error = DeltaError;

    fn try_from(message: WireMessage) -> Result<Self, Self::Error> {
        let Some(step) = message.step else {
            return Err(DeltaError::MissingStep { user: message.user });
        };
        Ok(Self {
            points: parse_coords(&step.coords)?,
            color: step.color.parse()?,
            id: step.id,
            user: message.user,
        })
    }
}

impl From<&Delta> for WireMessage {
    fn from(delta: &Delta) -> Self {
        Self {
            user: delta.user.clone(),
            step: Some(WireStep {
                id: delta.id,
                coords: flatten_coords(&delta.points),
                color: delta.color.to_hex(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_point() {
        let delta = Delta::from_json(
            r##"{"user":"alice","step":{"id":4,"coords":[12,40],"color":"#EF4444"}}"##,
        )
        .unwrap();
        assert_eq!(delta.user, "alice");
        assert_eq!(delta.id, 4);
        assert_eq!(delta.points, vec![Point::new(12.0, 40.0)]);
        assert_eq!(delta.color, StrokeColor::new(0xef, 0x44, 0x44));
    }

    #[test]
    fn test_decode_multiple_points() {
        let delta = Delta::from_json(
            r##"{"user":"bob","step":{"id":0,"coords":[1,2,3.5,4],"color":"#000000"}}"##,
        )
        .unwrap();
        assert_eq!(delta.points, vec![Point::new(1.0, 2.0), Point::new(3.5, 4.0)]);
    }

    #[test]
    fn test_encode_matches_wire_shape() {
        let delta = Delta::point("alice", 2, Point::new(5.0, 6.0), StrokeColor::new(255, 0, 0));
        let value: serde_json::Value = serde_json::from_str(&delta.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "user": "alice",
                "step": { "id": 2, "coords": [5, 6], "color": "#ff0000" }
            })
        );
        assert!(delta.to_json().unwrap().contains("\"coords\":[5,6]"));
    }

    #[test]
    fn test_local_delta_fits_integer_relay() {
        #[derive(Deserialize)]
        struct RelayStep {
            id: i32,
            coords: [i32; 2],
            color: String,
        }
        #[derive(Deserialize)]
        struct RelayMessage {
            user: String,
            step: Option<RelayStep>,
        }

        let delta = Delta::point("alice", 0, Point::new(5.0, 6.0), StrokeColor::new(255, 0, 0));
        let relayed: RelayMessage = serde_json::from_str(&delta.to_json().unwrap()).unwrap();
        assert_eq!(relayed.user, "alice");
        let step = relayed.step.expect("relay should keep the step");
        assert_eq!(step.id, 0);
        assert_eq!(step.coords, [5, 6]);
        assert_eq!(step.color, "#ff0000");

        // And back again through the relay's integer form.
        let echoed = Delta::from_json(&delta.to_json().unwrap()).unwrap();
        assert_eq!(echoed, delta);
    }

    #[test]
    fn test_fractional_coords_stay_floats() {
        let delta = Delta::point("bob", 1, Point::new(3.5, 0.0), StrokeColor::new(0, 0, 0));
        let json = delta.to_json().unwrap();
        assert!(json.contains("\"coords\":[3.5,0]"), "{json}");
        assert_eq!(Delta::from_json(&json).unwrap().points, vec![Point::new(3.5, 0.0)]);
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(Delta::from_json("not json"), Err(DeltaError::Json(_))));
    }

    #[test]
    fn test_rejects_missing_step() {
        assert!(matches!(
            Delta::from_json(r#"{"user":"anon"}"#),
            Err(DeltaError::MissingStep { .. })
        ));
        assert!(matches!(
            Delta::from_json(r#"{"user":"anon","step":null}"#),
            Err(DeltaError::MissingStep { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_coords() {
        let cases = [
            (r##"{"user":"a","step":{"id":0,"coords":[],"color":"#000000"}}"##, "empty"),
            (r##"{"user":"a","step":{"id":0,"coords":[1],"color":"#000000"}}"##, "odd"),
            (r##"{"user":"a","step":{"id":0,"coords":[-1,2],"color":"#000000"}}"##, "negative"),
            (r##"{"user":"a","step":{"id":0,"coords":[1,"x"],"color":"#000000"}}"##, "string"),
            (r##"{"user":"a","step":{"id":0,"color":"#000000"}}"##, "missing"),
        ];
        for (json, case) in cases {
            assert!(Delta::from_json(json).is_err(), "{case} coords should be rejected");
        }
    }

    #[test]
    fn test_rejects_non_finite_points() {
        assert!(matches!(
            parse_coords(&[f64::NAN, 1.0]),
            Err(DeltaError::InvalidPoint { .. })
        ));
        assert!(matches!(
            parse_coords(&[1.0, f64::INFINITY]),
            Err(DeltaError::InvalidPoint { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_color_and_id() {
        assert!(matches!(
            Delta::from_json(r#"{"user":"a","step":{"id":0,"coords":[1,1],"color":"red"}}"#),
            Err(DeltaError::Color(_))
        ));
        assert!(Delta::from_json(r##"{"user":"a","step":{"id":-1,"coords":[1,1],"color":"#000000"}}"##).is_err());
    }

    #[test]
    fn test_chat_message_has_no_step() {
        let message: WireMessage = serde_json::from_str(r#"{"user":"a","text":"hi"}"#).unwrap();
        assert!(message.step.is_none());
    }
}
