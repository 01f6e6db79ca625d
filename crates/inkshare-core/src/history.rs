//! Decoding of the history endpoint's stroke list.
//!
//! The history endpoint returns a JSON array of entries shaped like
//! `{ "user", "id", "coords", "color" }`. An entry may hold a whole stroke or
//! a single recorded delta; both fold into the table through the same
//! lookup-or-create rule the live path uses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{Delta, DeltaError, WireMessage, WireStep, flatten_coords, serialize_coords};
use crate::stroke::{Stroke, StrokeId};
use crate::table::StrokeTable;

/// History errors.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history is not a JSON array: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for history decoding.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// One recorded stroke (or stroke fragment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user: String,
    pub id: StrokeId,
    #[serde(serialize_with = "serialize_coords")]
    pub coords: Vec<f64>,
    pub color: String,
}

impl From<HistoryEntry> for WireMessage {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            user: entry.user,
            step: Some(WireStep {
                id: entry.id,
                coords: entry.coords,
                color: entry.color,
            }),
        }
    }
}

impl From<&Stroke> for HistoryEntry {
    fn from(stroke: &Stroke) -> Self {
        Self {
            user: stroke.user().to_string(),
            id: stroke.id(),
            coords: flatten_coords(stroke.points()),
            color: stroke.color().to_hex(),
        }
    }
}

/// Decode a history body into strokes in drawing order.
///
/// Entries that fail validation are logged and skipped; only a body that is
/// not a JSON array at all is an error.
pub fn decode_history(body: &str) -> HistoryResult<Vec<Stroke>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let mut table = StrokeTable::new();
    let mut skipped = 0usize;

    for (index, value) in entries.into_iter().enumerate() {
        let delta = serde_json::from_value::<HistoryEntry>(value)
            .map_err(DeltaError::from)
            .and_then(|entry| Delta::try_from(WireMessage::from(entry)));
        match delta {
            Ok(delta) => {
                let stroke = table.get_or_create(&delta.user, delta.id, delta.color);
                for point in delta.points {
                    stroke.push(point);
                }
            }
            Err(e) => {
                log::warn!("Skipping history entry {}: {}", index, e);
                skipped += 1;
            }
        }
    }

    log::debug!(
        "Decoded history: {} strokes, {} points, {} entries skipped",
        table.len(),
        table.point_count(),
        skipped
    );
    Ok(table.into_strokes())
}

/// Encode a table in the history endpoint's shape.
pub fn encode_history(table: &StrokeTable) -> Vec<HistoryEntry> {
    table.all_strokes().map(HistoryEntry::from).collect()
}
