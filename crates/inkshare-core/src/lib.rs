//! inkshare Core Library
//!
//! Stroke reconciliation for a shared freehand canvas: the per-stroke point
//! buffer, the per-user stroke table, the reconciler that folds local and
//! remote deltas into it, and the wire and transport boundary.

pub mod color;
pub mod geometry;
pub mod history;
pub mod input;
pub mod protocol;
pub mod reconciler;
pub mod stroke;
pub mod sync;
pub mod table;

pub use color::StrokeColor;
pub use geometry::GeometryBuffer;
pub use history::{HistoryEntry, HistoryError, decode_history, encode_history};
pub use input::{InputState, PointerAction, PointerEvent, DEFAULT_THROTTLE};
pub use protocol::{Delta, DeltaError, WireMessage, WireStep};
pub use reconciler::{Applied, Reconciler};
pub use stroke::{Stroke, StrokeId, StrokeKey};
pub use sync::{ConnectionState, SyncError, SyncEvent, Transport};
pub use table::StrokeTable;

#[cfg(not(target_arch = "wasm32"))]
pub use sync::CanvasSocket;
