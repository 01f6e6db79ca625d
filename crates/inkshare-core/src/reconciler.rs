//! Reconciliation of local and remote deltas into the stroke table.
//!
//! Both paths go through the same rule: look up or create the stroke for
//! `(user, id)`, append the delta's points, mark the table dirty. The local
//! path additionally assigns stroke ids and queues the outbound wire message;
//! the remote path decodes, validates and drops echoes of our own deltas.

use kurbo::Point;

use crate::color::StrokeColor;
use crate::input::PointerAction;
use crate::protocol::{Delta, DeltaError};
use crate::stroke::{Stroke, StrokeId, StrokeKey};
use crate::table::StrokeTable;

/// Outcome of applying one delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub key: StrokeKey,
    /// Whether this delta created the stroke.
    pub created: bool,
    /// Number of points appended.
    pub points: usize,
}

/// Owns the stroke table for one session and folds deltas into it.
#[derive(Debug, Clone)]
pub struct Reconciler {
    /// Identity of this client.
    local_user: String,
    /// The authoritative table.
    table: StrokeTable,
    /// Stroke currently being drawn locally.
    current: Option<(StrokeId, StrokeColor)>,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
    /// Set on every table mutation, cleared by the renderer's owner.
    dirty: bool,
}

impl Reconciler {
    /// Create a reconciler with an empty table.
    pub fn new(local_user: impl Into<String>) -> Self {
        Self {
            local_user: local_user.into(),
            table: StrokeTable::new(),
            current: None,
            outgoing: Vec::new(),
            dirty: false,
        }
    }

    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    pub fn table(&self) -> &StrokeTable {
        &self.table
    }

    /// Whether the table changed since the last `take_dirty`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read and clear the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Replace the whole table, e.g. with a history snapshot.
    ///
    /// An in-progress local stroke keeps its id and color; further points for
    /// it recreate it if the snapshot does not contain it.
    pub fn replace_all(&mut self, strokes: impl IntoIterator<Item = Stroke>) {
        self.table.replace_all(strokes);
        self.dirty = true;
        log::info!(
            "Stroke table replaced: {} strokes from {} users",
            self.table.len(),
            self.table.users().count()
        );
    }

    // --- Core rule ---

    fn apply(&mut self, delta: Delta) -> Applied {
        let created = !self.table.contains(&delta.key());
        let stroke = self.table.get_or_create(&delta.user, delta.id, delta.color);
        let points = delta.points.len();
        for point in delta.points {
            stroke.push(point);
        }
        self.dirty = true;
        Applied {
            key: stroke.key().clone(),
            created,
            points,
        }
    }

    // --- Local path ---

    /// Id the next local stroke will get: one past the last local stroke, or 0.
    pub fn next_local_id(&self) -> StrokeId {
        self.table
            .last_stroke_id(&self.local_user)
            .map_or(0, |id| id.saturating_add(1))
    }

    /// Id of the stroke being drawn locally, if any.
    pub fn current_stroke(&self) -> Option<StrokeId> {
        self.current.map(|(id, _)| id)
    }

    /// Start a new local stroke at `point` (pointer-down).
    pub fn begin_local_stroke(&mut self, point: Point, color: StrokeColor) -> Applied {
        let id = self.next_local_id();
        self.current = Some((id, color));
        log::debug!("Local stroke {} started", id);
        self.apply_local(Delta::point(self.local_user.clone(), id, point, color))
    }

    /// Append `point` to the stroke being drawn (pointer-move).
    ///
    /// Returns `None` when no local stroke is in progress.
    pub fn extend_local_stroke(&mut self, point: Point) -> Option<Applied> {
        let (id, color) = self.current?;
        Some(self.apply_local(Delta::point(self.local_user.clone(), id, point, color)))
    }

    /// Stop drawing the current stroke (pointer-up or leave).
    pub fn end_local_stroke(&mut self) {
        if let Some((id, _)) = self.current.take() {
            log::debug!("Local stroke {} ended", id);
        }
    }

    /// Route a pointer action through the local path.
    ///
    /// `color` is only consulted when the action begins a stroke.
    pub fn handle_pointer(
        &mut self,
        action: PointerAction,
        color: impl FnOnce() -> StrokeColor,
    ) -> Option<Applied> {
        match action {
            PointerAction::Begin(point) => Some(self.begin_local_stroke(point, color())),
            PointerAction::Extend(point) => self.extend_local_stroke(point),
            PointerAction::End => {
                self.end_local_stroke();
                None
            }
        }
    }

    /// Apply a locally produced delta, then queue it for the transport.
    pub fn apply_local(&mut self, delta: Delta) -> Applied {
        match delta.to_json() {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("Failed to encode local delta: {}", e),
        }
        self.apply(delta)
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    /// Check if there are pending outgoing messages.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    // --- Remote path ---

    /// Apply a delta received from another peer.
    ///
    /// Deltas carrying our own identity were already applied on the local
    /// path and are dropped.
    pub fn apply_remote(&mut self, delta: Delta) -> Option<Applied> {
        if delta.user == self.local_user {
            log::debug!("Ignoring echo of local stroke {}", delta.id);
            return None;
        }
        Some(self.apply(delta))
    }

    /// Handle one inbound text message from the transport.
    ///
    /// Malformed messages are logged and dropped without touching the table.
    pub fn handle_message(&mut self, text: &str) -> Option<Applied> {
        match Delta::from_json(text) {
            Ok(delta) => self.apply_remote(delta),
            Err(e @ DeltaError::MissingStep { .. }) => {
                log::debug!("Dropping message: {}", e);
                None
            }
            Err(e) => {
                log::warn!("Dropping inbound message: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C1: StrokeColor = StrokeColor::new(200, 10, 10);
    const C2: StrokeColor = StrokeColor::new(10, 10, 200);

    fn remote(user: &str, id: StrokeId, x: f64, y: f64, color: StrokeColor) -> Delta {
        Delta::point(user, id, Point::new(x, y), color)
    }

    #[test]
    fn test_delta_continuation() {
        let mut rec = Reconciler::new("me");
        rec.apply_remote(remote("userA", 0, 1.0, 1.0, C1));
        rec.apply_remote(remote("userA", 0, 2.0, 2.0, C1));

        let strokes = rec.table().user_strokes("userA");
        assert_eq!(strokes.len(), 1);
        assert_eq!(strokes[0].points(), &[Point::new(1.0, 1.0), Point::new(2.0, 2.0)]);
    }

    #[test]
    fn test_new_stroke_on_id_change() {
        let mut rec = Reconciler::new("me");
        let first = rec.apply_remote(remote("userA", 0, 1.0, 1.0, C1)).unwrap();
        let second = rec.apply_remote(remote("userA", 1, 5.0, 5.0, C2)).unwrap();
        assert!(first.created && second.created);

        let strokes = rec.table().user_strokes("userA");
        assert_eq!(strokes.len(), 2);
        assert_eq!(strokes[0].color(), C1);
        assert_eq!(strokes[1].color(), C2);
        assert_eq!(strokes[0].points(), &[Point::new(1.0, 1.0)]);
        assert_eq!(strokes[1].points(), &[Point::new(5.0, 5.0)]);
    }

    #[test]
    fn test_first_color_wins_on_remote_path() {
        let mut rec = Reconciler::new("me");
        rec.apply_remote(remote("userA", 0, 1.0, 1.0, C1));
        let applied = rec.apply_remote(remote("userA", 0, 2.0, 2.0, C2)).unwrap();
        assert!(!applied.created);
        assert_eq!(rec.table().user_strokes("userA")[0].color(), C1);
    }

    #[test]
    fn test_monotonic_local_ids() {
        let mut rec = Reconciler::new("me");
        let mut ids = Vec::new();
        for i in 0..5 {
            let applied = rec.begin_local_stroke(Point::new(i as f64, 0.0), C1);
            ids.push(applied.key.id);
            rec.end_local_stroke();
        }
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_local_ids_ignore_remote_strokes() {
        let mut rec = Reconciler::new("me");
        rec.apply_remote(remote("other", 41, 1.0, 1.0, C1));
        assert_eq!(rec.begin_local_stroke(Point::ZERO, C1).key.id, 0);
    }

    #[test]
    fn test_local_ids_continue_after_history() {
        let mut rec = Reconciler::new("me");
        let mut seeded = Stroke::new(StrokeKey::new("me", 7), C1);
        seeded.push(Point::new(1.0, 1.0));
        rec.replace_all(vec![seeded]);
        assert_eq!(rec.next_local_id(), 8);
    }

    #[test]
    fn test_local_stroke_queues_outgoing() {
        let mut rec = Reconciler::new("me");
        rec.begin_local_stroke(Point::new(1.0, 1.0), C1);
        rec.extend_local_stroke(Point::new(2.0, 3.0)).unwrap();
        rec.end_local_stroke();
        assert!(rec.extend_local_stroke(Point::new(9.0, 9.0)).is_none());

        let outgoing = rec.take_outgoing();
        assert_eq!(outgoing.len(), 2);
        assert!(!rec.has_outgoing());
        let last = Delta::from_json(&outgoing[1]).unwrap();
        assert_eq!(last, Delta::point("me", 0, Point::new(2.0, 3.0), C1));
        assert_eq!(rec.table().point_count(), 2);
    }

    #[test]
    fn test_self_suppression() {
        let mut rec = Reconciler::new("me");
        rec.begin_local_stroke(Point::new(1.0, 1.0), C1);
        rec.extend_local_stroke(Point::new(2.0, 2.0));
        let before = rec.table().point_count();

        for echo in rec.take_outgoing() {
            assert!(rec.handle_message(&echo).is_none());
        }
        assert_eq!(rec.table().point_count(), before);
        assert_eq!(rec.table().len(), 1);
    }

    #[test]
    fn test_malformed_input_leaves_table_unchanged() {
        let mut rec = Reconciler::new("me");
        rec.apply_remote(remote("userA", 0, 1.0, 1.0, C1));
        let snapshot = rec.table().clone();
        rec.take_dirty();

        for text in [
            "not json at all",
            "",
            "[]",
            r#"{"user":"userA"}"#,
            r#"{"user":"userA","step":{"id":0}}"#,
            r##"{"user":"userA","step":{"id":0,"coords":[1],"color":"#000000"}}"##,
            r##"{"user":"userA","step":{"id":0,"coords":[1,-2],"color":"#000000"}}"##,
            r#"{"user":"userA","step":{"id":0,"coords":[1,2],"color":"green"}}"#,
        ] {
            assert!(rec.handle_message(text).is_none(), "{text:?} should be dropped");
        }
        assert_eq!(rec.table(), &snapshot);
        assert!(!rec.is_dirty());
    }

    #[test]
    fn test_gap_produces_single_stroke() {
        let mut rec = Reconciler::new("me");
        rec.handle_message(r##"{"user":"b","step":{"id":9,"coords":[1,1],"color":"#000000"}}"##);
        // Points in between were lost; the next one just extends the stroke.
        rec.handle_message(r##"{"user":"b","step":{"id":9,"coords":[50,50],"color":"#000000"}}"##);

        assert_eq!(rec.table().len(), 1);
        let stroke = rec.table().get(&StrokeKey::new("b", 9)).unwrap();
        assert_eq!(stroke.geometry().segments().count(), 1);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut rec = Reconciler::new("me");
        assert!(!rec.is_dirty());
        rec.apply_remote(remote("userA", 0, 1.0, 1.0, C1));
        assert!(rec.take_dirty());
        assert!(!rec.is_dirty());
    }

    #[test]
    fn test_handle_pointer_actions() {
        let mut rec = Reconciler::new("me");
        let began = rec.handle_pointer(PointerAction::Begin(Point::new(1.0, 1.0)), || C2).unwrap();
        assert_eq!(began.key, StrokeKey::new("me", 0));
        assert_eq!(rec.current_stroke(), Some(0));

        rec.handle_pointer(PointerAction::Extend(Point::new(2.0, 2.0)), || unreachable!());
        assert!(rec.handle_pointer(PointerAction::End, || unreachable!()).is_none());
        assert_eq!(rec.current_stroke(), None);

        let stroke = rec.table().get(&StrokeKey::new("me", 0)).unwrap();
        assert_eq!(stroke.color(), C2);
        assert_eq!(stroke.points().len(), 2);
    }
}
