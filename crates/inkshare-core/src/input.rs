//! Pointer input handling for the local drawing path.

use std::time::{Duration, Instant};

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Minimum spacing between two local move deltas.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(10);

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Pointer event in device (window) coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    Down {
        position: Point,
        #[serde(default)]
        button: MouseButton,
    },
    Move {
        position: Point,
    },
    Up {
        #[serde(default)]
        button: MouseButton,
    },
    /// Pointer left the canvas.
    Leave,
}

/// What the local drawing path should do in response to an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    /// Start a new stroke at this canvas-local point.
    Begin(Point),
    /// Continue the current stroke.
    Extend(Point),
    /// Stop drawing; the current stroke receives no further points.
    End,
}

/// Tracks the drawing gesture across pointer events.
#[derive(Debug, Clone)]
pub struct InputState {
    /// Canvas origin in device coordinates.
    pub canvas_origin: Point,
    /// Minimum spacing between emitted move deltas.
    throttle: Duration,
    /// Whether a stroke is being drawn.
    drawing: bool,
    /// When the last delta was emitted.
    last_emit: Option<Instant>,
    /// Latest canvas point held back by the throttle.
    pending: Option<Point>,
}

impl Default for InputState {
    fn default() -> Self {
        Self::new(Point::ZERO, DEFAULT_THROTTLE)
    }
}

impl InputState {
    /// Create an input state for a canvas whose top-left corner is at `canvas_origin`.
    pub fn new(canvas_origin: Point, throttle: Duration) -> Self {
        Self {
            canvas_origin,
            throttle,
            drawing: false,
            last_emit: None,
            pending: None,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Translate a device position into canvas-local pixel coordinates.
    ///
    /// Coordinates are rounded to whole pixels and never negative.
    pub fn to_canvas(&self, position: Point) -> Point {
        let local = position - self.canvas_origin.to_vec2();
        Point::new(local.x.round().max(0.0), local.y.round().max(0.0))
    }

    /// Feed one pointer event, returning the drawing actions it causes in order.
    ///
    /// Moves closer together than the throttle interval are held back; only
    /// the latest one is kept, and it is emitted once the interval expires
    /// (see [`InputState::poll`]) or just before the stroke ends.
    pub fn process(&mut self, event: &PointerEvent, now: Instant) -> Vec<PointerAction> {
        match *event {
            PointerEvent::Down { position, button: MouseButton::Left } => {
                if !position.is_finite() {
                    return Vec::new();
                }
                self.drawing = true;
                self.last_emit = Some(now);
                self.pending = None;
                vec![PointerAction::Begin(self.to_canvas(position))]
            }
            PointerEvent::Down { .. } => Vec::new(),
            PointerEvent::Move { position } => {
                if !self.drawing || !position.is_finite() {
                    return Vec::new();
                }
                let point = self.to_canvas(position);
                if !self.window_elapsed(now) {
                    self.pending = Some(point);
                    return Vec::new();
                }
                self.last_emit = Some(now);
                self.pending = None;
                vec![PointerAction::Extend(point)]
            }
            PointerEvent::Up { button: MouseButton::Left } | PointerEvent::Leave => {
                if !self.drawing {
                    return Vec::new();
                }
                self.drawing = false;
                self.last_emit = None;
                let mut actions = Vec::with_capacity(2);
                if let Some(point) = self.pending.take() {
                    actions.push(PointerAction::Extend(point));
                }
                actions.push(PointerAction::End);
                actions
            }
            PointerEvent::Up { .. } => Vec::new(),
        }
    }

    /// Emit the held-back move once its throttle interval has passed.
    ///
    /// Call this periodically so a pointer that stops moving mid-stroke still
    /// lands its last position.
    pub fn poll(&mut self, now: Instant) -> Option<PointerAction> {
        if !self.drawing || !self.window_elapsed(now) {
            return None;
        }
        let point = self.pending.take()?;
        self.last_emit = Some(now);
        Some(PointerAction::Extend(point))
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        self.last_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.throttle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    fn move_to(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Move { position: Point::new(x, y) }
    }

    #[test]
    fn test_canvas_local_translation() {
        let input = InputState::new(Point::new(100.0, 50.0), DEFAULT_THROTTLE);
        assert_eq!(input.to_canvas(Point::new(110.4, 60.6)), Point::new(10.0, 11.0));
        assert_eq!(input.to_canvas(Point::new(90.0, 40.0)), Point::ZERO);
    }

    #[test]
    fn test_gesture_lifecycle() {
        let mut input = InputState::new(Point::ZERO, Duration::ZERO);
        let t = Instant::now();

        assert!(input.process(&move_to(1.0, 1.0), t).is_empty());
        assert_eq!(input.process(&down(1.0, 1.0), t), vec![PointerAction::Begin(Point::new(1.0, 1.0))]);
        assert!(input.is_drawing());
        assert_eq!(input.process(&move_to(2.0, 2.0), t), vec![PointerAction::Extend(Point::new(2.0, 2.0))]);
        assert_eq!(input.process(&PointerEvent::Up { button: MouseButton::Left }, t), vec![PointerAction::End]);
        assert!(!input.is_drawing());
        assert!(input.process(&move_to(3.0, 3.0), t).is_empty());
    }

    #[test]
    fn test_leave_ends_stroke() {
        let mut input = InputState::default();
        let t = Instant::now();
        input.process(&down(1.0, 1.0), t);
        assert_eq!(input.process(&PointerEvent::Leave, t), vec![PointerAction::End]);
        assert!(input.process(&PointerEvent::Leave, t).is_empty());
    }

    #[test]
    fn test_other_buttons_do_not_draw() {
        let mut input = InputState::default();
        let event = PointerEvent::Down {
            position: Point::new(1.0, 1.0),
            button: MouseButton::Right,
        };
        assert!(input.process(&event, Instant::now()).is_empty());
        assert!(!input.is_drawing());
    }

    #[test]
    fn test_throttles_moves() {
        let mut input = InputState::new(Point::ZERO, Duration::from_millis(10));
        let t0 = Instant::now();
        input.process(&down(0.0, 0.0), t0);

        assert!(input.process(&move_to(1.0, 1.0), t0 + Duration::from_millis(4)).is_empty());
        assert_eq!(
            input.process(&move_to(2.0, 2.0), t0 + Duration::from_millis(10)),
            vec![PointerAction::Extend(Point::new(2.0, 2.0))]
        );
        assert!(input.process(&move_to(3.0, 3.0), t0 + Duration::from_millis(15)).is_empty());
        assert_eq!(
            input.process(&move_to(4.0, 4.0), t0 + Duration::from_millis(21)),
            vec![PointerAction::Extend(Point::new(4.0, 4.0))]
        );
        // Nothing left over once the newer move went out.
        assert_eq!(input.poll(t0 + Duration::from_millis(60)), None);
    }

    #[test]
    fn test_release_inside_window_keeps_last_point() {
        let mut input = InputState::new(Point::ZERO, Duration::from_millis(10));
        let t0 = Instant::now();

        assert_eq!(input.process(&down(0.0, 0.0), t0), vec![PointerAction::Begin(Point::ZERO)]);
        assert!(input.process(&move_to(50.0, 50.0), t0 + Duration::from_millis(3)).is_empty());
        assert_eq!(
            input.process(&PointerEvent::Up { button: MouseButton::Left }, t0 + Duration::from_millis(4)),
            vec![PointerAction::Extend(Point::new(50.0, 50.0)), PointerAction::End]
        );
    }

    #[test]
    fn test_leave_flushes_latest_held_move() {
        let mut input = InputState::new(Point::ZERO, Duration::from_millis(10));
        let t0 = Instant::now();
        input.process(&down(0.0, 0.0), t0);
        input.process(&move_to(5.0, 5.0), t0 + Duration::from_millis(2));
        input.process(&move_to(8.0, 9.0), t0 + Duration::from_millis(5));
        assert_eq!(
            input.process(&PointerEvent::Leave, t0 + Duration::from_millis(6)),
            vec![PointerAction::Extend(Point::new(8.0, 9.0)), PointerAction::End]
        );
        // A new stroke starts clean.
        input.process(&down(1.0, 1.0), t0 + Duration::from_millis(20));
        assert_eq!(input.poll(t0 + Duration::from_millis(60)), None);
    }

    #[test]
    fn test_poll_emits_held_move_after_window() {
        let mut input = InputState::new(Point::ZERO, Duration::from_millis(10));
        let t0 = Instant::now();
        input.process(&down(0.0, 0.0), t0);
        input.process(&move_to(7.0, 3.0), t0 + Duration::from_millis(4));

        assert_eq!(input.poll(t0 + Duration::from_millis(8)), None);
        assert_eq!(
            input.poll(t0 + Duration::from_millis(10)),
            Some(PointerAction::Extend(Point::new(7.0, 3.0)))
        );
        assert_eq!(input.poll(t0 + Duration::from_millis(30)), None);
        assert_eq!(
            input.process(&PointerEvent::Up { button: MouseButton::Left }, t0 + Duration::from_millis(31)),
            vec![PointerAction::End]
        );
    }

    #[test]
    fn test_pointer_event_json() {
        let event: PointerEvent =
            serde_json::from_str(r#"{"type":"down","position":{"x":3,"y":4}}"#).unwrap();
        assert_eq!(event, down(3.0, 4.0));
        let event: PointerEvent = serde_json::from_str(r#"{"type":"up"}"#).unwrap();
        assert_eq!(event, PointerEvent::Up { button: MouseButton::Left });
    }
}
