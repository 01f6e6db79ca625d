//! Per-user stroke table.

use std::collections::HashMap;

use crate::color::StrokeColor;
use crate::stroke::{Stroke, StrokeId, StrokeKey};

/// All strokes of a session, grouped by owner.
///
/// Users iterate in the order they were first seen and each user's strokes
/// iterate in creation order, so drawing order is stable between redraws.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeTable {
    /// Owners in first-seen order.
    users: Vec<String>,
    /// Each owner's strokes in creation order.
    strokes: HashMap<String, Vec<Stroke>>,
    /// Position of every stroke within its owner's sequence.
    index: HashMap<StrokeKey, usize>,
}

impl StrokeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from strokes in encounter order.
    ///
    /// Strokes sharing a key are merged: the first one's color wins and the
    /// later one's points are appended.
    pub fn from_strokes(strokes: impl IntoIterator<Item = Stroke>) -> Self {
        let mut table = Self::new();
        for stroke in strokes {
            let target = table.get_or_create(stroke.user(), stroke.id(), stroke.color());
            for point in stroke.points() {
                target.push(*point);
            }
        }
        table
    }

    /// Return the stroke for `(user, id)`, creating it with `color` if absent.
    ///
    /// The color of an existing stroke is never changed.
    pub fn get_or_create(&mut self, user: &str, id: StrokeId, color: StrokeColor) -> &mut Stroke {
        if !self.strokes.contains_key(user) {
            self.users.push(user.to_string());
        }
        let strokes = self.strokes.entry(user.to_string()).or_default();
        let position = *self
            .index
            .entry(StrokeKey::new(user, id))
            .or_insert_with_key(|key| {
                strokes.push(Stroke::new(key.clone(), color));
                strokes.len() - 1
            });
        &mut strokes[position]
    }

    pub fn contains(&self, key: &StrokeKey) -> bool {
        self.index.contains_key(key)
    }

    /// Get a stroke by key.
    pub fn get(&self, key: &StrokeKey) -> Option<&Stroke> {
        let position = *self.index.get(key)?;
        self.strokes.get(&key.user)?.get(position)
    }

    /// Every stroke, users in first-seen order, each user's strokes in creation order.
    pub fn all_strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.users
            .iter()
            .filter_map(|user| self.strokes.get(user))
            .flatten()
    }

    /// One user's strokes in creation order.
    pub fn user_strokes(&self, user: &str) -> &[Stroke] {
        self.strokes.get(user).map(Vec::as_slice).unwrap_or_default()
    }

    /// Users in first-seen order.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.iter().map(String::as_str)
    }

    /// Id of the most recently created stroke owned by `user`.
    pub fn last_stroke_id(&self, user: &str) -> Option<StrokeId> {
        self.strokes.get(user)?.last().map(Stroke::id)
    }

    /// Atomically swap the whole table for one built from `strokes`.
    pub fn replace_all(&mut self, strokes: impl IntoIterator<Item = Stroke>) {
        *self = Self::from_strokes(strokes);
    }

    /// Total number of strokes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Total number of points across all strokes.
    pub fn point_count(&self) -> usize {
        self.all_strokes().map(|stroke| stroke.points().len()).sum()
    }

    /// Consume the table, yielding strokes in drawing order.
    pub fn into_strokes(mut self) -> Vec<Stroke> {
        self.users
            .iter()
            .filter_map(|user| self.strokes.remove(user))
            .flatten()
            .collect()
    }
}
