//! Undo/Redo history
//!
//! A linear list of snapshots with a cursor. Entry 0 is the state the history
//! started from; the cursor always points at the entry matching the live
//! state. Committing drops everything after the cursor.

use std::fmt;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::track::ProjectState;

/// Kinds of undoable actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// The state history started from
    Initial,
    AddTrack,
    RemoveTrack,
    DeleteAllTracks,
    ApplyEffect,
    Split,
    Cut,
    Delete,
    Paste,
    SetRepeatRegion,
    /// Volume, pan, mute, solo, name or colour
    TrackProperty,
    LoadProject,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Initial => write!(f, "Initial"),
            ActionType::AddTrack => write!(f, "Add Track"),
            ActionType::RemoveTrack => write!(f, "Remove Track"),
            ActionType::DeleteAllTracks => write!(f, "Delete All Tracks"),
            ActionType::ApplyEffect => write!(f, "Apply Effect"),
            ActionType::Split => write!(f, "Split"),
            ActionType::Cut => write!(f, "Cut"),
            ActionType::Delete => write!(f, "Delete"),
            ActionType::Paste => write!(f, "Paste"),
            ActionType::SetRepeatRegion => write!(f, "Set Repeat Region"),
            ActionType::TrackProperty => write!(f, "Track Property"),
            ActionType::LoadProject => write!(f, "Load Project"),
        }
    }
}

/// One undoable snapshot
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub action_type: ActionType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub(crate) state: ProjectState,
}

impl HistoryEntry {
    fn new(action_type: ActionType, description: impl Into<String>, state: ProjectState) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type,
            description: description.into(),
            timestamp: Utc::now(),
            state,
        }
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }
}

/// Serializable view of one entry for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    pub id: String,
    pub action_type: ActionType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// True for the entry matching the live state
    pub current: bool,
}

/// Cursor-based linear history
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    position: usize,
    max_entries: usize,
}

impl History {
    /// Start a history at `initial`, keeping at most `max_entries` undo steps
    pub fn new(initial: ProjectState, max_entries: usize) -> Self {
        Self {
            entries: vec![HistoryEntry::new(ActionType::Initial, "Initial state", initial)],
            position: 0,
            max_entries: max_entries.max(1),
        }
    }

    /// Record `state` as the new present, discarding any redo tail
    pub fn commit(&mut self, action_type: ActionType, description: impl Into<String>, state: ProjectState) {
        self.entries.truncate(self.position + 1);
        self.entries
            .push(HistoryEntry::new(action_type, description, state));
        self.position = self.entries.len() - 1;
        self.trim();
    }

    /// Drop the oldest entries beyond the undo limit
    fn trim(&mut self) {
        let excess = self.entries.len().saturating_sub(self.max_entries + 1);
        if excess > 0 {
            self.entries.drain(..excess);
            self.position -= excess;
            debug!("Trimmed {} history entries", excess);
        }
    }

    /// Step back; returns the restored state, or None at the oldest entry
    pub fn undo(&mut self) -> Option<&ProjectState> {
        if !self.can_undo() {
            return None;
        }
        self.position -= 1;
        Some(&self.entries[self.position].state)
    }

    /// Step forward; returns the restored state, or None at the newest entry
    pub fn redo(&mut self) -> Option<&ProjectState> {
        if !self.can_redo() {
            return None;
        }
        self.position += 1;
        Some(&self.entries[self.position].state)
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position + 1 < self.entries.len()
    }

    /// Cursor into the entry list
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry matching the live state
    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.position]
    }

    /// The entry the next undo would leave
    pub fn undo_description(&self) -> Option<&str> {
        self.can_undo()
            .then(|| self.entries[self.position].description.as_str())
    }

    /// The entry the next redo would restore
    pub fn redo_description(&self) -> Option<&str> {
        self.can_redo()
            .then(|| self.entries[self.position + 1].description.as_str())
    }

    /// Collapse to a single entry holding `state`
    pub fn reset(&mut self, state: ProjectState) {
        self.entries = vec![HistoryEntry::new(ActionType::Initial, "Initial state", state)];
        self.position = 0;
    }

    /// Display list, oldest first
    pub fn summary(&self) -> Vec<HistoryItem> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| HistoryItem {
                id: e.id.to_string(),
                action_type: e.action_type,
                description: e.description.clone(),
                timestamp: e.timestamp,
                current: i == self.position,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::track::RepeatRegion;
    use pretty_assertions::assert_eq;

    fn state(marker: f64) -> ProjectState {
        ProjectState {
            tracks: Vec::new(),
            repeat_region: Some(RepeatRegion::new(0.0, marker).unwrap()),
        }
    }

    #[test]
    fn test_undo_redo_walk() {
        let mut history = History::new(ProjectState::default(), 10);
        assert!(!history.can_undo());

        history.commit(ActionType::SetRepeatRegion, "one", state(1.0));
        history.commit(ActionType::SetRepeatRegion, "two", state(2.0));
        assert_eq!(history.position(), 2);

        assert_eq!(history.undo(), Some(&state(1.0)));
        assert_eq!(history.undo(), Some(&ProjectState::default()));
        assert_eq!(history.undo(), None);

        assert_eq!(history.redo(), Some(&state(1.0)));
        assert_eq!(history.redo_description(), Some("two"));
    }

    #[test]
    fn test_commit_truncates_redo_tail() {
        let mut history = History::new(ProjectState::default(), 10);
        history.commit(ActionType::SetRepeatRegion, "one", state(1.0));
        history.commit(ActionType::SetRepeatRegion, "two", state(2.0));
        history.undo();
        history.commit(ActionType::SetRepeatRegion, "three", state(3.0));

        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(history.current().description, "three");
    }

    #[test]
    fn test_trim_keeps_limit() {
        let mut history = History::new(ProjectState::default(), 2);
        for i in 1..=5 {
            history.commit(ActionType::SetRepeatRegion, format!("step {}", i), state(i as f64));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.position(), 2);
        history.undo();
        history.undo();
        assert!(!history.can_undo());
        assert_eq!(history.current().state(), &state(3.0));
    }

    #[test]
    fn test_summary_marks_cursor() {
        let mut history = History::new(ProjectState::default(), 10);
        history.commit(ActionType::AddTrack, "Add track", ProjectState::default());
        history.undo();
        let summary = history.summary();
        assert_eq!(summary.len(), 2);
        assert!(summary[0].current);
        assert!(!summary[1].current);
        assert_eq!(summary[1].action_type, ActionType::AddTrack);
    }

    #[test]
    fn test_reset_collapses() {
        let mut history = History::new(ProjectState::default(), 10);
        history.commit(ActionType::AddTrack, "Add track", state(1.0));
        history.reset(ProjectState::default());
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
