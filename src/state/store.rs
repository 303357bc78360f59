//! Track Store
//!
//! The authoritative editing state: the ordered track list, repeat region,
//! selection, clipboard, current track and paste cursor. Every change to the
//! track list or repeat region goes through [`TrackStore::commit`], which
//! records a history entry; a command that fails is never committed and
//! leaves the store exactly as it was.
//!
//! Selection, clipboard, current track and cursor are transient: undo does
//! not roll them back.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};

use super::history::{ActionType, History, HistoryItem};
use super::jobs::JobRegistry;
use super::observer::{Observers, StoreEvent, SubscriptionId};
use super::scope::{resolve, Scope, Target};
use super::track::{same_buffer, ProjectState, RepeatRegion, Selection, Track, TrackId};
use crate::config::EditorConfig;
use crate::dsp::{apply_effect, mixdown, EffectSpec, MixSource};
use crate::engine::{SampleBuffer, SampleRange};
use crate::error::{CadenzaError, Result};

/// In-memory project state with linear undo/redo
#[derive(Debug)]
pub struct TrackStore {
    pub(crate) state: ProjectState,
    history: History,
    selection: Option<Selection>,
    current_track: Option<TrackId>,
    clipboard: Option<Arc<SampleBuffer>>,
    cursor: f64,
    observers: Observers,
    pub(crate) jobs: JobRegistry,
    versions: HashMap<TrackId, u64>,
    version_counter: u64,
    default_sample_rate: u32,
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

impl TrackStore {
    /// Create an empty store
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            state: ProjectState::default(),
            history: History::new(ProjectState::default(), config.max_history),
            selection: None,
            current_track: None,
            clipboard: None,
            cursor: 0.0,
            observers: Observers::default(),
            jobs: JobRegistry::default(),
            versions: HashMap::new(),
            version_counter: 0,
            default_sample_rate: config.default_sample_rate,
        }
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn tracks(&self) -> &[Track] {
        &self.state.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.state.track(id)
    }

    pub(crate) fn require_track(&self, id: TrackId) -> Result<&Track> {
        self.state
            .track(id)
            .ok_or_else(|| CadenzaError::TrackNotFound {
                track_id: id.to_string(),
            })
    }

    /// The undoable part of the state
    pub fn project_state(&self) -> &ProjectState {
        &self.state
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn current_track(&self) -> Option<TrackId> {
        self.current_track
    }

    pub fn clipboard(&self) -> Option<&SampleBuffer> {
        self.clipboard.as_deref()
    }

    pub fn repeat_region(&self) -> Option<RepeatRegion> {
        self.state.repeat_region
    }

    /// Paste position in seconds
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Longest track duration in seconds
    pub fn duration(&self) -> f64 {
        self.state.duration()
    }

    pub fn default_sample_rate(&self) -> u32 {
        self.default_sample_rate
    }

    /// Version stamp of a track's buffer; changes whenever the buffer may have
    pub fn buffer_version(&self, id: TrackId) -> Option<u64> {
        self.versions.get(&id).copied()
    }

    /// `TrackBusy` while a background job holds the track
    fn ensure_idle(&self, id: TrackId) -> Result<()> {
        if self.jobs.is_busy(id) {
            return Err(CadenzaError::TrackBusy {
                track_id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Resolve a scope against the current selection and track
    pub fn resolve_scope(&self, scope: Scope) -> Vec<Target> {
        resolve(
            scope,
            &self.state.tracks,
            self.current_track,
            self.selection.as_ref(),
        )
    }

    // ========================================================================
    // History
    // ========================================================================

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Description of the edit the next undo reverts
    pub fn undo_description(&self) -> Option<&str> {
        self.history.undo_description()
    }

    /// Description of the edit the next redo reapplies
    pub fn redo_description(&self) -> Option<&str> {
        self.history.redo_description()
    }

    /// History entries, oldest first, with the live one marked
    pub fn history_summary(&self) -> Vec<HistoryItem> {
        self.history.summary()
    }

    /// Replace the undoable state and record a history entry
    pub(crate) fn commit(
        &mut self,
        action_type: ActionType,
        description: impl Into<String>,
        next: ProjectState,
    ) {
        let description = description.into();
        let previous = std::mem::replace(&mut self.state, next);

        if !previous.same_tracks(&self.state) {
            self.observers.emit(StoreEvent::TracksChanged);
        }
        if previous.repeat_region != self.state.repeat_region {
            self.observers.emit(StoreEvent::RepeatRegionChanged);
        }
        self.refresh_versions(&previous, false);
        self.drop_dangling_refs();

        self.history
            .commit(action_type, description.clone(), self.state.clone());
        self.observers.emit(StoreEvent::HistoryChanged);
        info!("{}: {}", action_type, description);
        self.observers.flush();
    }

    /// Step back one entry; false if there is nothing to undo
    pub fn undo(&mut self) -> bool {
        let description = self.undo_description().unwrap_or_default().to_string();
        let Some(restored) = self.history.undo().cloned() else {
            debug!("Nothing to undo");
            return false;
        };
        self.restore(restored);
        info!("Undo: {} (position {})", description, self.history.position());
        true
    }

    /// Step forward one entry; false if there is nothing to redo
    pub fn redo(&mut self) -> bool {
        let description = self.redo_description().unwrap_or_default().to_string();
        let Some(restored) = self.history.redo().cloned() else {
            debug!("Nothing to redo");
            return false;
        };
        self.restore(restored);
        info!("Redo: {} (position {})", description, self.history.position());
        true
    }

    fn restore(&mut self, restored: ProjectState) {
        let previous = std::mem::replace(&mut self.state, restored);
        if !previous.same_tracks(&self.state) {
            self.observers.emit(StoreEvent::TracksChanged);
        }
        if previous.repeat_region != self.state.repeat_region {
            self.observers.emit(StoreEvent::RepeatRegionChanged);
        }
        // Every buffer counts as changed so pending jobs are discarded
        self.refresh_versions(&previous, true);
        self.drop_dangling_refs();
        self.observers.emit(StoreEvent::HistoryChanged);
        self.observers.flush();
    }

    /// Clear everything and collapse history to one empty entry
    ///
    /// Not undoable.
    pub fn reset(&mut self) {
        self.state = ProjectState::default();
        self.history.reset(ProjectState::default());
        self.selection = None;
        self.current_track = None;
        self.clipboard = None;
        self.cursor = 0.0;
        self.jobs.clear();
        self.versions.clear();
        for event in [
            StoreEvent::TracksChanged,
            StoreEvent::SelectionChanged,
            StoreEvent::CurrentTrackChanged,
            StoreEvent::RepeatRegionChanged,
            StoreEvent::ClipboardChanged,
            StoreEvent::HistoryChanged,
        ] {
            self.observers.emit(event);
        }
        info!("Store reset");
        self.observers.flush();
    }

    fn refresh_versions(&mut self, previous: &ProjectState, force: bool) {
        let mut versions = HashMap::with_capacity(self.state.tracks.len());
        for track in &self.state.tracks {
            let old = previous.track(track.id);
            let unchanged = !force
                && old.is_some_and(|old| same_buffer(old.buffer.as_ref(), track.buffer.as_ref()));
            let version = match self.versions.get(&track.id) {
                Some(&v) if unchanged => v,
                _ => {
                    self.version_counter += 1;
                    self.version_counter
                }
            };
            versions.insert(track.id, version);
        }
        self.versions = versions;
    }

    /// Forget a selection or current track that no longer exists
    fn drop_dangling_refs(&mut self) {
        if let Some(sel) = self.selection {
            if self.state.track(sel.track_id).is_none() {
                self.selection = None;
                self.observers.emit(StoreEvent::SelectionChanged);
            }
        }
        if let Some(id) = self.current_track {
            if self.state.track(id).is_none() {
                self.current_track = None;
                self.observers.emit(StoreEvent::CurrentTrackChanged);
            }
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Register a callback for store changes
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(StoreEvent) + Send + 'static,
    {
        self.observers.subscribe(Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ========================================================================
    // Track list
    // ========================================================================

    /// Append a track; it becomes current if no track is
    pub fn add_track(&mut self, name: impl Into<String>, buffer: Option<SampleBuffer>) -> TrackId {
        let track = Track::new(name, buffer);
        let id = track.id;
        let description = format!("Add track '{}'", track.name);

        let mut next = self.state.clone();
        next.tracks.push(track);
        if self.current_track.is_none() {
            self.current_track = Some(id);
            self.observers.emit(StoreEvent::CurrentTrackChanged);
        }
        self.commit(ActionType::AddTrack, description, next);
        id
    }

    /// Remove one track
    pub fn remove_track(&mut self, id: TrackId) -> Result<()> {
        let index = self
            .state
            .position(id)
            .ok_or_else(|| CadenzaError::TrackNotFound {
                track_id: id.to_string(),
            })?;
        self.ensure_idle(id)?;
        let mut next = self.state.clone();
        let removed = next.tracks.remove(index);
        self.commit(
            ActionType::RemoveTrack,
            format!("Remove track '{}'", removed.name),
            next,
        );
        Ok(())
    }

    /// Remove every track
    pub fn delete_all_tracks(&mut self) -> Result<()> {
        if self.state.tracks.is_empty() {
            return Err(CadenzaError::EmptyOperation {
                operation: "delete all tracks: there are none".to_string(),
            });
        }
        for track in &self.state.tracks {
            self.ensure_idle(track.id)?;
        }
        let mut next = self.state.clone();
        next.tracks.clear();
        self.commit(ActionType::DeleteAllTracks, "Delete all tracks", next);
        Ok(())
    }

    /// Choose the track that track-scoped edits and paste act on
    pub fn set_current_track(&mut self, id: Option<TrackId>) -> Result<()> {
        if let Some(id) = id {
            self.require_track(id)?;
        }
        if self.current_track != id {
            self.current_track = id;
            self.observers.emit(StoreEvent::CurrentTrackChanged);
            self.observers.flush();
        }
        Ok(())
    }

    // ========================================================================
    // Track properties (undoable)
    // ========================================================================

    fn update_track<F>(&mut self, id: TrackId, description: String, update: F) -> Result<()>
    where
        F: FnOnce(&mut Track),
    {
        let index = self
            .state
            .position(id)
            .ok_or_else(|| CadenzaError::TrackNotFound {
                track_id: id.to_string(),
            })?;
        let mut next = self.state.clone();
        update(&mut next.tracks[index]);
        if next.tracks[index].same_as(&self.state.tracks[index]) {
            return Ok(());
        }
        self.commit(ActionType::TrackProperty, description, next);
        Ok(())
    }

    pub fn rename_track(&mut self, id: TrackId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.update_track(id, format!("Rename track to '{}'", name), |t| t.name = name)
    }

    /// Set linear volume, `>= 0`
    pub fn set_volume(&mut self, id: TrackId, volume: f32) -> Result<()> {
        if !(volume.is_finite() && volume >= 0.0) {
            return Err(CadenzaError::invalid_parameter("volume", volume, ">= 0"));
        }
        self.update_track(id, format!("Set volume to {:.2}", volume), |t| {
            t.volume = volume
        })
    }

    /// Set pan in [-1, 1]
    pub fn set_pan(&mut self, id: TrackId, pan: f32) -> Result<()> {
        if !(pan.is_finite() && (-1.0..=1.0).contains(&pan)) {
            return Err(CadenzaError::invalid_parameter("pan", pan, "[-1, 1]"));
        }
        self.update_track(id, format!("Set pan to {:.2}", pan), |t| t.pan = pan)
    }

    pub fn set_muted(&mut self, id: TrackId, muted: bool) -> Result<()> {
        let label = if muted { "Mute" } else { "Unmute" };
        self.update_track(id, format!("{} track", label), |t| t.muted = muted)
    }

    pub fn set_soloed(&mut self, id: TrackId, soloed: bool) -> Result<()> {
        let label = if soloed { "Solo" } else { "Unsolo" };
        self.update_track(id, format!("{} track", label), |t| t.soloed = soloed)
    }

    pub fn set_background_color(&mut self, id: TrackId, color: Option<String>) -> Result<()> {
        self.update_track(id, "Set track colour".to_string(), |t| {
            t.background_color = color
        })
    }

    // ========================================================================
    // Selection, cursor, repeat region
    // ========================================================================

    /// Select `[start, end)` seconds on a track; the track becomes current
    pub fn set_selection(&mut self, track_id: TrackId, start: f64, end: f64) -> Result<()> {
        self.require_track(track_id)?;
        let selection = Selection::new(track_id, start, end)?;
        self.selection = Some(selection);
        self.observers.emit(StoreEvent::SelectionChanged);
        if self.current_track != Some(track_id) {
            self.current_track = Some(track_id);
            self.observers.emit(StoreEvent::CurrentTrackChanged);
        }
        self.observers.flush();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.selection.take().is_some() {
            self.observers.emit(StoreEvent::SelectionChanged);
            self.observers.flush();
        }
    }

    /// Move the paste cursor, in seconds
    pub fn set_cursor(&mut self, seconds: f64) -> Result<()> {
        if !(seconds.is_finite() && seconds >= 0.0) {
            return Err(CadenzaError::invalid_parameter("cursor", seconds, ">= 0 seconds"));
        }
        self.cursor = seconds;
        Ok(())
    }

    /// Set or clear the global repeat region
    pub fn set_repeat_region(&mut self, region: Option<RepeatRegion>) -> Result<()> {
        if let Some(region) = &region {
            region.validate()?;
        }
        if self.state.repeat_region == region {
            return Ok(());
        }
        let description = match region {
            Some(r) => format!("Repeat {:.2}s - {:.2}s", r.start, r.end),
            None => "Clear repeat region".to_string(),
        };
        let mut next = self.state.clone();
        next.repeat_region = region;
        self.commit(ActionType::SetRepeatRegion, description, next);
        Ok(())
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Apply an effect to the tracks `scope` resolves to
    ///
    /// Returns the number of tracks changed. A scope that resolves to nothing
    /// is a no-op, not an error. All targets are processed before anything is
    /// committed, so one failing target leaves every track untouched.
    pub fn apply_effect(&mut self, effect: &EffectSpec, scope: Scope) -> Result<usize> {
        let processor = effect.as_effect();
        if let Err(e) = processor.validate() {
            warn!("Rejected {}: {}", effect, e);
            return Err(e);
        }

        let targets = self.resolve_scope(scope);
        if targets.is_empty() {
            debug!("{} with scope '{}' has no targets", effect, scope);
            return Ok(0);
        }
        for target in &targets {
            self.ensure_idle(target.track_id)?;
        }

        let mut next = self.state.clone();
        for target in &targets {
            let Some(track) = next.tracks.iter_mut().find(|t| t.id == target.track_id) else {
                continue;
            };
            let Some(buffer) = track.buffer.as_deref() else {
                continue;
            };
            let processed = apply_effect(processor, buffer, target.range)?;
            track.buffer = Some(Arc::new(processed));
        }

        self.commit(
            ActionType::ApplyEffect,
            format!("{} ({})", effect, scope),
            next,
        );
        Ok(targets.len())
    }

    /// Split a track at `offset` seconds into two adjacent tracks
    ///
    /// The original keeps `[0, offset)`; a new track right after it holds the
    /// rest and copies its volume, pan, mute, solo and colour.
    pub fn split_track(&mut self, id: TrackId, offset: f64) -> Result<TrackId> {
        let index = self
            .state
            .position(id)
            .ok_or_else(|| CadenzaError::TrackNotFound {
                track_id: id.to_string(),
            })?;
        self.ensure_idle(id)?;
        let track = &self.state.tracks[index];
        let buffer = track.buffer().ok_or_else(|| CadenzaError::EmptyOperation {
            operation: "split an empty track".to_string(),
        })?;
        if !(offset > 0.0 && offset < buffer.duration_secs()) {
            return Err(CadenzaError::invalid_range(format!(
                "split offset {:.3}s must lie inside (0, {:.3})",
                offset,
                buffer.duration_secs()
            )));
        }
        let frame = buffer.frame_at(offset);
        if frame == 0 || frame >= buffer.len() {
            return Err(CadenzaError::invalid_range(format!(
                "split offset {:.3}s rounds to the track boundary",
                offset
            )));
        }

        let head = buffer.slice(SampleRange::new(0, frame))?;
        let tail = buffer.slice(SampleRange::new(frame, buffer.len()))?;
        let second = track.derive(format!("{} (split)", track.name), Some(tail));
        let second_id = second.id;
        let description = format!("Split '{}' at {:.2}s", track.name, offset);

        let mut next = self.state.clone();
        next.tracks[index].buffer = Some(Arc::new(head));
        next.tracks.insert(index + 1, second);

        if self.selection.is_some_and(|s| s.track_id == id) {
            self.selection = None;
            self.observers.emit(StoreEvent::SelectionChanged);
        }
        self.commit(ActionType::Split, description, next);
        Ok(second_id)
    }

    /// Selection, the index of its track and its clamped frame range
    fn selected_region(&self, operation: &str) -> Result<(Selection, usize, SampleRange)> {
        let selection = self.selection.ok_or_else(|| CadenzaError::EmptyOperation {
            operation: format!("{} without a selection", operation),
        })?;
        let index = self
            .state
            .position(selection.track_id)
            .ok_or_else(|| CadenzaError::TrackNotFound {
                track_id: selection.track_id.to_string(),
            })?;
        let buffer = self.state.tracks[index]
            .buffer()
            .ok_or_else(|| CadenzaError::EmptyOperation {
                operation: format!("{} on an empty track", operation),
            })?;
        let range = buffer.range_for(selection.start, selection.end);
        if range.is_empty() {
            return Err(CadenzaError::invalid_range(format!(
                "selection {:.3}s - {:.3}s lies outside the track",
                selection.start, selection.end
            )));
        }
        Ok((selection, index, range))
    }

    /// Snapshot the selected audio into the clipboard
    pub fn copy(&mut self) -> Result<()> {
        let (_, index, range) = self.selected_region("copy")?;
        let copied = self.state.tracks[index]
            .buffer()
            .map(|b| b.slice(range))
            .transpose()?;
        self.clipboard = copied.map(Arc::new);
        self.observers.emit(StoreEvent::ClipboardChanged);
        self.observers.flush();
        Ok(())
    }

    /// Copy the selection, then excise it
    pub fn cut(&mut self) -> Result<()> {
        let (_, index, range) = self.selected_region("cut")?;
        let copied = self.state.tracks[index]
            .buffer()
            .map(|b| b.slice(range))
            .transpose()?;
        self.excise_selection(ActionType::Cut, "Cut")?;
        self.clipboard = copied.map(Arc::new);
        self.observers.emit(StoreEvent::ClipboardChanged);
        self.observers.flush();
        Ok(())
    }

    /// Excise the selection without touching the clipboard
    pub fn delete_selection(&mut self) -> Result<()> {
        self.excise_selection(ActionType::Delete, "Delete")
    }

    fn excise_selection(&mut self, action_type: ActionType, label: &str) -> Result<()> {
        let (selection, index, range) = self.selected_region(&label.to_lowercase())?;
        self.ensure_idle(selection.track_id)?;
        let remaining = match self.state.tracks[index].buffer() {
            Some(buffer) => buffer.excise(range)?,
            None => return Ok(()),
        };

        let mut next = self.state.clone();
        let track = &mut next.tracks[index];
        // An emptied track is cleared rather than removed
        track.buffer = if remaining.is_empty() {
            None
        } else {
            Some(Arc::new(remaining))
        };
        let description = format!(
            "{} {:.2}s - {:.2}s from '{}'",
            label, selection.start, selection.end, track.name
        );

        self.selection = None;
        self.cursor = selection.start;
        self.observers.emit(StoreEvent::SelectionChanged);
        self.commit(action_type, description, next);
        Ok(())
    }

    /// Insert the clipboard into the current track at the cursor
    ///
    /// The clipboard is converted to the track's sample rate and channel
    /// count first.
    pub fn paste(&mut self) -> Result<()> {
        let clipboard = self
            .clipboard
            .clone()
            .ok_or_else(|| CadenzaError::EmptyOperation {
                operation: "paste with an empty clipboard".to_string(),
            })?;
        let id = self.current_track.ok_or_else(|| CadenzaError::EmptyOperation {
            operation: "paste without a current track".to_string(),
        })?;
        self.ensure_idle(id)?;
        let index = self
            .state
            .position(id)
            .ok_or_else(|| CadenzaError::TrackNotFound {
                track_id: id.to_string(),
            })?;

        let pasted = match self.state.tracks[index].buffer() {
            Some(buffer) => {
                let conformed = clipboard.conform_to(buffer)?;
                buffer.insert(buffer.frame_at(self.cursor), &conformed)?
            }
            None => clipboard.as_ref().clone(),
        };

        let mut next = self.state.clone();
        next.tracks[index].buffer = Some(Arc::new(pasted));
        let description = format!(
            "Paste {:.2}s into '{}' at {:.2}s",
            clipboard.duration_secs(),
            next.tracks[index].name,
            self.cursor
        );
        self.commit(ActionType::Paste, description, next);
        Ok(())
    }

    // ========================================================================
    // Load / export
    // ========================================================================

    /// Replace the whole project, as one undoable step
    ///
    /// Clears selection, clipboard and cursor; the first track becomes current.
    pub fn load_state(&mut self, state: ProjectState, description: impl Into<String>) {
        self.selection = None;
        self.clipboard = None;
        self.cursor = 0.0;
        self.current_track = state.tracks.first().map(|t| t.id);
        for event in [
            StoreEvent::SelectionChanged,
            StoreEvent::ClipboardChanged,
            StoreEvent::CurrentTrackChanged,
        ] {
            self.observers.emit(event);
        }
        self.commit(ActionType::LoadProject, description, state);
    }

    /// Mix every contributing track into one stereo buffer
    ///
    /// # Errors
    /// * `EmptyOperation` - no track contributes audio
    pub fn export_mixdown(&self, sample_rate: u32) -> Result<SampleBuffer> {
        // One consistent view of every track for the whole render
        let snapshot: Vec<Track> = self.state.tracks.clone();
        // A soloed track without audio still silences the others
        let any_soloed = snapshot.iter().any(|t| t.soloed);
        let sources: Vec<MixSource<'_>> = snapshot
            .iter()
            .filter(|t| !any_soloed || t.soloed)
            .filter_map(|t| {
                t.buffer().map(|buffer| MixSource {
                    buffer,
                    volume: t.volume,
                    pan: t.pan,
                    muted: t.muted,
                    soloed: t.soloed,
                })
            })
            .collect();

        let mixed = mixdown(&sources, sample_rate)?.ok_or_else(|| CadenzaError::EmptyOperation {
            operation: "export: no track contributes audio".to_string(),
        })?;
        info!(
            "Mixed {} tracks into {:.2}s at {} Hz",
            sources.len(),
            mixed.duration_secs(),
            sample_rate
        );
        Ok(mixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::Amplify;
    use crate::state::observer::StoreEvent;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn ramp(len: usize, sample_rate: u32) -> SampleBuffer {
        let samples = (0..len).map(|i| i as f32 / len as f32).collect();
        SampleBuffer::mono(samples, sample_rate).unwrap()
    }

    #[test]
    fn test_add_track_sets_current_and_history() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", Some(ramp(10, 10)));
        assert_eq!(store.current_track(), Some(id));
        assert!(store.can_undo());

        assert!(store.undo());
        assert!(store.tracks().is_empty());
        assert_eq!(store.current_track(), None);
        assert!(store.redo());
        assert_eq!(store.tracks().len(), 1);
    }

    #[test]
    fn test_undo_redo_restores_exact_state() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", Some(ramp(100, 10)));
        let before = store.project_state().clone();

        store
            .apply_effect(&EffectSpec::Amplify(Amplify { gain: 0.5 }), Scope::Track)
            .unwrap();
        let after = store.project_state().clone();
        assert_ne!(before, after);

        store.undo();
        assert_eq!(store.project_state(), &before);
        store.redo();
        assert_eq!(store.project_state(), &after);
        assert_eq!(store.track(id).unwrap().buffer().unwrap().len(), 100);
    }

    #[test]
    fn test_failed_command_is_not_committed() {
        let mut store = TrackStore::default();
        store.add_track("One", Some(ramp(100, 10)));
        let entries = store.history_summary().len();

        let err = store
            .apply_effect(&EffectSpec::Amplify(Amplify { gain: -1.0 }), Scope::All)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
        assert_eq!(store.history_summary().len(), entries);
    }

    #[test]
    fn test_scope_without_target_is_noop() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", Some(ramp(100, 10)));
        store.set_current_track(None).unwrap();
        let changed = store.apply_effect(&EffectSpec::Reverse, Scope::Track).unwrap();
        assert_eq!(changed, 0);
        assert_eq!(store.history_summary().len(), 2);
        assert_eq!(store.track(id).unwrap().buffer().unwrap().channel(0)[0], 0.0);
    }

    #[test]
    fn test_properties_are_undoable() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", None);
        store.set_volume(id, 0.25).unwrap();
        store.set_pan(id, -0.5).unwrap();
        store.set_muted(id, true).unwrap();
        store.rename_track(id, "Bass").unwrap();

        let track = store.track(id).unwrap();
        assert_eq!(track.name(), "Bass");
        assert!(track.is_muted());

        store.undo();
        store.undo();
        let track = store.track(id).unwrap();
        assert_eq!(track.name(), "One");
        assert!(!track.is_muted());
        assert_eq!(track.pan(), -0.5);
    }

    #[test]
    fn test_property_validation() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", None);
        assert!(store.set_volume(id, -0.1).is_err());
        assert!(store.set_pan(id, 1.5).is_err());
        assert!(store.set_volume(TrackId::new(), 1.0).is_err());
    }

    #[test]
    fn test_unchanged_property_skips_history() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", None);
        store.set_volume(id, 1.0).unwrap();
        assert_eq!(store.history_summary().len(), 2);
    }

    #[test]
    fn test_copy_paste_inserts_at_cursor() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", Some(ramp(10, 10)));
        store.set_selection(id, 0.2, 0.4).unwrap();
        store.copy().unwrap();
        assert_eq!(store.clipboard().unwrap().len(), 2);
        assert_eq!(store.track(id).unwrap().buffer().unwrap().len(), 10);

        store.set_cursor(1.0).unwrap();
        store.paste().unwrap();
        let buffer = store.track(id).unwrap().buffer().unwrap();
        assert_eq!(buffer.len(), 12);
        assert_abs_diff_eq!(buffer.channel(0)[10], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_cut_whole_track_clears_buffer() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", Some(ramp(10, 10)));
        store.set_selection(id, 0.0, 1.0).unwrap();
        store.cut().unwrap();
        assert!(store.track(id).unwrap().buffer().is_none());
        assert_eq!(store.tracks().len(), 1);

        store.paste().unwrap();
        assert_eq!(store.track(id).unwrap().buffer().unwrap(), &ramp(10, 10));
    }

    #[test]
    fn test_clipboard_survives_undo() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", Some(ramp(10, 10)));
        store.set_selection(id, 0.0, 0.5).unwrap();
        store.cut().unwrap();
        store.undo();
        assert_eq!(store.track(id).unwrap().buffer().unwrap().len(), 10);
        assert_eq!(store.clipboard().unwrap().len(), 5);
    }

    #[test]
    fn test_edit_commands_need_targets() {
        let mut store = TrackStore::default();
        assert_eq!(store.copy().unwrap_err().error_code(), "EMPTY_OPERATION");
        assert_eq!(store.paste().unwrap_err().error_code(), "EMPTY_OPERATION");
        assert_eq!(
            store.delete_all_tracks().unwrap_err().error_code(),
            "EMPTY_OPERATION"
        );
        assert_eq!(
            store.export_mixdown(44100).unwrap_err().error_code(),
            "EMPTY_OPERATION"
        );
    }

    #[test]
    fn test_split_rejects_boundaries() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", Some(ramp(10, 10)));
        assert_eq!(
            store.split_track(id, 0.0).unwrap_err().error_code(),
            "INVALID_RANGE"
        );
        assert_eq!(
            store.split_track(id, 1.0).unwrap_err().error_code(),
            "INVALID_RANGE"
        );
        let second = store.split_track(id, 0.3).unwrap();
        assert_eq!(store.track(second).unwrap().name(), "One (split)");
        assert_eq!(store.tracks()[1].id(), second);
    }

    #[test]
    fn test_remove_track_drops_selection() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", Some(ramp(10, 10)));
        store.set_selection(id, 0.1, 0.5).unwrap();
        store.remove_track(id).unwrap();
        assert!(store.selection().is_none());
        assert!(store.current_track().is_none());
    }

    #[test]
    fn test_observers_notified_on_commit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut store = TrackStore::default();
        store.subscribe(move |event| sink.lock().unwrap().push(event));

        store.add_track("One", None);
        let events = seen.lock().unwrap().clone();
        assert!(events.contains(&StoreEvent::TracksChanged));
        assert!(events.contains(&StoreEvent::CurrentTrackChanged));
        assert!(events.contains(&StoreEvent::HistoryChanged));
    }

    #[test]
    fn test_reset_is_not_undoable() {
        let mut store = TrackStore::default();
        let id = store.add_track("One", Some(ramp(10, 10)));
        store.set_selection(id, 0.0, 0.5).unwrap();
        store.copy().unwrap();
        store
            .set_repeat_region(Some(RepeatRegion::new(0.0, 0.5).unwrap()))
            .unwrap();

        store.reset();
        assert!(store.tracks().is_empty());
        assert!(store.clipboard().is_none());
        assert!(store.selection().is_none());
        assert!(store.repeat_region().is_none());
        assert!(!store.can_undo());
        assert_eq!(store.history_summary().len(), 1);
    }

    #[test]
    fn test_inverted_repeat_region_is_rejected() {
        let mut store = TrackStore::default();
        store.add_track("One", Some(ramp(100, 10)));
        let entries = store.history_summary().len();

        let err = store
            .set_repeat_region(Some(RepeatRegion { start: 8.0, end: 5.0 }))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RANGE");
        assert!(store.repeat_region().is_none());
        assert_eq!(store.history_summary().len(), entries);
    }

    #[test]
    fn test_undo_redo_descriptions() {
        let mut store = TrackStore::default();
        assert_eq!(store.undo_description(), None);
        let id = store.add_track("One", None);
        store.rename_track(id, "Bass").unwrap();
        assert_eq!(store.undo_description(), Some("Rename track to 'Bass'"));
        assert_eq!(store.redo_description(), None);

        store.undo();
        assert_eq!(store.undo_description(), Some("Add track 'One'"));
        assert_eq!(store.redo_description(), Some("Rename track to 'Bass'"));
    }

    #[test]
    fn test_versions_follow_buffers() {
        let mut store = TrackStore::default();
        let a = store.add_track("A", Some(ramp(10, 10)));
        let b = store.add_track("B", Some(ramp(10, 10)));
        let (va, vb) = (store.buffer_version(a), store.buffer_version(b));

        store.set_current_track(Some(a)).unwrap();
        store.apply_effect(&EffectSpec::Reverse, Scope::Track).unwrap();
        assert_ne!(store.buffer_version(a), va);
        assert_eq!(store.buffer_version(b), vb);

        store.undo();
        assert_ne!(store.buffer_version(b), vb);
    }

    #[test]
    fn test_history_trimmed_to_config() {
        let config = EditorConfig {
            max_history: 3,
            ..EditorConfig::default()
        };
        let mut store = TrackStore::new(&config);
        let id = store.add_track("One", None);
        for i in 0..10 {
            store.set_volume(id, i as f32 * 0.1 + 0.05).unwrap();
        }
        assert_eq!(store.history_summary().len(), 4);
        assert!(store.undo() && store.undo() && store.undo());
        assert!(!store.undo());
    }
}
