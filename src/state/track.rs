//! Tracks and the transient editing state attached to them
//!
//! A [`Track`] owns its buffer through an `Arc` so history snapshots can share
//! unchanged audio. Buffers are never mutated in place; an edit swaps in a new
//! `Arc`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::SampleBuffer;
use crate::error::{CadenzaError, Result};

/// Opaque unique track identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(Uuid);

impl TrackId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First block is enough to tell tracks apart in logs
        let full = self.0.to_string();
        f.write_str(&full[..8])
    }
}

/// One track of the project
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub(crate) id: TrackId,
    pub(crate) name: String,
    pub(crate) buffer: Option<Arc<SampleBuffer>>,
    pub(crate) volume: f32,
    pub(crate) pan: f32,
    pub(crate) muted: bool,
    pub(crate) soloed: bool,
    pub(crate) background_color: Option<String>,
}

impl Track {
    /// A track at unity volume, centred, neither muted nor soloed
    pub fn new(name: impl Into<String>, buffer: Option<SampleBuffer>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            buffer: buffer.map(Arc::new),
            volume: 1.0,
            pan: 0.0,
            muted: false,
            soloed: false,
            background_color: None,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> Option<&SampleBuffer> {
        self.buffer.as_deref()
    }

    /// Shared handle to the buffer, for playback and background jobs
    pub fn shared_buffer(&self) -> Option<Arc<SampleBuffer>> {
        self.buffer.clone()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_soloed(&self) -> bool {
        self.soloed
    }

    pub fn background_color(&self) -> Option<&str> {
        self.background_color.as_deref()
    }

    /// Duration in seconds; zero while the track is empty
    pub fn duration(&self) -> f64 {
        self.buffer.as_ref().map_or(0.0, |b| b.duration_secs())
    }

    /// True if the track holds at least one frame
    pub fn has_audio(&self) -> bool {
        self.buffer.as_ref().is_some_and(|b| !b.is_empty())
    }

    /// Same id, metadata and shared buffer; samples are never compared
    pub(crate) fn same_as(&self, other: &Track) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.volume == other.volume
            && self.pan == other.pan
            && self.muted == other.muted
            && self.soloed == other.soloed
            && self.background_color == other.background_color
            && same_buffer(self.buffer.as_ref(), other.buffer.as_ref())
    }

    /// Copy of the metadata with a fresh id and the given buffer
    pub(crate) fn derive(&self, name: String, buffer: Option<SampleBuffer>) -> Self {
        Self {
            id: TrackId::new(),
            name,
            buffer: buffer.map(Arc::new),
            ..self.clone()
        }
    }
}

/// True if both sides point at the same buffer allocation, or both are empty
pub(crate) fn same_buffer(a: Option<&Arc<SampleBuffer>>, b: Option<&Arc<SampleBuffer>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Time interval on one track, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub track_id: TrackId,
    pub start: f64,
    pub end: f64,
}

impl Selection {
    /// Build a selection, rejecting negative or empty intervals
    pub fn new(track_id: TrackId, start: f64, end: f64) -> Result<Self> {
        check_interval(start, end)?;
        Ok(Self {
            track_id,
            start,
            end,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Global looping interval, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepeatRegion {
    pub start: f64,
    pub end: f64,
}

impl RepeatRegion {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        check_interval(start, end)?;
        Ok(Self { start, end })
    }

    /// Re-check a region that may have been built field by field
    pub fn validate(&self) -> Result<()> {
        check_interval(self.start, self.end)
    }

    /// True if `time` lies inside the region widened by `epsilon` on both sides
    pub fn contains(&self, time: f64, epsilon: f64) -> bool {
        time >= self.start - epsilon && time <= self.end + epsilon
    }
}

fn check_interval(start: f64, end: f64) -> Result<()> {
    if !(start.is_finite() && end.is_finite()) || start < 0.0 || end <= start {
        return Err(CadenzaError::invalid_range(format!(
            "interval [{}, {}] must satisfy 0 <= start < end",
            start, end
        )));
    }
    Ok(())
}

/// The undoable part of the store: what one history entry restores
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectState {
    pub tracks: Vec<Track>,
    pub repeat_region: Option<RepeatRegion>,
}

impl ProjectState {
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn position(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Longest track duration in seconds
    pub fn duration(&self) -> f64 {
        self.tracks.iter().map(Track::duration).fold(0.0, f64::max)
    }

    /// Track lists match under [`Track::same_as`]
    pub(crate) fn same_tracks(&self, other: &ProjectState) -> bool {
        self.tracks.len() == other.tracks.len()
            && self
                .tracks
                .iter()
                .zip(&other.tracks)
                .all(|(a, b)| a.same_as(b))
    }
}
