//! Scope resolution
//!
//! Turns a user-facing scope plus the store's current track and selection into
//! the concrete (track, frame range) pairs an edit applies to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::track::{Selection, Track, TrackId};
use crate::engine::SampleRange;
use crate::error::{CadenzaError, Result};

/// Which part of the project an effect applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Every track holding audio
    All,
    /// The current track
    #[default]
    Track,
    /// The active selection, or the current track when nothing is selected
    Selection,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Track => write!(f, "track"),
            Scope::Selection => write!(f, "selection"),
        }
    }
}

impl FromStr for Scope {
    type Err = CadenzaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Scope::All),
            "track" => Ok(Scope::Track),
            "selection" => Ok(Scope::Selection),
            other => Err(CadenzaError::invalid_parameter(
                "scope",
                other,
                "all, track or selection",
            )),
        }
    }
}

/// One resolved edit target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub track_id: TrackId,
    pub range: SampleRange,
}

fn whole_track(track: &Track) -> Option<Target> {
    let buffer = track.buffer()?;
    if buffer.is_empty() {
        return None;
    }
    Some(Target {
        track_id: track.id(),
        range: SampleRange::full(buffer.len()),
    })
}

/// Resolve `scope` against the given tracks, current track and selection
///
/// Never fails: a scope with nothing to act on resolves to no targets. A
/// selection reaching past the end of its track is clamped to the track.
pub fn resolve(
    scope: Scope,
    tracks: &[Track],
    current_track: Option<TrackId>,
    selection: Option<&Selection>,
) -> Vec<Target> {
    let current = || {
        current_track
            .and_then(|id| tracks.iter().find(|t| t.id() == id))
            .and_then(whole_track)
    };

    match scope {
        Scope::All => tracks.iter().filter_map(whole_track).collect(),
        Scope::Track => current().into_iter().collect(),
        Scope::Selection => match selection {
            Some(sel) => tracks
                .iter()
                .find(|t| t.id() == sel.track_id)
                .and_then(|t| t.buffer())
                .map(|b| b.range_for(sel.start, sel.end))
                .filter(|range| !range.is_empty())
                .map(|range| Target {
                    track_id: sel.track_id,
                    range,
                })
                .into_iter()
                .collect(),
            None => current().into_iter().collect(),
        },
    }
}
