//! Transport Controller
//!
//! Coordinates one playback handle per track: play/pause/stop/seek across all
//! of them, solo and mute priority, and the repeat-region loop.
//!
//! The controller only reads track snapshots. It never edits a buffer; any
//! change to the project goes through the store.

use std::fmt;
use std::sync::Arc;

use log::debug;

use super::buffer::SampleBuffer;
use super::playback::{PlaybackHandle, VirtualPlayback};
use crate::config::EditorConfig;
use crate::state::track::same_buffer;
use crate::state::{RepeatRegion, Track, TrackId};

/// Transport states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Every handle rewound to 0 (default state)
    #[default]
    Stopped,
    Playing,
    /// Handles hold their positions
    Paused,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "Stopped"),
            TransportState::Playing => write!(f, "Playing"),
            TransportState::Paused => write!(f, "Paused"),
        }
    }
}

/// Result of one monitoring tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not playing
    Idle,
    /// Playing; master position in seconds
    Advanced(f64),
    /// The repeat region's end was crossed and every track jumped back
    Looped { to: f64 },
}

/// Creates the handle for a newly attached track
pub type HandleFactory = Box<dyn Fn(Option<Arc<SampleBuffer>>) -> Box<dyn PlaybackHandle> + Send>;

#[derive(Debug)]
struct Channel {
    track_id: TrackId,
    buffer: Option<Arc<SampleBuffer>>,
    handle: Box<dyn PlaybackHandle>,
    /// Audible under the solo/mute rules at the last `play_all`
    active: bool,
}

/// Thin coordinator over N per-track playback handles
pub struct TransportController {
    channels: Vec<Channel>,
    factory: HandleFactory,
    state: TransportState,
    repeat_epsilon: f64,
    last_position: Option<f64>,
}

impl fmt::Debug for TransportController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportController")
            .field("channels", &self.channels)
            .field("state", &self.state)
            .field("repeat_epsilon", &self.repeat_epsilon)
            .field("last_position", &self.last_position)
            .finish()
    }
}

impl TransportController {
    /// Create a controller building handles with `factory`
    ///
    /// `repeat_epsilon` absorbs polling granularity when detecting the end of
    /// the repeat region.
    pub fn new(repeat_epsilon: f64, factory: HandleFactory) -> Self {
        Self {
            channels: Vec::new(),
            factory,
            state: TransportState::Stopped,
            repeat_epsilon,
            last_position: None,
        }
    }

    /// Controller over in-memory [`VirtualPlayback`] handles
    ///
    /// # Example
    /// ```
    /// use cadenza::engine::{TransportController, TransportState};
    /// let transport = TransportController::with_virtual_playback(0.01);
    /// assert_eq!(transport.state(), TransportState::Stopped);
    /// ```
    pub fn with_virtual_playback(repeat_epsilon: f64) -> Self {
        Self::new(
            repeat_epsilon,
            Box::new(|buffer: Option<Arc<SampleBuffer>>| -> Box<dyn PlaybackHandle> {
                Box::new(VirtualPlayback::new(buffer))
            }),
        )
    }

    /// Virtual-playback controller using the configured tolerance
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::with_virtual_playback(config.repeat_epsilon)
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Number of attached handles
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Position of one track's handle in seconds
    pub fn track_position(&self, track_id: TrackId) -> Option<f64> {
        self.channel(track_id).map(|c| c.handle.position())
    }

    /// True if the track's handle is currently advancing
    pub fn is_track_playing(&self, track_id: TrackId) -> bool {
        self.channel(track_id).is_some_and(|c| c.handle.is_playing())
    }

    fn channel(&self, track_id: TrackId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.track_id == track_id)
    }

    /// Master position: the furthest active handle, or the furthest handle
    /// when none is active
    pub fn position(&self) -> f64 {
        let furthest = |active_only: bool| {
            self.channels
                .iter()
                .filter(|c| !active_only || c.active)
                .map(|c| c.handle.position())
                .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.max(p))))
        };
        furthest(true).or_else(|| furthest(false)).unwrap_or(0.0)
    }

    /// Attach, detach and reload handles so they mirror `tracks`
    ///
    /// A handle whose buffer changed is reloaded at its previous position.
    pub fn sync_tracks(&mut self, tracks: &[Track]) {
        let mut previous = std::mem::take(&mut self.channels);
        let mut channels = Vec::with_capacity(tracks.len());

        for track in tracks {
            let buffer = track.shared_buffer();
            let channel = match previous.iter().position(|c| c.track_id == track.id()) {
                Some(index) => {
                    let mut channel = previous.swap_remove(index);
                    if !same_buffer(channel.buffer.as_ref(), buffer.as_ref()) {
                        let position = channel.handle.position();
                        let was_playing = channel.handle.is_playing();
                        channel.handle.load(buffer.clone());
                        let duration = channel.handle.duration();
                        if duration > 0.0 {
                            channel.handle.seek(position / duration);
                        }
                        if was_playing {
                            channel.handle.play();
                        }
                        channel.buffer = buffer;
                        debug!("Reloaded playback for track {}", track.id());
                    }
                    channel
                }
                None => {
                    debug!("Attached playback for track {}", track.id());
                    Channel {
                        track_id: track.id(),
                        handle: (self.factory)(buffer.clone()),
                        buffer,
                        active: false,
                    }
                }
            };
            channels.push(channel);
        }

        for mut detached in previous {
            detached.handle.stop();
            debug!("Detached playback for track {}", detached.track_id);
        }
        self.channels = channels;
    }

    /// Start every audible track and pause the rest
    ///
    /// If any track is soloed only soloed tracks are audible; muted tracks
    /// never are. Paused tracks keep their positions.
    pub fn play_all(&mut self, tracks: &[Track]) {
        self.sync_tracks(tracks);
        let any_soloed = tracks.iter().any(Track::is_soloed);

        for (channel, track) in self.channels.iter_mut().zip(tracks) {
            channel.active = !track.is_muted() && (!any_soloed || track.is_soloed());
            if channel.active {
                channel.handle.play();
            } else {
                channel.handle.pause();
            }
        }

        self.state = TransportState::Playing;
        self.last_position = Some(self.position());
        debug!(
            "Play: {} of {} tracks audible",
            self.channels.iter().filter(|c| c.active).count(),
            self.channels.len()
        );
    }

    pub fn pause_all(&mut self) {
        for channel in &mut self.channels {
            channel.handle.pause();
        }
        self.state = TransportState::Paused;
        debug!("Pause at {:.3}s", self.position());
    }

    /// Stop every handle and rewind to 0
    pub fn stop_all(&mut self) {
        for channel in &mut self.channels {
            channel.handle.stop();
        }
        self.state = TransportState::Stopped;
        self.last_position = None;
        debug!("Stop");
    }

    /// Move every handle to global time `seconds`
    ///
    /// Tracks shorter than `seconds` seek to their own end.
    pub fn seek_all(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        for channel in &mut self.channels {
            let duration = channel.handle.duration();
            let fraction = if duration > 0.0 {
                (seconds / duration).clamp(0.0, 1.0)
            } else {
                0.0
            };
            channel.handle.seek(fraction);
        }
        self.last_position = Some(seconds);
        debug!("Seek to {:.3}s", seconds);
    }

    /// Drive handles with an externally supplied clock
    pub fn advance(&mut self, dt: f64) {
        for channel in &mut self.channels {
            channel.handle.advance(dt);
        }
    }

    /// Observe the current position and apply the repeat-region loop
    ///
    /// Must be called on every position update while playing. Loops when the
    /// previous observation was inside the region (widened by the tolerance)
    /// and the position has now crossed its end from below.
    pub fn tick(&mut self, repeat_region: Option<RepeatRegion>) -> TickOutcome {
        if self.state != TransportState::Playing {
            return TickOutcome::Idle;
        }
        let current = self.position();
        let previous = self.last_position.replace(current);

        if let (Some(region), Some(previous)) = (repeat_region, previous) {
            let eps = self.repeat_epsilon;
            let crossed = previous < region.end - eps && current >= region.end - eps;
            if region.contains(previous, eps) && crossed {
                self.loop_to(region.start);
                return TickOutcome::Looped { to: region.start };
            }
        }
        TickOutcome::Advanced(current)
    }

    fn loop_to(&mut self, start: f64) {
        self.seek_all(start);
        for channel in self.channels.iter_mut().filter(|c| c.active) {
            channel.handle.play();
        }
        debug!("Repeat region looped to {:.3}s", start);
    }
}
