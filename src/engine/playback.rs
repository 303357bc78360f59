//! Playback devices
//!
//! The transport never renders audio itself; it drives one [`PlaybackHandle`]
//! per track. [`VirtualPlayback`] is an in-memory device whose clock is moved
//! explicitly, for previews and tests.

use std::sync::Arc;

use super::buffer::SampleBuffer;

/// One playing buffer, as seen by the transport
pub trait PlaybackHandle: Send + std::fmt::Debug {
    /// Replace the loaded buffer; position returns to 0 and playback stops
    fn load(&mut self, buffer: Option<Arc<SampleBuffer>>);

    fn play(&mut self);

    /// Stop advancing, keeping the position
    fn pause(&mut self);

    /// Stop and rewind to 0
    fn stop(&mut self);

    /// Jump to a fraction of the duration, clamped to [0, 1]
    fn seek(&mut self, fraction: f64);

    /// Position in seconds
    fn position(&self) -> f64;

    /// Duration of the loaded buffer in seconds
    fn duration(&self) -> f64;

    fn is_playing(&self) -> bool;

    /// Move the clock forward by `dt` seconds
    ///
    /// Devices with their own clock ignore this.
    fn advance(&mut self, _dt: f64) {}
}

/// Clock-only playback device
#[derive(Debug, Clone, Default)]
pub struct VirtualPlayback {
    duration: f64,
    position: f64,
    playing: bool,
}

impl VirtualPlayback {
    pub fn new(buffer: Option<Arc<SampleBuffer>>) -> Self {
        let mut playback = Self::default();
        playback.load(buffer);
        playback
    }
}

impl PlaybackHandle for VirtualPlayback {
    fn load(&mut self, buffer: Option<Arc<SampleBuffer>>) {
        self.duration = buffer.map_or(0.0, |b| b.duration_secs());
        self.position = 0.0;
        self.playing = false;
    }

    fn play(&mut self) {
        // Nothing to play once the end is reached
        self.playing = self.position < self.duration;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.position = 0.0;
    }

    fn seek(&mut self, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.position = fraction * self.duration;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn advance(&mut self, dt: f64) {
        if !self.playing || !(dt.is_finite() && dt > 0.0) {
            return;
        }
        self.position += dt;
        if self.position >= self.duration {
            self.position = self.duration;
            self.playing = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn device(seconds: usize) -> VirtualPlayback {
        let buffer = SampleBuffer::silent(1, seconds * 100, 100).unwrap();
        VirtualPlayback::new(Some(Arc::new(buffer)))
    }

    #[test]
    fn test_advances_only_while_playing() {
        let mut playback = device(4);
        playback.advance(1.0);
        assert_eq!(playback.position(), 0.0);

        playback.play();
        playback.advance(1.5);
        assert_abs_diff_eq!(playback.position(), 1.5);
        playback.pause();
        playback.advance(1.0);
        assert_abs_diff_eq!(playback.position(), 1.5);
    }

    #[test]
    fn test_stops_at_end() {
        let mut playback = device(2);
        playback.play();
        playback.advance(5.0);
        assert_eq!(playback.position(), 2.0);
        assert!(!playback.is_playing());
        playback.play();
        assert!(!playback.is_playing());
    }

    #[test]
    fn test_seek_is_fractional_and_clamped() {
        let mut playback = device(10);
        playback.seek(0.25);
        assert_abs_diff_eq!(playback.position(), 2.5);
        playback.seek(3.0);
        assert_abs_diff_eq!(playback.position(), 10.0);
        playback.stop();
        assert_eq!(playback.position(), 0.0);
    }

    #[test]
    fn test_empty_device_never_plays() {
        let mut playback = VirtualPlayback::new(None);
        playback.play();
        assert!(!playback.is_playing());
        assert_eq!(playback.duration(), 0.0);
    }
}
