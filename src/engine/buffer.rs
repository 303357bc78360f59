//! Sample Buffer Management
//!
//! Provides the core sample buffer type shared by the DSP library, the track
//! store and the transport. Buffers are values: every edit produces a new
//! buffer and nothing mutates samples a caller is still holding.

use crate::error::{CadenzaError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Sample rate used when nothing else is known (CD rate)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Threshold below which audio is considered silent (-80dBFS)
pub const SILENCE_THRESHOLD_DB: f32 = -80.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Linear interpolation resampling of a single channel to `new_len` frames
///
/// `step` is the number of source frames advanced per output frame.
pub(crate) fn interpolate(samples: &[f32], new_len: usize, step: f64) -> Vec<f32> {
    if samples.is_empty() {
        return vec![0.0; new_len];
    }
    let last = samples.len() - 1;
    (0..new_len)
        .map(|i| {
            let src = i as f64 * step;
            let idx = src.floor() as usize;
            let frac = (src - idx as f64) as f32;
            let s0 = samples[idx.min(last)];
            let s1 = samples[(idx + 1).min(last)];
            s0 + (s1 - s0) * frac
        })
        .collect()
}

// ============================================================================
// Sample Range
// ============================================================================

/// Half-open frame interval `[start, end)` inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleRange {
    pub start: usize,
    pub end: usize,
}

impl SampleRange {
    /// Create a new range; `end` is exclusive
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The whole of a buffer with `len` frames
    pub fn full(len: usize) -> Self {
        Self { start: 0, end: len }
    }

    /// Number of frames covered
    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True if the range covers no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clamp both ends to a buffer of `len` frames
    pub fn clamp_to(&self, len: usize) -> Self {
        let end = self.end.min(len);
        Self {
            start: self.start.min(end),
            end,
        }
    }

    /// Check that the range is non-empty and inside a buffer of `len` frames
    pub fn check(&self, len: usize) -> Result<()> {
        if self.start >= self.end {
            return Err(CadenzaError::invalid_range(format!(
                "empty range [{}, {})",
                self.start, self.end
            )));
        }
        if self.end > len {
            return Err(CadenzaError::invalid_range(format!(
                "range [{}, {}) exceeds buffer length {}",
                self.start, self.end, len
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Sample Buffer
// ============================================================================

/// Multichannel PCM sample buffer
///
/// Stores audio as non-interleaved 32-bit floats: the outer Vec is channels,
/// the inner Vec is frames. All channels always have the same length and the
/// sample rate is never zero.
///
/// # Example
/// ```
/// use cadenza::engine::SampleBuffer;
///
/// let buffer = SampleBuffer::silent(2, 44100, 44100).unwrap();
/// assert_eq!(buffer.num_channels(), 2);
/// assert_eq!(buffer.len(), 44100);
/// assert_eq!(buffer.duration_secs(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create a buffer from per-channel sample data
    ///
    /// # Errors
    /// * `InvalidAudio` - no channels, a zero sample rate, or ragged channels
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() {
            return Err(CadenzaError::InvalidAudio {
                reason: "buffer must have at least one channel".to_string(),
                source: None,
            });
        }
        if sample_rate == 0 {
            return Err(CadenzaError::InvalidAudio {
                reason: "sample rate must be positive".to_string(),
                source: None,
            });
        }
        let len = channels[0].len();
        if channels.iter().any(|ch| ch.len() != len) {
            return Err(CadenzaError::InvalidAudio {
                reason: "all channels must have the same length".to_string(),
                source: None,
            });
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Create a mono buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(vec![samples], sample_rate)
    }

    /// Create a buffer filled with silence
    pub fn silent(num_channels: usize, num_frames: usize, sample_rate: u32) -> Result<Self> {
        Self::new(vec![vec![0.0; num_frames]; num_channels], sample_rate)
    }

    /// Create a buffer from interleaved sample data (L, R, L, R, ...)
    pub fn from_interleaved(
        interleaved: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if num_channels == 0 || interleaved.len() % num_channels != 0 {
            return Err(CadenzaError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let frames = interleaved.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }
        Self::new(channels, sample_rate)
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.num_channels() * self.len());
        for frame in 0..self.len() {
            for channel in &self.channels {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    /// True if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Immutable access to one channel
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// All channels
    #[inline]
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Take ownership of the channel data
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Sample at the given channel and frame
    #[inline]
    pub fn get_sample(&self, channel: usize, frame: usize) -> Option<f32> {
        self.channels
            .get(channel)
            .and_then(|ch| ch.get(frame).copied())
    }

    /// Convert a time in seconds to the nearest frame index, clamped to the buffer
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        frame.min(self.len())
    }

    /// Convert a `[start, end)` time interval in seconds to a clamped frame range
    pub fn range_for(&self, start_secs: f64, end_secs: f64) -> SampleRange {
        SampleRange::new(self.frame_at(start_secs), self.frame_at(end_secs))
    }

    /// Build a new buffer by transforming every channel
    pub fn map_channels<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, &[f32]) -> Vec<f32>,
    {
        let channels = self
            .channels
            .iter()
            .enumerate()
            .map(|(i, ch)| f(i, ch))
            .collect();
        Self::new(channels, self.sample_rate)
    }

    /// Copy of the frames inside `range`
    pub fn slice(&self, range: SampleRange) -> Result<Self> {
        let range = range.clamp_to(self.len());
        self.map_channels(|_, ch| ch[range.start..range.end].to_vec())
    }

    /// New buffer with `range` replaced by `replacement`
    ///
    /// The replacement may be longer or shorter than the range; frames outside
    /// the range are copied unchanged.
    pub fn splice(&self, range: SampleRange, replacement: &SampleBuffer) -> Result<Self> {
        if replacement.num_channels() != self.num_channels() {
            return Err(CadenzaError::InvalidAudio {
                reason: format!(
                    "cannot splice {} channels into {}",
                    replacement.num_channels(),
                    self.num_channels()
                ),
                source: None,
            });
        }
        let range = range.clamp_to(self.len());
        self.map_channels(|i, ch| {
            let mut out = Vec::with_capacity(ch.len() - range.len() + replacement.len());
            out.extend_from_slice(&ch[..range.start]);
            out.extend_from_slice(replacement.channel(i));
            out.extend_from_slice(&ch[range.end..]);
            out
        })
    }

    /// New buffer with the frames inside `range` removed
    pub fn excise(&self, range: SampleRange) -> Result<Self> {
        let range = range.clamp_to(self.len());
        self.map_channels(|_, ch| {
            let mut out = Vec::with_capacity(ch.len() - range.len());
            out.extend_from_slice(&ch[..range.start]);
            out.extend_from_slice(&ch[range.end..]);
            out
        })
    }

    /// New buffer with `other` inserted before frame `at`
    pub fn insert(&self, at: usize, other: &SampleBuffer) -> Result<Self> {
        let at = at.min(self.len());
        self.splice(SampleRange::new(at, at), other)
    }

    /// Peak absolute sample value across all channels (linear)
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Peak level in dB
    pub fn peak_db(&self) -> f32 {
        linear_to_db(self.peak())
    }

    /// RMS level across all channels in dB
    pub fn rms_db(&self) -> f32 {
        let total = self.num_channels() * self.len();
        if total == 0 {
            return f32::NEG_INFINITY;
        }
        let sum_squares: f64 = self
            .channels
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        linear_to_db((sum_squares / total as f64).sqrt() as f32)
    }

    /// True if the RMS level is below the silence threshold
    pub fn is_silent(&self) -> bool {
        self.rms_db() <= SILENCE_THRESHOLD_DB
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }

    /// Resample to `target_rate` using linear interpolation
    pub fn resample(&self, target_rate: u32) -> Result<Self> {
        if target_rate == 0 {
            return Err(CadenzaError::invalid_parameter(
                "sample_rate",
                target_rate,
                "a positive rate",
            ));
        }
        if target_rate == self.sample_rate {
            return Ok(self.clone());
        }
        let ratio = self.sample_rate as f64 / target_rate as f64;
        let new_len = (self.len() as f64 / ratio).round() as usize;
        let channels = self
            .channels
            .iter()
            .map(|ch| interpolate(ch, new_len, ratio))
            .collect();
        Self::new(channels, target_rate)
    }

    /// Convert to `count` channels
    ///
    /// Mono is duplicated when widening; narrowing to mono averages all
    /// channels; any other narrowing keeps the first `count` channels.
    pub fn with_channel_count(&self, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(CadenzaError::invalid_parameter(
                "channels",
                count,
                "at least one channel",
            ));
        }
        let current = self.num_channels();
        if count == current {
            return Ok(self.clone());
        }
        let channels = if count == 1 {
            let scale = 1.0 / current as f32;
            vec![(0..self.len())
                .map(|i| self.channels.iter().map(|ch| ch[i]).sum::<f32>() * scale)
                .collect()]
        } else if current == 1 {
            vec![self.channels[0].clone(); count]
        } else {
            (0..count)
                .map(|i| {
                    self.channels
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| vec![0.0; self.len()])
                })
                .collect()
        };
        Self::new(channels, self.sample_rate)
    }

    /// Match another buffer's sample rate and channel count
    pub fn conform_to(&self, other: &SampleBuffer) -> Result<Self> {
        self.resample(other.sample_rate())?
            .with_channel_count(other.num_channels())
    }
}

// ============================================================================
// Tests
// ============================================================================
