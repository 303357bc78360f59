//! Reverb effect
//!
//! Freeverb topology: 8 parallel damped comb filters followed by 4 series
//! allpass filters per channel. Comb feedback is derived from the room size so
//! that the reflection tail decays by 60dB after `room_size` seconds.

use super::effect::{ensure_param, Effect};
use crate::engine::SampleBuffer;
use crate::error::Result;
use serde::{Deserialize, Serialize};

// ============================================================================
// Freeverb Constants
// ============================================================================

/// Reference sample rate for Freeverb delays
const REFERENCE_SAMPLE_RATE: f64 = 44100.0;

/// Comb filter delays at 44100 Hz (8 filters)
const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass filter delays at 44100 Hz (4 filters)
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Extra delay for odd channels, decorrelates left from right
const STEREO_SPREAD: usize = 23;

/// Fixed gain for allpass filters (standard Freeverb value)
const ALLPASS_GAIN: f32 = 0.5;

/// One-pole damping in the comb feedback path
const DAMPING: f32 = 0.2;

/// Longest accepted decay time in seconds
pub const MAX_ROOM_SIZE: f32 = 3.0;

// ============================================================================
// Filter Components
// ============================================================================

/// Damped feedback comb filter
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    feedback: f32,
    filter_state: f32,
}

impl CombFilter {
    fn new(delay: usize, feedback: f32) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
            feedback,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.pos];
        self.filter_state = output * (1.0 - DAMPING) + self.filter_state * DAMPING;
        self.buffer[self.pos] = input + self.filter_state * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }
}

/// Schroeder allpass for diffusion
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(delay: usize) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let output = delayed - ALLPASS_GAIN * input;
        self.buffer[self.pos] = input + ALLPASS_GAIN * output;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }
}

/// Comb and allpass network for one channel
#[derive(Debug, Clone)]
struct ReverbTank {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
}

impl ReverbTank {
    fn new(sample_rate: u32, room_size: f32, spread: usize) -> Self {
        let scale = sample_rate as f64 / REFERENCE_SAMPLE_RATE;
        let rt60_samples = room_size as f64 * sample_rate as f64;

        let combs = COMB_DELAYS
            .iter()
            .map(|&d| {
                let delay = (((d + spread) as f64) * scale).round() as usize;
                // g^(rt60 / delay) == 10^(-3)
                let feedback = 10f64.powf(-3.0 * delay as f64 / rt60_samples) as f32;
                CombFilter::new(delay, feedback)
            })
            .collect();
        let allpasses = ALLPASS_DELAYS
            .iter()
            .map(|&d| AllpassFilter::new((((d + spread) as f64) * scale).round() as usize))
            .collect();

        Self { combs, allpasses }
    }

    fn process(&mut self, input: f32) -> f32 {
        let count = self.combs.len() as f32;
        let mut wet = 0.0;
        for comb in &mut self.combs {
            // (1 - g) keeps each comb's DC gain at unity
            wet += comb.process(input * (1.0 - comb.feedback));
        }
        wet /= count;
        for allpass in &mut self.allpasses {
            wet = allpass.process(wet);
        }
        wet
    }
}

// ============================================================================
// Reverb
// ============================================================================

/// Algorithmic reverb
///
/// `output = dry * (1 - wet_level) + wet * wet_level`. The tail is rendered
/// inside the region only; reflections that would ring past the region end
/// are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reverb {
    /// Decay time (RT60) in seconds, (0, 3]
    pub room_size: f32,
    /// Wet mix, [0, 1]
    pub wet_level: f32,
}

impl Default for Reverb {
    fn default() -> Self {
        Self {
            room_size: 1.0,
            wet_level: 0.3,
        }
    }
}

impl Effect for Reverb {
    crate::impl_effect_common!("reverb", "Reverb");

    fn validate(&self) -> Result<()> {
        ensure_param(
            self.room_size > 0.0 && self.room_size <= MAX_ROOM_SIZE,
            "room_size",
            self.room_size,
            "(0, 3] seconds",
        )?;
        ensure_param(
            (0.0..=1.0).contains(&self.wet_level),
            "wet_level",
            self.wet_level,
            "[0, 1]",
        )
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        if self.wet_level == 0.0 {
            return Ok(region.clone());
        }
        let wet_level = self.wet_level;
        region.map_channels(|index, ch| {
            let spread = if index % 2 == 1 { STEREO_SPREAD } else { 0 };
            let mut tank = ReverbTank::new(region.sample_rate(), self.room_size, spread);
            ch.iter()
                .map(|&dry| dry * (1.0 - wet_level) + tank.process(dry) * wet_level)
                .collect()
        })
    }
}
