//! Delay Effect
//!
//! Feedback delay line. Each repetition is attenuated by `feedback`, so the
//! echo train decays geometrically for any feedback below one.

use super::effect::{ensure_param, Effect};
use crate::engine::SampleBuffer;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Longest accepted delay time in seconds
pub const MAX_DELAY_TIME: f32 = 2.0;

/// Highest accepted feedback
pub const MAX_FEEDBACK: f32 = 0.99;

/// Single-tap feedback delay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delay {
    /// Delay time in seconds, (0, 2]
    pub delay_time: f32,
    /// Per-repetition attenuation, [0, 0.99]
    pub feedback: f32,
    /// Wet mix, [0, 1]
    pub wet_level: f32,
}

impl Default for Delay {
    fn default() -> Self {
        Self {
            delay_time: 0.25,
            feedback: 0.3,
            wet_level: 0.3,
        }
    }
}

impl Delay {
    /// Delay time converted to whole samples, never less than one
    fn delay_samples(&self, sample_rate: u32) -> usize {
        ((self.delay_time * sample_rate as f32).round() as usize).max(1)
    }
}

impl Effect for Delay {
    crate::impl_effect_common!("delay", "Delay");

    fn validate(&self) -> Result<()> {
        ensure_param(
            self.delay_time > 0.0 && self.delay_time <= MAX_DELAY_TIME,
            "delay_time",
            self.delay_time,
            "(0, 2] seconds",
        )?;
        ensure_param(
            (0.0..=MAX_FEEDBACK).contains(&self.feedback),
            "feedback",
            self.feedback,
            "[0, 0.99]",
        )?;
        ensure_param(
            (0.0..=1.0).contains(&self.wet_level),
            "wet_level",
            self.wet_level,
            "[0, 1]",
        )
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        let delay = self.delay_samples(region.sample_rate());
        let feedback = self.feedback;
        let wet_level = self.wet_level;

        region.map_channels(|_, ch| {
            let mut line = vec![0.0_f32; delay];
            let mut write_pos = 0;
            ch.iter()
                .map(|&input| {
                    // Line holds exactly `delay` samples, so the oldest slot is the read slot
                    let delayed = line[write_pos];
                    line[write_pos] = input + delayed * feedback;
                    write_pos = (write_pos + 1) % delay;
                    input * (1.0 - wet_level) + delayed * wet_level
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn impulse(len: usize) -> SampleBuffer {
        let mut samples = vec![0.0; len];
        samples[0] = 1.0;
        SampleBuffer::mono(samples, 100).unwrap()
    }

    #[test]
    fn test_echoes_decay_by_feedback() {
        let delay = Delay {
            delay_time: 0.1,
            feedback: 0.5,
            wet_level: 1.0,
        };
        let out = delay.process(&impulse(40)).unwrap();
        let ch = out.channel(0);
        assert_abs_diff_eq!(ch[0], 0.0);
        assert_abs_diff_eq!(ch[10], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ch[20], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(ch[30], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(ch[15], 0.0);
    }

    #[test]
    fn test_dry_mix_passthrough() {
        let delay = Delay {
            delay_time: 0.05,
            feedback: 0.9,
            wet_level: 0.0,
        };
        let input = impulse(32);
        assert_eq!(delay.process(&input).unwrap(), input);
    }

    #[test]
    fn test_high_feedback_stays_bounded() {
        let delay = Delay {
            delay_time: 0.01,
            feedback: MAX_FEEDBACK,
            wet_level: 1.0,
        };
        let input = SampleBuffer::mono(vec![0.5; 10_000], 100).unwrap();
        let out = delay.process(&input).unwrap();
        assert!(out.is_finite());
        // steady state bound: 0.5 / (1 - 0.99)
        assert!(out.peak() <= 50.0 + 1e-3);
    }

    #[test]
    fn test_rejects_unity_feedback() {
        let delay = Delay {
            feedback: 1.0,
            ..Delay::default()
        };
        assert!(delay.validate().is_err());
        let delay = Delay {
            delay_time: 0.0,
            ..Delay::default()
        };
        assert!(delay.validate().is_err());
    }
}
