//! Compressor effect
//!
//! Feed-forward compressor: linked peak detection across channels, a soft-knee
//! gain computer in the dB domain and attack/release smoothing of the gain
//! reduction.

use super::effect::{ensure_param, Effect};
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::SampleBuffer;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Level assumed for digital silence when converting to dB
const SILENCE_FLOOR_DB: f32 = -120.0;

/// One-pole smoothing coefficient for a time constant in seconds
#[inline]
pub(crate) fn time_to_coeff(seconds: f32, sample_rate: u32) -> f32 {
    let samples = seconds * sample_rate as f32;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

/// Dynamic range compressor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Compressor {
    /// Threshold level in dB, [-60, 0]
    pub threshold_db: f32,
    /// Compression ratio, [1, 20]
    pub ratio: f32,
    /// Attack time in seconds, [0.0001, 1]
    pub attack: f32,
    /// Release time in seconds, [0.01, 5]
    pub release: f32,
    /// Knee width in dB, [0, 12]; 0 is a hard knee
    pub knee_db: f32,
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            threshold_db: -18.0,
            ratio: 4.0,
            attack: 0.01,
            release: 0.1,
            knee_db: 6.0,
        }
    }
}

impl Compressor {
    /// Static curve: gain change in dB (zero or negative) for an input level in dB
    pub fn gain_reduction_db(&self, input_db: f32) -> f32 {
        let threshold = self.threshold_db;
        let knee = self.knee_db;
        let over = input_db - threshold;
        let slope = 1.0 / self.ratio - 1.0;

        if 2.0 * over < -knee {
            0.0
        } else if knee > 0.0 && 2.0 * over.abs() <= knee {
            let x = over + knee / 2.0;
            slope * x * x / (2.0 * knee)
        } else {
            slope * over
        }
    }
}

impl Effect for Compressor {
    crate::impl_effect_common!("compressor", "Compressor");

    fn validate(&self) -> Result<()> {
        ensure_param(
            (-60.0..=0.0).contains(&self.threshold_db),
            "threshold_db",
            self.threshold_db,
            "[-60, 0] dB",
        )?;
        ensure_param(
            (1.0..=20.0).contains(&self.ratio),
            "ratio",
            self.ratio,
            "[1, 20]",
        )?;
        ensure_param(
            (0.0001..=1.0).contains(&self.attack),
            "attack",
            self.attack,
            "[0.0001, 1] seconds",
        )?;
        ensure_param(
            (0.01..=5.0).contains(&self.release),
            "release",
            self.release,
            "[0.01, 5] seconds",
        )?;
        ensure_param(
            (0.0..=12.0).contains(&self.knee_db),
            "knee_db",
            self.knee_db,
            "[0, 12] dB",
        )
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        let sample_rate = region.sample_rate();
        let attack_coeff = time_to_coeff(self.attack, sample_rate);
        let release_coeff = time_to_coeff(self.release, sample_rate);

        // Per-frame gain, shared by all channels so the stereo image holds
        let mut reduction_db = 0.0_f32;
        let gains: Vec<f32> = (0..region.len())
            .map(|frame| {
                let peak = region
                    .channels()
                    .iter()
                    .map(|ch| ch[frame].abs())
                    .fold(0.0_f32, f32::max);
                let level_db = linear_to_db(peak).max(SILENCE_FLOOR_DB);
                let target = self.gain_reduction_db(level_db);

                let coeff = if target < reduction_db {
                    attack_coeff
                } else {
                    release_coeff
                };
                reduction_db = coeff * reduction_db + (1.0 - coeff) * target;
                db_to_linear(reduction_db)
            })
            .collect();

        region.map_channels(|_, ch| ch.iter().zip(&gains).map(|(s, g)| s * g).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    #[test]
    fn test_static_curve_hard_knee() {
        let comp = Compressor {
            threshold_db: -20.0,
            ratio: 4.0,
            knee_db: 0.0,
            ..Compressor::default()
        };
        assert_abs_diff_eq!(comp.gain_reduction_db(-30.0), 0.0);
        // 8 dB over at 4:1 leaves 2 dB over
        assert_abs_diff_eq!(comp.gain_reduction_db(-12.0), -6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_soft_knee_is_continuous() {
        let comp = Compressor {
            threshold_db: -20.0,
            ratio: 4.0,
            knee_db: 6.0,
            ..Compressor::default()
        };
        assert_abs_diff_eq!(comp.gain_reduction_db(-23.0), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(comp.gain_reduction_db(-17.0), -2.25, epsilon = 1e-4);
        // inside the knee the reduction is gentler than the hard curve
        let at_threshold = comp.gain_reduction_db(-20.0);
        assert!(at_threshold < 0.0 && at_threshold > -1.0);
    }

    #[test]
    fn test_reduces_loud_signal() {
        let comp = Compressor {
            threshold_db: -20.0,
            ratio: 10.0,
            attack: 0.0001,
            release: 0.05,
            knee_db: 0.0,
        };
        let region = SampleBuffer::mono(vec![0.9; 4000], 8000).unwrap();
        let out = comp.process(&region).unwrap();
        let settled = out.channel(0)[3999];
        assert!(settled < 0.2, "settled level {}", settled);
    }

    #[test]
    fn test_quiet_signal_untouched() {
        let comp = Compressor::default();
        let region = SampleBuffer::mono(vec![0.01; 500], 8000).unwrap();
        let out = comp.process(&region).unwrap();
        assert_abs_diff_eq!(out.channel(0)[499], 0.01, epsilon = 1e-6);
    }

    #[test_case(Compressor { threshold_db: 3.0, ..Compressor::default() } ; "threshold above zero")]
    #[test_case(Compressor { ratio: 0.5, ..Compressor::default() } ; "ratio below one")]
    #[test_case(Compressor { attack: 0.0, ..Compressor::default() } ; "zero attack")]
    #[test_case(Compressor { release: 6.0, ..Compressor::default() } ; "long release")]
    #[test_case(Compressor { knee_db: 13.0, ..Compressor::default() } ; "wide knee")]
    fn test_rejects_params(comp: Compressor) {
        assert!(comp.validate().is_err());
    }
}
