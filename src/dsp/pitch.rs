//! Speed and pitch changes
//!
//! `ChangeSpeed` is plain resampling: duration and pitch move together.
//! `ChangePitch` time-stretches with a phase vocoder and then resamples back
//! to the original length, so only the pitch moves.

use super::effect::{ensure_param, Effect};
use super::spectral::{wrap_phase, OverlapAdd, Stft, FFT_SIZE, HOP_SIZE};
use crate::engine::buffer::interpolate;
use crate::engine::SampleBuffer;
use crate::error::Result;
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Largest accepted speed or pitch factor
pub const MAX_FACTOR: f32 = 4.0;

fn validate_factor(factor: f32) -> Result<()> {
    ensure_param(
        factor > 0.0 && factor <= MAX_FACTOR,
        "factor",
        factor,
        "(0, 4]",
    )
}

// ============================================================================
// ChangeSpeed
// ============================================================================

/// Resample the region by `1 / factor`
///
/// A factor of 2 plays twice as fast: half the frames, one octave up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeSpeed {
    pub factor: f32,
}

impl Default for ChangeSpeed {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl Effect for ChangeSpeed {
    crate::impl_effect_common!("change_speed", "Change Speed");

    fn validate(&self) -> Result<()> {
        validate_factor(self.factor)
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        if self.factor == 1.0 {
            return Ok(region.clone());
        }
        let new_len = ((region.len() as f64 / self.factor as f64).round() as usize).max(1);
        let step = self.factor as f64;
        region.map_channels(|_, ch| interpolate(ch, new_len, step))
    }
}

// ============================================================================
// ChangePitch
// ============================================================================

/// Shift pitch by `12 * log2(factor)` semitones, keeping duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangePitch {
    pub factor: f32,
}

impl Default for ChangePitch {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl ChangePitch {
    /// Build from a semitone offset
    pub fn from_semitones(semitones: f32) -> Self {
        Self {
            factor: 2.0_f32.powf(semitones / 12.0),
        }
    }

    /// The shift in semitones
    pub fn semitones(&self) -> f32 {
        12.0 * self.factor.log2()
    }

    /// Phase-vocoder time stretch by `synthesis_hop / HOP_SIZE`
    fn stretch(stft: &Stft, samples: &[f32], synthesis_hop: usize) -> Vec<f32> {
        let size = stft.size();
        let bins = size;
        let pad = size;
        let frames = (samples.len() + pad) / HOP_SIZE + 1;
        let padded_len = (frames - 1) * HOP_SIZE + size;

        let mut padded = vec![0.0_f32; padded_len];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let out_len = (frames - 1) * synthesis_hop + size;
        let mut ola = OverlapAdd::new(out_len, size);
        let mut last_phase = vec![0.0_f32; bins];
        let mut synth_phase = vec![0.0_f32; bins];
        let ratio = synthesis_hop as f32 / HOP_SIZE as f32;

        for f in 0..frames {
            let start = f * HOP_SIZE;
            let spectrum = stft.analyze(&padded[start..start + size]);
            let shifted: Vec<Complex<f32>> = spectrum
                .iter()
                .enumerate()
                .map(|(k, bin)| {
                    let mag = bin.norm();
                    let phase = bin.arg();
                    if f == 0 {
                        synth_phase[k] = phase;
                    } else {
                        let expected = 2.0 * PI * k as f32 * HOP_SIZE as f32 / size as f32;
                        let deviation = wrap_phase(phase - last_phase[k] - expected);
                        synth_phase[k] = wrap_phase(synth_phase[k] + (expected + deviation) * ratio);
                    }
                    last_phase[k] = phase;
                    Complex::from_polar(mag, synth_phase[k])
                })
                .collect();
            ola.add(f * synthesis_hop, &stft.synthesize(shifted));
        }

        let out = ola.finish();
        let out_start = pad * synthesis_hop / HOP_SIZE;
        let stretched_len = ((samples.len() as f32 * ratio).round() as usize).max(1);
        let end = (out_start + stretched_len).min(out.len());
        out[out_start.min(end)..end].to_vec()
    }
}

impl Effect for ChangePitch {
    crate::impl_effect_common!("change_pitch", "Change Pitch");

    fn validate(&self) -> Result<()> {
        validate_factor(self.factor)
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        if self.factor == 1.0 {
            return Ok(region.clone());
        }
        let stft = Stft::new(FFT_SIZE);
        // Rounded up so the stretched signal always covers `len * factor` frames
        let synthesis_hop = ((HOP_SIZE as f64 * self.factor as f64).ceil() as usize).max(1);
        let len = region.len();
        let step = self.factor as f64;

        region.map_channels(|_, ch| {
            let stretched = Self::stretch(&stft, ch, synthesis_hop);
            interpolate(&stretched, len, step)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    fn sine(freq: f32, len: usize, sample_rate: u32) -> SampleBuffer {
        let samples = (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        SampleBuffer::mono(samples, sample_rate).unwrap()
    }

    /// Estimate frequency by counting upward zero crossings
    fn estimate_frequency(samples: &[f32], sample_rate: u32) -> f32 {
        let crossings = samples
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        crossings as f32 * sample_rate as f32 / samples.len() as f32
    }

    #[test]
    fn test_speed_halves_length() {
        let region = sine(100.0, 1000, 8000);
        let out = ChangeSpeed { factor: 2.0 }.process(&region).unwrap();
        assert_eq!(out.len(), 500);
        let slow = ChangeSpeed { factor: 0.5 }.process(&region).unwrap();
        assert_eq!(slow.len(), 2000);
    }

    #[test]
    fn test_speed_raises_frequency() {
        let region = sine(200.0, 16000, 16000);
        let out = ChangeSpeed { factor: 2.0 }.process(&region).unwrap();
        let freq = estimate_frequency(out.channel(0), 16000);
        assert!((freq - 400.0).abs() < 10.0, "frequency {}", freq);
    }

    #[test_case(2.0, 880.0 ; "octave up")]
    #[test_case(0.5, 220.0 ; "octave down")]
    fn test_pitch_shift_keeps_duration(factor: f32, expected: f32) {
        let sample_rate = 22050;
        let region = sine(440.0, sample_rate as usize * 2, sample_rate);
        let out = ChangePitch { factor }.process(&region).unwrap();
        assert_eq!(out.len(), region.len());
        assert!(out.is_finite());

        let middle = &out.channel(0)[8000..36000];
        let freq = estimate_frequency(middle, sample_rate);
        assert!(
            (freq - expected).abs() < expected * 0.1,
            "expected ~{} Hz, got {}",
            expected,
            freq
        );
    }

    #[test]
    fn test_extreme_pitch_factor_is_exact() {
        // 512 * 0.005 is not a whole hop
        let sample_rate = 22050;
        let region = sine(2000.0, sample_rate as usize * 4, sample_rate);
        let out = ChangePitch { factor: 0.005 }.process(&region).unwrap();
        assert_eq!(out.len(), region.len());

        let middle = &out.channel(0)[22050..66150];
        let freq = estimate_frequency(middle, sample_rate);
        assert!((freq - 10.0).abs() < 1.0, "expected ~10 Hz, got {}", freq);
    }

    #[test]
    fn test_unity_pitch_is_identity() {
        let region = sine(440.0, 2048, 22050);
        assert_eq!(ChangePitch { factor: 1.0 }.process(&region).unwrap(), region);
    }

    #[test]
    fn test_semitone_conversion() {
        let shift = ChangePitch::from_semitones(12.0);
        assert_abs_diff_eq!(shift.factor, 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(ChangePitch { factor: 0.5 }.semitones(), -12.0, epsilon = 1e-4);
    }

    #[test]
    fn test_rejects_factor() {
        assert!(ChangePitch { factor: 0.0 }.validate().is_err());
        assert!(ChangeSpeed { factor: 4.5 }.validate().is_err());
    }
}
