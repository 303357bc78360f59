//! Noise Reduction
//!
//! Spectral gating. A noise profile is estimated from the quietest frames of
//! the region itself, then every STFT bin close to that profile is attenuated
//! in proportion to `amount`.

use super::effect::{ensure_param, Effect};
use super::spectral::{OverlapAdd, Stft, FFT_SIZE, HOP_SIZE};
use crate::engine::SampleBuffer;
use crate::error::Result;
use log::debug;
use serde::{Deserialize, Serialize};

/// Share of frames (by energy) used to estimate the noise floor
const NOISE_PROFILE_FRACTION: f32 = 0.1;

/// Bins within this factor of the noise floor are treated as noise
const OVER_SUBTRACTION: f32 = 2.0;

/// Spectral noise gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseReduction {
    /// Strength in [0, 1]; 0 leaves the audio untouched
    pub amount: f32,
}

impl Default for NoiseReduction {
    fn default() -> Self {
        Self { amount: 0.5 }
    }
}

impl NoiseReduction {
    fn reduce_channel(&self, stft: &Stft, samples: &[f32]) -> Vec<f32> {
        let size = stft.size();
        // Front padding gives every real sample full window coverage.
        let pad = size - HOP_SIZE;
        let frames = (samples.len() + pad) / HOP_SIZE + 1;
        let padded_len = (frames - 1) * HOP_SIZE + size;

        let mut padded = vec![0.0_f32; padded_len];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let mut spectra: Vec<_> = (0..frames)
            .map(|f| stft.analyze(&padded[f * HOP_SIZE..f * HOP_SIZE + size]))
            .collect();

        // Noise profile from the quietest frames. Frames that overlap the
        // zero padding would drag the estimate down, so they only count when
        // the region is shorter than one frame.
        let interior = |f: usize| f * HOP_SIZE >= pad && f * HOP_SIZE + size <= pad + samples.len();
        let mut energies: Vec<(usize, f32)> = spectra
            .iter()
            .enumerate()
            .filter(|(i, _)| interior(*i))
            .map(|(i, bins)| (i, bins.iter().map(|c| c.norm_sqr()).sum()))
            .collect();
        if energies.is_empty() {
            energies = spectra
                .iter()
                .enumerate()
                .map(|(i, bins)| (i, bins.iter().map(|c| c.norm_sqr()).sum()))
                .collect();
        }
        energies.sort_by(|a, b| a.1.total_cmp(&b.1));
        let profile_frames = ((energies.len() as f32 * NOISE_PROFILE_FRACTION).ceil() as usize)
            .clamp(1, energies.len());

        let mut noise = vec![0.0_f32; size];
        for &(index, _) in &energies[..profile_frames] {
            for (n, bin) in noise.iter_mut().zip(&spectra[index]) {
                *n += bin.norm();
            }
        }
        for n in &mut noise {
            *n /= profile_frames as f32;
        }

        let floor = 1.0 - self.amount;
        let mut ola = OverlapAdd::new(padded_len, size);
        for (f, bins) in spectra.iter_mut().enumerate() {
            for (bin, &noise_mag) in bins.iter_mut().zip(&noise) {
                let mag = bin.norm();
                let gain = if mag > 0.0 {
                    (1.0 - self.amount * OVER_SUBTRACTION * noise_mag / mag).clamp(floor, 1.0)
                } else {
                    floor
                };
                *bin *= gain;
            }
            let frame = stft.synthesize(std::mem::take(bins));
            ola.add(f * HOP_SIZE, &frame);
        }

        let out = ola.finish();
        out[pad..pad + samples.len()].to_vec()
    }
}

impl Effect for NoiseReduction {
    crate::impl_effect_common!("noise_reduction", "Noise Reduction");

    fn validate(&self) -> Result<()> {
        ensure_param(
            (0.0..=1.0).contains(&self.amount),
            "amount",
            self.amount,
            "[0, 1]",
        )
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        if self.amount == 0.0 {
            return Ok(region.clone());
        }
        debug!(
            "Noise reduction over {} frames, amount {}",
            region.len(),
            self.amount
        );
        let stft = Stft::new(FFT_SIZE);
        region.map_channels(|_, ch| self.reduce_channel(&stft, ch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    /// Deterministic pseudo-noise (LCG) so tests stay reproducible
    fn noise(len: usize, level: f32) -> Vec<f32> {
        let mut state: u32 = 12345;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                ((state >> 16) as f32 / 32768.0 - 1.0) * level
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_zero_amount_is_identity() {
        let region = SampleBuffer::mono(noise(4096, 0.1), 16000).unwrap();
        let out = NoiseReduction { amount: 0.0 }.process(&region).unwrap();
        assert_eq!(out, region);
    }

    #[test]
    fn test_attenuates_noise_only_section() {
        let sample_rate = 16000;
        let mut samples = noise(sample_rate as usize * 2, 0.05);
        // tone in the second half only
        for (i, s) in samples.iter_mut().enumerate().skip(sample_rate as usize) {
            *s += 0.5 * (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin();
        }
        let region = SampleBuffer::mono(samples.clone(), sample_rate).unwrap();
        let out = NoiseReduction { amount: 1.0 }.process(&region).unwrap();

        let quiet = 2048..8000;
        let before = rms(&samples[quiet.clone()]);
        let after = rms(&out.channel(0)[quiet]);
        assert!(after < before * 0.5, "noise rms {} -> {}", before, after);

        let loud = 20000..30000;
        let tone_after = rms(&out.channel(0)[loud]);
        assert!(tone_after > 0.25, "tone rms {}", tone_after);
    }

    #[test]
    fn test_short_region_keeps_length() {
        let region = SampleBuffer::mono(noise(100, 0.2), 8000).unwrap();
        let out = NoiseReduction { amount: 0.7 }.process(&region).unwrap();
        assert_eq!(out.len(), 100);
        assert!(out.is_finite());
    }

    #[test]
    fn test_rejects_amount_out_of_range() {
        assert!(NoiseReduction { amount: 1.2 }.validate().is_err());
        assert!(NoiseReduction { amount: -0.1 }.validate().is_err());
    }
}
