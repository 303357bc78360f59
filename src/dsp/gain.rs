//! Gain-family operations
//!
//! Normalize, amplify, silence, reverse and the two fades. None of them carry
//! state between samples, so each works directly on the region's channels.

use super::effect::{ensure_param, Effect};
use crate::engine::SampleBuffer;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Largest accepted amplification factor
pub const MAX_AMPLIFY_GAIN: f32 = 10.0;

// ============================================================================
// Normalize
// ============================================================================

/// Scale the region so its peak absolute sample reaches 1.0
///
/// A silent region is returned unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Normalize;

impl Effect for Normalize {
    crate::impl_effect_common!("normalize", "Normalize");

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        let peak = region.peak();
        if peak == 0.0 {
            return Ok(region.clone());
        }
        let scale = 1.0 / peak;
        region.map_channels(|_, ch| ch.iter().map(|s| (s * scale).clamp(-1.0, 1.0)).collect())
    }
}

// ============================================================================
// Amplify
// ============================================================================

/// Multiply by a fixed gain, hard-clipping to [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Amplify {
    /// Linear gain in (0, 10]
    pub gain: f32,
}

impl Default for Amplify {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

impl Effect for Amplify {
    crate::impl_effect_common!("amplify", "Amplify");

    fn validate(&self) -> Result<()> {
        ensure_param(
            self.gain > 0.0 && self.gain <= MAX_AMPLIFY_GAIN,
            "gain",
            self.gain,
            "(0, 10]",
        )
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        // Unity gain must not clip out-of-range input.
        if self.gain == 1.0 {
            return Ok(region.clone());
        }
        let gain = self.gain;
        region.map_channels(|_, ch| ch.iter().map(|s| (s * gain).clamp(-1.0, 1.0)).collect())
    }
}

// ============================================================================
// Silence / Reverse
// ============================================================================

/// Replace the region with zeros
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Silence;

impl Effect for Silence {
    crate::impl_effect_common!("silence", "Silence");

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        SampleBuffer::silent(region.num_channels(), region.len(), region.sample_rate())
    }
}

/// Reverse frame order, keeping channels aligned
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reverse;

impl Effect for Reverse {
    crate::impl_effect_common!("reverse", "Reverse");

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        region.map_channels(|_, ch| ch.iter().rev().copied().collect())
    }
}

// ============================================================================
// Fades
// ============================================================================

/// Envelope shape used by the fades
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Straight ramp
    #[default]
    Linear,
    /// Quarter sine, constant perceived loudness through a crossfade
    EqualPower,
}

impl FadeCurve {
    /// Envelope weight for position `t` in [0, 1]
    #[inline]
    pub fn weight(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }
}

/// Position of frame `i` in an `n`-frame region, 0 at the first frame and 1 at the last
#[inline]
fn ramp_position(i: usize, n: usize) -> f32 {
    if n <= 1 {
        0.0
    } else {
        i as f32 / (n - 1) as f32
    }
}

fn apply_envelope(region: &SampleBuffer, envelope: impl Fn(f32) -> f32) -> Result<SampleBuffer> {
    let n = region.len();
    region.map_channels(|_, ch| {
        ch.iter()
            .enumerate()
            .map(|(i, s)| s * envelope(ramp_position(i, n)))
            .collect()
    })
}

/// Ramp from silence up to full level across the region
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeIn {
    pub curve: FadeCurve,
}

impl Effect for FadeIn {
    crate::impl_effect_common!("fade_in", "Fade In");

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        let curve = self.curve;
        apply_envelope(region, |t| curve.weight(t))
    }
}

/// Ramp from full level down to silence across the region
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeOut {
    pub curve: FadeCurve,
}

impl Effect for FadeOut {
    crate::impl_effect_common!("fade_out", "Fade Out");

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        let curve = self.curve;
        apply_envelope(region, |t| curve.weight(1.0 - t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::apply_effect;
    use crate::engine::SampleRange;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn stereo(left: Vec<f32>, right: Vec<f32>) -> SampleBuffer {
        SampleBuffer::new(vec![left, right], 8000).unwrap()
    }

    #[test]
    fn test_normalize_reaches_unity_peak() {
        let region = stereo(vec![0.1, -0.25], vec![0.2, 0.05]);
        let out = Normalize.process(&region).unwrap();
        assert_abs_diff_eq!(out.peak(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.channel(0)[0], 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize_silence_is_noop() {
        let region = SampleBuffer::silent(2, 16, 8000).unwrap();
        assert_eq!(Normalize.process(&region).unwrap(), region);
    }

    #[test]
    fn test_amplify_clips_instead_of_wrapping() {
        let region = stereo(vec![0.3, -0.6], vec![0.9, 0.1]);
        let out = Amplify { gain: 2.0 }.process(&region).unwrap();
        assert_eq!(out.channel(0), &[0.6, -1.0]);
        assert_eq!(out.channel(1), &[1.0, 0.2]);
    }

    #[test]
    fn test_amplify_unity_is_identity() {
        let region = stereo(vec![1.5, -0.3], vec![0.2, -2.0]);
        assert_eq!(Amplify { gain: 1.0 }.process(&region).unwrap(), region);
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(-1.0 ; "negative")]
    #[test_case(10.5 ; "above max")]
    #[test_case(f32::NAN ; "nan")]
    fn test_amplify_rejects_gain(gain: f32) {
        assert!(Amplify { gain }.validate().is_err());
    }

    #[test]
    fn test_reverse_keeps_channels_aligned() {
        let region = stereo(vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]);
        let out = Reverse.process(&region).unwrap();
        assert_eq!(out.channel(0), &[3.0, 2.0, 1.0]);
        assert_eq!(out.channel(1), &[-3.0, -2.0, -1.0]);
    }

    #[test]
    fn test_reverse_is_involution() {
        let buffer = stereo(
            (0..32).map(|i| (i as f32 * 0.3).sin()).collect(),
            (0..32).map(|i| (i as f32 * 0.7).cos()).collect(),
        );
        let range = SampleRange::new(5, 27);
        let once = apply_effect(&Reverse, &buffer, range).unwrap();
        let twice = apply_effect(&Reverse, &once, range).unwrap();
        assert_eq!(twice, buffer);
    }

    #[test_case(FadeCurve::Linear ; "linear")]
    #[test_case(FadeCurve::EqualPower ; "equal power")]
    fn test_fade_endpoints(curve: FadeCurve) {
        let region = SampleBuffer::mono(vec![1.0; 101], 8000).unwrap();
        let faded_in = FadeIn { curve }.process(&region).unwrap();
        assert_abs_diff_eq!(faded_in.channel(0)[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(faded_in.channel(0)[100], 1.0, epsilon = 1e-6);

        let faded_out = FadeOut { curve }.process(&region).unwrap();
        assert_abs_diff_eq!(faded_out.channel(0)[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(faded_out.channel(0)[100], 0.0, epsilon = 1e-6);

        // monotonic
        assert!(faded_in.channel(0).windows(2).all(|w| w[1] >= w[0]));
        assert!(faded_out.channel(0).windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_fade_in_then_out_keeps_length() {
        let buffer = SampleBuffer::mono(vec![0.5; 64], 8000).unwrap();
        let range = SampleRange::new(8, 40);
        let faded = apply_effect(&FadeIn::default(), &buffer, range).unwrap();
        let faded = apply_effect(&FadeOut::default(), &faded, range).unwrap();
        assert_eq!(faded.len(), buffer.len());
    }
}
