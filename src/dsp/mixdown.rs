//! Mixdown for export
//!
//! Sums tracks into one stereo buffer after volume, pan, mute and solo.

use crate::engine::SampleBuffer;
use crate::error::{CadenzaError, Result};
use std::f32::consts::FRAC_PI_2;

/// One track's contribution to a mixdown
#[derive(Debug, Clone, Copy)]
pub struct MixSource<'a> {
    pub buffer: &'a SampleBuffer,
    pub volume: f32,
    pub pan: f32,
    pub muted: bool,
    pub soloed: bool,
}

/// Equal-power stereo panner, same law as a Web Audio `StereoPannerNode`
///
/// Mono input is spread across both sides; stereo input has the far side
/// folded into the near one as the pan moves away from centre.
pub fn pan_stereo(left: f32, right: Option<f32>, pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    match right {
        None => {
            let x = (pan + 1.0) / 2.0;
            (left * (x * FRAC_PI_2).cos(), left * (x * FRAC_PI_2).sin())
        }
        Some(right) if pan <= 0.0 => {
            let x = pan + 1.0;
            (
                left + right * (x * FRAC_PI_2).cos(),
                right * (x * FRAC_PI_2).sin(),
            )
        }
        Some(right) => {
            let x = pan;
            (
                left * (x * FRAC_PI_2).cos(),
                right + left * (x * FRAC_PI_2).sin(),
            )
        }
    }
}

/// Tracks that are heard: never muted ones, and only soloed ones when any track is soloed
pub fn audible(sources: &[MixSource<'_>]) -> Vec<bool> {
    let any_solo = sources.iter().any(|s| s.soloed);
    sources
        .iter()
        .map(|s| !s.muted && (!any_solo || s.soloed))
        .collect()
}

/// Mix `sources` into a stereo buffer at `sample_rate`
///
/// Returns `Ok(None)` when no source contributes audio. The sum is not
/// clipped; encoders clamp on conversion.
pub fn mixdown(sources: &[MixSource<'_>], sample_rate: u32) -> Result<Option<SampleBuffer>> {
    if sample_rate == 0 {
        return Err(CadenzaError::invalid_parameter(
            "sample_rate",
            sample_rate,
            "a positive rate",
        ));
    }

    let flags = audible(sources);
    let mut prepared = Vec::new();
    for (source, heard) in sources.iter().zip(flags) {
        if !heard || source.buffer.is_empty() {
            continue;
        }
        let buffer = source.buffer.resample(sample_rate)?;
        let buffer = if buffer.num_channels() > 2 {
            buffer.with_channel_count(2)?
        } else {
            buffer
        };
        prepared.push((source, buffer));
    }

    if prepared.is_empty() {
        return Ok(None);
    }

    let len = prepared.iter().map(|(_, b)| b.len()).max().unwrap_or(0);
    let mut left = vec![0.0_f32; len];
    let mut right = vec![0.0_f32; len];

    for (source, buffer) in &prepared {
        let stereo = buffer.num_channels() == 2;
        for i in 0..buffer.len() {
            let r = if stereo { Some(buffer.channel(1)[i]) } else { None };
            let (l, r) = pan_stereo(buffer.channel(0)[i], r, source.pan);
            left[i] += l * source.volume;
            right[i] += r * source.volume;
        }
    }

    SampleBuffer::new(vec![left, right], sample_rate).map(Some)
}
