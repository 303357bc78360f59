//! Limiter Effect
//!
//! Brickwall limiter with instant attack. The gain drops immediately to
//! whatever keeps the frame under the ceiling and recovers towards unity with
//! the release time constant.

use super::compressor::time_to_coeff;
use super::effect::{ensure_param, Effect};
use crate::engine::buffer::db_to_linear;
use crate::engine::SampleBuffer;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Brickwall limiter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limiter {
    /// Ceiling in dB, [-60, 0]
    pub threshold_db: f32,
    /// Release time in seconds, [0.001, 1]
    pub release: f32,
}

impl Default for Limiter {
    fn default() -> Self {
        Self {
            threshold_db: -1.0,
            release: 0.05,
        }
    }
}

impl Effect for Limiter {
    crate::impl_effect_common!("limiter", "Limiter");

    fn validate(&self) -> Result<()> {
        ensure_param(
            (-60.0..=0.0).contains(&self.threshold_db),
            "threshold_db",
            self.threshold_db,
            "[-60, 0] dB",
        )?;
        ensure_param(
            (0.001..=1.0).contains(&self.release),
            "release",
            self.release,
            "[0.001, 1] seconds",
        )
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        let ceiling = db_to_linear(self.threshold_db);
        let release_coeff = time_to_coeff(self.release, region.sample_rate());

        let mut gain = 1.0_f32;
        let gains: Vec<f32> = (0..region.len())
            .map(|frame| {
                let peak = region
                    .channels()
                    .iter()
                    .map(|ch| ch[frame].abs())
                    .fold(0.0_f32, f32::max);
                let required = if peak > ceiling { ceiling / peak } else { 1.0 };
                let recovered = 1.0 - (1.0 - gain) * release_coeff;
                gain = required.min(recovered);
                gain
            })
            .collect();

        // Final clamp absorbs rounding in `ceiling / peak`
        region.map_channels(|_, ch| {
            ch.iter()
                .zip(&gains)
                .map(|(s, g)| (s * g).clamp(-ceiling, ceiling))
                .collect()
        })
    }
}
