//! Parametric EQ and pass filters
//!
//! Second-order sections using the Audio EQ Cookbook formulas.
//! Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html

use super::effect::{ensure_param, Effect};
use crate::engine::SampleBuffer;
use crate::error::{CadenzaError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Largest accepted boost or cut for the peaking filter
pub const MAX_EQ_GAIN_DB: f32 = 24.0;

/// Filter response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterShape {
    Peak,
    LowPass,
    HighPass,
}

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    fn calculate(shape: FilterShape, sample_rate: f64, frequency: f64, gain_db: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * frequency / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match shape {
            FilterShape::Peak => {
                let a = 10.0_f64.powf(gain_db / 40.0);
                (
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
            FilterShape::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterShape::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Run one channel through a fresh biquad (direct form I)
fn filter_channel(samples: &[f32], c: &BiquadCoeffs) -> Vec<f32> {
    let (mut x1, mut x2, mut y1, mut y2) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
    samples
        .iter()
        .map(|&s| {
            let x = s as f64;
            let y = c.b0 * x + c.b1 * x1 + c.b2 * x2 - c.a1 * y1 - c.a2 * y2;
            x2 = x1;
            x1 = x;
            y2 = y1;
            y1 = y;
            y as f32
        })
        .collect()
}

/// Frequencies must sit strictly between 0 and Nyquist for the region's rate
fn check_frequency(param: &str, frequency: f32, sample_rate: u32) -> Result<()> {
    let nyquist = sample_rate as f32 / 2.0;
    if frequency > 0.0 && frequency < nyquist {
        Ok(())
    } else {
        Err(CadenzaError::invalid_parameter(
            param,
            frequency,
            format!("(0, {}) Hz", nyquist),
        ))
    }
}

fn run_biquad(
    region: &SampleBuffer,
    shape: FilterShape,
    frequency: f32,
    gain_db: f32,
    q: f32,
) -> Result<SampleBuffer> {
    let coeffs = BiquadCoeffs::calculate(
        shape,
        region.sample_rate() as f64,
        frequency as f64,
        gain_db as f64,
        q as f64,
    );
    region.map_channels(|_, ch| filter_channel(ch, &coeffs))
}

// ============================================================================
// Parametric EQ
// ============================================================================

/// Peaking filter centred at `frequency`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParametricEq {
    /// Centre frequency in Hz
    pub frequency: f32,
    /// Boost (positive) or cut (negative) in dB
    pub gain_db: f32,
    /// Bandwidth; higher is narrower
    pub q: f32,
}

impl Default for ParametricEq {
    fn default() -> Self {
        Self {
            frequency: 1000.0,
            gain_db: 0.0,
            q: 1.0,
        }
    }
}

impl Effect for ParametricEq {
    crate::impl_effect_common!("eq", "Parametric EQ");

    fn validate(&self) -> Result<()> {
        ensure_param(self.frequency > 0.0, "frequency", self.frequency, "> 0 Hz")?;
        ensure_param(
            self.gain_db.abs() <= MAX_EQ_GAIN_DB,
            "gain_db",
            self.gain_db,
            "[-24, 24] dB",
        )?;
        ensure_param(self.q > 0.0, "q", self.q, "> 0")
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        check_frequency("frequency", self.frequency, region.sample_rate())?;
        if self.gain_db == 0.0 {
            return Ok(region.clone());
        }
        run_biquad(region, FilterShape::Peak, self.frequency, self.gain_db, self.q)
    }
}

// ============================================================================
// Pass filters
// ============================================================================

/// Second-order Butterworth high-pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighPassFilter {
    /// Cutoff frequency in Hz
    pub cutoff: f32,
}

impl Default for HighPassFilter {
    fn default() -> Self {
        Self { cutoff: 80.0 }
    }
}

impl Effect for HighPassFilter {
    crate::impl_effect_common!("high_pass", "High-Pass Filter");

    fn validate(&self) -> Result<()> {
        ensure_param(self.cutoff > 0.0, "cutoff", self.cutoff, "> 0 Hz")
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        check_frequency("cutoff", self.cutoff, region.sample_rate())?;
        run_biquad(
            region,
            FilterShape::HighPass,
            self.cutoff,
            0.0,
            FRAC_1_SQRT_2 as f32,
        )
    }
}

/// Second-order Butterworth low-pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowPassFilter {
    /// Cutoff frequency in Hz
    pub cutoff: f32,
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self { cutoff: 8000.0 }
    }
}

impl Effect for LowPassFilter {
    crate::impl_effect_common!("low_pass", "Low-Pass Filter");

    fn validate(&self) -> Result<()> {
        ensure_param(self.cutoff > 0.0, "cutoff", self.cutoff, "> 0 Hz")
    }

    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer> {
        check_frequency("cutoff", self.cutoff, region.sample_rate())?;
        run_biquad(
            region,
            FilterShape::LowPass,
            self.cutoff,
            0.0,
            FRAC_1_SQRT_2 as f32,
        )
    }
}
