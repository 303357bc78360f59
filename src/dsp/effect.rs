//! Effect trait definition
//!
//! Every DSP operation is a value implementing [`Effect`]. Effects never touch
//! the caller's buffer: [`apply_effect`] cuts the target region out, hands it
//! to the effect and splices the result back into a fresh buffer.

use super::{
    Amplify, ChangePitch, ChangeSpeed, Compressor, Delay, FadeIn, FadeOut, HighPassFilter,
    Limiter, LowPassFilter, NoiseReduction, Normalize, ParametricEq, Reverb, Reverse, Silence,
};
use crate::engine::{SampleBuffer, SampleRange};
use crate::error::{CadenzaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base trait for all DSP effects
///
/// `process` receives only the samples inside the target range and returns
/// their replacement. The replacement must keep the channel count and sample
/// rate but may change length (speed changes do).
pub trait Effect: Send + Sync + fmt::Debug {
    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;

    /// Get human-readable display name
    fn display_name(&self) -> &str;

    /// Check parameters against their documented ranges
    fn validate(&self) -> Result<()>;

    /// Produce the replacement for `region`
    fn process(&self, region: &SampleBuffer) -> Result<SampleBuffer>;
}

/// Helper macro to implement the naming methods of the Effect trait
#[macro_export]
macro_rules! impl_effect_common {
    ($effect_type:expr, $display_name:expr) => {
        fn effect_type(&self) -> &'static str {
            $effect_type
        }

        fn display_name(&self) -> &str {
            $display_name
        }
    };
}

/// Fail with `InvalidParameter` unless `ok` holds
pub(crate) fn ensure_param(ok: bool, param: &str, value: f32, expected: &str) -> Result<()> {
    if ok && value.is_finite() {
        Ok(())
    } else {
        Err(CadenzaError::invalid_parameter(param, value, expected))
    }
}

/// Apply `effect` to `range` of `buffer`, returning a new buffer
///
/// Samples outside `range` are copied unchanged. Nothing is produced unless
/// the parameters validate, the range lies inside the buffer and the effect
/// output is finite.
pub fn apply_effect(
    effect: &dyn Effect,
    buffer: &SampleBuffer,
    range: SampleRange,
) -> Result<SampleBuffer> {
    effect.validate()?;
    range.check(buffer.len())?;

    let region = buffer.slice(range)?;
    let processed = effect.process(&region)?;

    if !processed.is_finite() {
        return Err(CadenzaError::DspOverflow {
            effect: effect.effect_type().to_string(),
        });
    }
    if processed.num_channels() != buffer.num_channels()
        || processed.sample_rate() != buffer.sample_rate()
    {
        return Err(CadenzaError::InvalidAudio {
            reason: format!(
                "effect '{}' changed the channel layout or sample rate",
                effect.effect_type()
            ),
            source: None,
        });
    }

    buffer.splice(range, &processed)
}

// ============================================================================
// Serializable effect descriptions
// ============================================================================

/// Serializable description of one DSP operation
///
/// Parsed from JSON by the CLI (`{"type": "amplify", "gain": 2.0}`) and
/// recorded in history entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectSpec {
    Normalize,
    Amplify(Amplify),
    Silence,
    Reverse,
    FadeIn(FadeIn),
    FadeOut(FadeOut),
    Reverb(Reverb),
    Delay(Delay),
    NoiseReduction(NoiseReduction),
    ChangeSpeed(ChangeSpeed),
    ChangePitch(ChangePitch),
    Compressor(Compressor),
    Limiter(Limiter),
    Eq(ParametricEq),
    HighPass(HighPassFilter),
    LowPass(LowPassFilter),
}

impl EffectSpec {
    /// Borrow the effect behind this description
    pub fn as_effect(&self) -> &dyn Effect {
        match self {
            EffectSpec::Normalize => &Normalize,
            EffectSpec::Amplify(e) => e,
            EffectSpec::Silence => &Silence,
            EffectSpec::Reverse => &Reverse,
            EffectSpec::FadeIn(e) => e,
            EffectSpec::FadeOut(e) => e,
            EffectSpec::Reverb(e) => e,
            EffectSpec::Delay(e) => e,
            EffectSpec::NoiseReduction(e) => e,
            EffectSpec::ChangeSpeed(e) => e,
            EffectSpec::ChangePitch(e) => e,
            EffectSpec::Compressor(e) => e,
            EffectSpec::Limiter(e) => e,
            EffectSpec::Eq(e) => e,
            EffectSpec::HighPass(e) => e,
            EffectSpec::LowPass(e) => e,
        }
    }

    /// Parse a description from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply the described effect; see [`apply_effect`]
    pub fn apply(&self, buffer: &SampleBuffer, range: SampleRange) -> Result<SampleBuffer> {
        apply_effect(self.as_effect(), buffer, range)
    }
}

impl fmt::Display for EffectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_effect().display_name())
    }
}
