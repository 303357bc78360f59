//! DSP Operation Library
//!
//! Pure transforms over sample buffers. Every operation implements the
//! [`Effect`] trait and is applied to a frame range through [`apply_effect`];
//! [`mixdown`] combines whole tracks for export.

mod compressor;
mod delay;
mod effect;
mod eq;
mod gain;
mod limiter;
mod mixdown;
mod noise;
mod pitch;
mod reverb;
mod spectral;

pub use compressor::Compressor;
pub use delay::Delay;
pub use effect::{apply_effect, Effect, EffectSpec};
pub use eq::{HighPassFilter, LowPassFilter, ParametricEq};
pub use gain::{Amplify, FadeCurve, FadeIn, FadeOut, Normalize, Reverse, Silence};
pub use limiter::Limiter;
pub use mixdown::{audible, mixdown, pan_stereo, MixSource};
pub use noise::NoiseReduction;
pub use pitch::{ChangePitch, ChangeSpeed};
pub use reverb::Reverb;
