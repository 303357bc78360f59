//! Cadenza - Multi-track Audio Editing Engine
//!
//! Cadenza edits in-memory sample buffers arranged as tracks:
//! 1. A pure DSP library (gain, fades, reverb, delay, noise reduction,
//!    speed/pitch, dynamics, filters, mixdown)
//! 2. A track store with scoped edits, clipboard, split and linear undo/redo
//! 3. A transport coordinating one playback handle per track, with solo/mute
//!    priority and a repeat-region loop
//!
//! # Architecture
//!
//! Buffers are immutable values shared through `Arc`. Every edit produces a
//! new buffer and is committed to the store as one history entry; a failed
//! edit changes nothing.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod state;

pub use config::EditorConfig;
pub use error::{CadenzaError, Result};
