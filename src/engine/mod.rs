//! Audio Engine Module
//!
//! Sample buffers, encode/decode adapters, playback devices and the
//! transport that coordinates them.

pub mod buffer;
pub mod io;
pub mod playback;
pub mod transport;

pub use buffer::{db_to_linear, linear_to_db, SampleBuffer, SampleRange, DEFAULT_SAMPLE_RATE};
pub use io::{
    generate_stereo_test_tone, generate_test_tone, quality_options, read_audio_file,
    write_audio_file, AudioDecoder, AudioEncoder, ExportFormat, ExportQuality, ExportSettings,
    WavCodec,
};
pub use playback::{PlaybackHandle, VirtualPlayback};
pub use transport::{HandleFactory, TickOutcome, TransportController, TransportState};
