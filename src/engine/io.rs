//! Audio encode/decode adapters
//!
//! The editing core only ever sees decoded [`SampleBuffer`]s. Turning bytes
//! into buffers and back is the job of an [`AudioDecoder`] / [`AudioEncoder`]
//! pair; [`WavCodec`] implements both on top of `hound`.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::buffer::SampleBuffer;
use crate::error::{CadenzaError, Result};

// ============================================================================
// Formats and qualities
// ============================================================================

/// Container format for exported audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Wav,
    Mp3,
    Ogg,
}

impl ExportFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Ogg => "ogg",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = CadenzaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(ExportFormat::Wav),
            "mp3" => Ok(ExportFormat::Mp3),
            "ogg" => Ok(ExportFormat::Ogg),
            other => Err(CadenzaError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// Quality setting; which values apply depends on the format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportQuality {
    #[serde(rename = "16bit")]
    Bits16,
    #[serde(rename = "24bit")]
    Bits24,
    #[serde(rename = "32bit")]
    Bits32,
    #[serde(rename = "128kbps")]
    Kbps128,
    #[serde(rename = "192kbps")]
    Kbps192,
    #[serde(rename = "256kbps")]
    Kbps256,
    #[serde(rename = "320kbps")]
    Kbps320,
    #[serde(rename = "q3")]
    Level3,
    #[serde(rename = "q5")]
    Level5,
    #[serde(rename = "q7")]
    Level7,
    #[serde(rename = "q10")]
    Level10,
}

const WAV_QUALITIES: [ExportQuality; 3] = [
    ExportQuality::Bits16,
    ExportQuality::Bits24,
    ExportQuality::Bits32,
];

const MP3_QUALITIES: [ExportQuality; 4] = [
    ExportQuality::Kbps128,
    ExportQuality::Kbps192,
    ExportQuality::Kbps256,
    ExportQuality::Kbps320,
];

const OGG_QUALITIES: [ExportQuality; 4] = [
    ExportQuality::Level3,
    ExportQuality::Level5,
    ExportQuality::Level7,
    ExportQuality::Level10,
];

/// Valid qualities for a format, best-supported first
pub fn quality_options(format: ExportFormat) -> &'static [ExportQuality] {
    match format {
        ExportFormat::Wav => &WAV_QUALITIES,
        ExportFormat::Mp3 => &MP3_QUALITIES,
        ExportFormat::Ogg => &OGG_QUALITIES,
    }
}

impl ExportQuality {
    /// Bits per sample for PCM qualities
    pub fn bit_depth(&self) -> Option<u16> {
        match self {
            ExportQuality::Bits16 => Some(16),
            ExportQuality::Bits24 => Some(24),
            ExportQuality::Bits32 => Some(32),
            _ => None,
        }
    }

    /// Short label, as shown in an export dialog
    pub fn label(&self) -> &'static str {
        match self {
            ExportQuality::Bits16 => "16-bit",
            ExportQuality::Bits24 => "24-bit",
            ExportQuality::Bits32 => "32-bit float",
            ExportQuality::Kbps128 => "128 kbps",
            ExportQuality::Kbps192 => "192 kbps",
            ExportQuality::Kbps256 => "256 kbps",
            ExportQuality::Kbps320 => "320 kbps",
            ExportQuality::Level3 => "quality 3",
            ExportQuality::Level5 => "quality 5",
            ExportQuality::Level7 => "quality 7",
            ExportQuality::Level10 => "quality 10",
        }
    }
}

/// A validated format/quality pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub format: ExportFormat,
    pub quality: ExportQuality,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Wav,
            quality: ExportQuality::Bits16,
        }
    }
}

impl ExportSettings {
    /// Pair a format with a quality, rejecting combinations the format does not offer
    pub fn new(format: ExportFormat, quality: ExportQuality) -> Result<Self> {
        let settings = Self { format, quality };
        settings.validate()?;
        Ok(settings)
    }

    /// WAV at the given bit depth
    pub fn wav(bit_depth: u16) -> Result<Self> {
        let quality = match bit_depth {
            16 => ExportQuality::Bits16,
            24 => ExportQuality::Bits24,
            32 => ExportQuality::Bits32,
            other => {
                return Err(CadenzaError::invalid_parameter(
                    "bit_depth",
                    other,
                    "16, 24 or 32",
                ))
            }
        };
        Self::new(ExportFormat::Wav, quality)
    }

    /// Check the quality against the format's lookup table
    pub fn validate(&self) -> Result<()> {
        let options = quality_options(self.format);
        if options.contains(&self.quality) {
            Ok(())
        } else {
            Err(CadenzaError::invalid_parameter(
                "quality",
                self.quality.label(),
                format!(
                    "one of [{}] for {}",
                    options
                        .iter()
                        .map(|q| q.label())
                        .collect::<Vec<_>>()
                        .join(", "),
                    self.format
                ),
            ))
        }
    }
}

// ============================================================================
// Codec traits
// ============================================================================

/// External encoding service: sample buffer to container bytes
pub trait AudioEncoder: Send + Sync {
    fn encode(&self, buffer: &SampleBuffer, settings: &ExportSettings) -> Result<Vec<u8>>;
}

/// External decoding service: container bytes to sample buffer
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer>;
}

fn hound_error(context: &str, e: hound::Error) -> CadenzaError {
    CadenzaError::InvalidAudio {
        reason: format!("{}: {}", context, e),
        source: Some(Box::new(e)),
    }
}

/// WAV encoder and decoder backed by `hound`
#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec;

impl AudioEncoder for WavCodec {
    fn encode(&self, buffer: &SampleBuffer, settings: &ExportSettings) -> Result<Vec<u8>> {
        settings.validate()?;
        let bit_depth = match (settings.format, settings.quality.bit_depth()) {
            (ExportFormat::Wav, Some(bits)) => bits,
            _ => {
                return Err(CadenzaError::UnsupportedFormat {
                    format: format!("{} ({})", settings.format, settings.quality.label()),
                })
            }
        };

        let spec = WavSpec {
            channels: buffer.num_channels() as u16,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: bit_depth,
            sample_format: if bit_depth == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)
                .map_err(|e| hound_error("Failed to start WAV stream", e))?;
            for sample in buffer.to_interleaved() {
                let written = match bit_depth {
                    16 => writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16),
                    24 => writer
                        .write_sample((sample * 8_388_607.0).clamp(-8_388_608.0, 8_388_607.0) as i32),
                    _ => writer.write_sample(sample),
                };
                written.map_err(|e| hound_error("Failed to write sample", e))?;
            }
            writer
                .finalize()
                .map_err(|e| hound_error("Failed to finalize WAV stream", e))?;
        }

        debug!(
            "Encoded {} frames as {}-bit WAV",
            buffer.len(),
            bit_depth
        );
        Ok(cursor.into_inner())
    }
}

impl AudioDecoder for WavCodec {
    fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer> {
        let reader =
            WavReader::new(Cursor::new(bytes)).map_err(|e| hound_error("Failed to read WAV header", e))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
        SampleBuffer::from_interleaved(&samples, channels, spec.sample_rate)
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| hound_error("Failed to read float samples", e))
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        (SampleFormat::Int, 24) => 8_388_608.0,
        (SampleFormat::Int, 32) => 2_147_483_648.0,
        (SampleFormat::Int, bits) => {
            return Err(CadenzaError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits),
            })
        }
    };
    reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| hound_error("Failed to read integer samples", e))
}

// ============================================================================
// File helpers
// ============================================================================

/// Decode a file from disk
pub fn read_audio_file(path: &Path, decoder: &dyn AudioDecoder) -> Result<SampleBuffer> {
    let bytes = std::fs::read(path)?;
    decoder.decode(&bytes)
}

/// Encode a buffer and write it to disk
pub fn write_audio_file(
    path: &Path,
    buffer: &SampleBuffer,
    settings: &ExportSettings,
    encoder: &dyn AudioEncoder,
) -> Result<()> {
    let bytes = encoder.encode(buffer, settings)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

// ============================================================================
// Test tones
// ============================================================================

/// Generate a mono sine wave at full scale
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> Result<SampleBuffer> {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    let samples = (0..num_samples)
        .map(|i| (angular_freq * i as f32).sin())
        .collect();
    SampleBuffer::mono(samples, sample_rate)
}

/// Generate a stereo test tone with a different frequency per channel
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> Result<SampleBuffer> {
    let left = generate_test_tone(freq_left, duration_secs, sample_rate)?;
    let right = generate_test_tone(freq_right, duration_secs, sample_rate)?;
    let mut channels = left.into_channels();
    channels.extend(right.into_channels());
    SampleBuffer::new(channels, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use test_case::test_case;

    #[test_case(ExportFormat::Wav, ExportQuality::Bits24, true ; "wav 24")]
    #[test_case(ExportFormat::Mp3, ExportQuality::Kbps320, true ; "mp3 320")]
    #[test_case(ExportFormat::Ogg, ExportQuality::Level7, true ; "ogg 7")]
    #[test_case(ExportFormat::Wav, ExportQuality::Kbps128, false ; "wav with bitrate")]
    #[test_case(ExportFormat::Ogg, ExportQuality::Bits16, false ; "ogg with bit depth")]
    fn test_quality_lookup(format: ExportFormat, quality: ExportQuality, valid: bool) {
        assert_eq!(ExportSettings::new(format, quality).is_ok(), valid);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("WAV".parse::<ExportFormat>().unwrap(), ExportFormat::Wav);
        assert!("flac".parse::<ExportFormat>().is_err());
        assert_eq!(quality_options(ExportFormat::Mp3).len(), 4);
    }

    #[test]
    fn test_wav_roundtrip_32bit_is_exact() {
        let tone = generate_stereo_test_tone(440.0, 660.0, 0.05, 8000).unwrap();
        let settings = ExportSettings::wav(32).unwrap();
        let bytes = WavCodec.encode(&tone, &settings).unwrap();
        let decoded = WavCodec.decode(&bytes).unwrap();
        assert_eq!(decoded, tone);
    }

    #[test_case(16, 1e-4 ; "16 bit")]
    #[test_case(24, 1e-6 ; "24 bit")]
    fn test_wav_roundtrip_integer(bits: u16, tolerance: f32) {
        let tone = generate_test_tone(440.0, 0.05, 8000).unwrap();
        let settings = ExportSettings::wav(bits).unwrap();
        let decoded = WavCodec
            .decode(&WavCodec.encode(&tone, &settings).unwrap())
            .unwrap();
        assert_eq!(decoded.len(), tone.len());
        for (a, b) in decoded.channel(0).iter().zip(tone.channel(0)) {
            assert_abs_diff_eq!(a, b, epsilon = tolerance);
        }
    }

    #[test]
    fn test_compressed_formats_rejected_by_wav_encoder() {
        let tone = generate_test_tone(440.0, 0.01, 8000).unwrap();
        let settings = ExportSettings::new(ExportFormat::Mp3, ExportQuality::Kbps192).unwrap();
        let err = WavCodec.encode(&tone, &settings).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = WavCodec.decode(b"definitely not a wav file").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AUDIO");
    }

    #[test]
    fn test_file_helpers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let tone = generate_test_tone(220.0, 0.02, 8000).unwrap();
        write_audio_file(&path, &tone, &ExportSettings::wav(32).unwrap(), &WavCodec).unwrap();
        let read = read_audio_file(&path, &WavCodec).unwrap();
        assert_eq!(read, tone);
    }
}
