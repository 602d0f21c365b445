//! WAV file I/O
//!
//! Reads and writes WAV at the file's own sample rate. Any channel count is
//! accepted on import; integer data is scaled to [-1, 1) floats.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::AudioBuffer;
use crate::error::{Result, ThreebandError};

/// Sample encoding used when writing WAV files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth: 16, 24 (integer) or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 24 }
    }
}

impl ExportFormat {
    pub fn new(bit_depth: u16) -> Self {
        ExportFormat { bit_depth }
    }

    fn spec(&self, channels: u16, sample_rate: u32) -> Result<WavSpec> {
        let sample_format = match self.bit_depth {
            16 | 24 => SampleFormat::Int,
            32 => SampleFormat::Float,
            other => {
                return Err(ThreebandError::UnsupportedFormat {
                    format: format!("{}-bit audio (only 16, 24, 32 supported)", other),
                })
            }
        };
        Ok(WavSpec {
            channels,
            sample_rate,
            bits_per_sample: self.bit_depth,
            sample_format,
        })
    }
}

/// Read a WAV file into a non-interleaved float buffer
///
/// # Errors
/// * `AudioReadError` - the file is missing or not a readable WAV file
/// * `UnsupportedFormat` - unusual integer bit depth
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    let read_error = |source| ThreebandError::AudioReadError {
        path: path.display().to_string(),
        source,
    };

    let reader = WavReader::open(path).map_err(read_error)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    if channels == 0 {
        return Err(ThreebandError::InvalidChannelCount { channels });
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)
        .map_err(|err| match err {
            ReadFailure::Hound(source) => read_error(source),
            ReadFailure::BitDepth(bits) => ThreebandError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits),
            },
        })?;

    AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)
}

/// Write a buffer to a WAV file at its own sample rate
pub fn export_audio(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    let write_error = |source| ThreebandError::AudioWriteError {
        path: path.display().to_string(),
        source,
    };

    let channels = u16::try_from(buffer.channels()).map_err(|_| {
        ThreebandError::InvalidChannelCount {
            channels: buffer.channels(),
        }
    })?;
    let spec = format.spec(channels, buffer.sample_rate)?;
    let mut writer = WavWriter::create(path, spec).map_err(write_error)?;

    for sample in buffer.to_interleaved() {
        let written = match format.bit_depth {
            16 => {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled)
            }
            // 24-bit is stored as i32 in hound
            24 => {
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled)
            }
            _ => writer.write_sample(sample),
        };
        written.map_err(write_error)?;
    }

    writer.finalize().map_err(write_error)
}

/// Mono sine wave at `frequency` Hz with peak `amplitude`
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f64::consts::PI * f64::from(frequency) / f64::from(sample_rate);
    let samples = (0..num_samples)
        .map(|i| amplitude * (angular_freq * i as f64).sin() as f32)
        .collect();
    AudioBuffer {
        samples: vec![samples],
        sample_rate,
    }
}

// ============================================================================
// Internal helper functions
// ============================================================================

enum ReadFailure {
    Hound(hound::Error),
    BitDepth(u16),
}

fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> std::result::Result<Vec<f32>, ReadFailure> {
    let scale = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => {
            return reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(ReadFailure::Hound)
        }
        (SampleFormat::Int, 8) => 128.0,
        (SampleFormat::Int, 16) => 32768.0,
        (SampleFormat::Int, 24) => 8388608.0,
        (SampleFormat::Int, 32) => 2147483648.0,
        (SampleFormat::Int, bits) => return Err(ReadFailure::BitDepth(bits)),
    };

    // hound widens every integer depth to i32
    reader
        .samples::<i32>()
        .map(|s| s.map(|v| (f64::from(v) / scale) as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(ReadFailure::Hound)
}

// ============================================================================
// Tests
// ============================================================================
