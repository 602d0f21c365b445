//! Audio Buffer Management
//!
//! Non-interleaved sample storage plus the level helpers used by the
//! compressor and the tests.

use crate::error::{Result, ThreebandError};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
///
/// # Arguments
/// * `db` - Value in decibels
///
/// # Returns
/// Linear amplitude (0.0 to 1.0+ range)
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// # Arguments
/// * `linear` - Linear amplitude value
///
/// # Returns
/// Value in decibels. Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// RMS level of a slice in dB (-inf for empty or silent input)
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return f32::NEG_INFINITY;
    }
    let sum_squares: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    linear_to_db((sum_squares / samples.len() as f64).sqrt() as f32)
}

/// Peak level of a slice in dB (-inf for empty or silent input)
pub fn peak_db(samples: &[f32]) -> f32 {
    linear_to_db(samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max))
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Non-interleaved 32-bit float audio
///
/// # Example
/// ```
/// use threeband::engine::buffer::AudioBuffer;
///
/// let buffer = AudioBuffer::new(2, 512, 48000);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 512);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(num_channels: usize, num_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Build a buffer from per-channel vectors of equal length
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if let Some(first) = samples.first() {
            if samples.iter().any(|ch| ch.len() != first.len()) {
                return Err(ThreebandError::UnsupportedFormat {
                    format: "channels of different lengths".to_string(),
                });
            }
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// # Arguments
    /// * `interleaved` - Interleaved sample data (L, R, L, R, ... for stereo)
    /// * `num_channels` - Number of interleaved channels
    /// * `sample_rate` - Sample rate in Hz
    pub fn from_interleaved(
        interleaved: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if num_channels == 0 {
            return Err(ThreebandError::InvalidChannelCount { channels: 0 });
        }
        if interleaved.len() % num_channels != 0 {
            return Err(ThreebandError::UnsupportedFormat {
                format: format!(
                    "interleaved length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());
        for n in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[n]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the channel layout, if mono or stereo
    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_count(self.channels())
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Peak level across all channels in dB
    pub fn peak_db(&self) -> f32 {
        self.samples
            .iter()
            .map(|ch| peak_db(ch))
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }
}

// ============================================================================
// Tests
// ============================================================================
