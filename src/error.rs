//! Error handling for Threeband
//!
//! Every fallible control-thread operation returns [`Result`]. The audio
//! thread never sees these errors: parameters are clamped before they reach it
//! and contract violations in `process` are assertions, not error values.

use thiserror::Error;

/// Result type alias for Threeband operations
pub type Result<T> = std::result::Result<T, ThreebandError>;

/// Main error type for Threeband operations
#[derive(Error, Debug)]
pub enum ThreebandError {
    // Parameter Errors
    #[error("Invalid parameter: {param} = {value} (valid range: {min}..{max})")]
    InvalidParameter {
        param: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    #[error("Parameter {name} expects a {expected} value")]
    ParameterKindMismatch { name: String, expected: &'static str },

    #[error("Band index {index} out of range (band count {band_count})")]
    BandIndexOutOfRange { index: usize, band_count: usize },

    // Configuration Errors
    #[error("Invalid crossover configuration: {reason}")]
    InvalidCrossover { reason: String },

    #[error("Invalid sample rate: {sample_rate} Hz")]
    InvalidSampleRate { sample_rate: f64 },

    #[error("Invalid block size: {block_size}")]
    InvalidBlockSize { block_size: usize },

    #[error("Invalid channel count: {channels}")]
    InvalidChannelCount { channels: usize },

    // State Errors
    #[error("Could not restore state: {reason}")]
    StateParse { reason: String },

    // Audio File Errors
    #[error("Failed to read audio file: {path}")]
    AudioReadError {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("Failed to write audio file: {path}")]
    AudioWriteError {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ThreebandError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::UnknownParameter { .. } => "UNKNOWN_PARAMETER",
            Self::ParameterKindMismatch { .. } => "PARAMETER_KIND_MISMATCH",
            Self::BandIndexOutOfRange { .. } => "BAND_INDEX_OUT_OF_RANGE",
            Self::InvalidCrossover { .. } => "INVALID_CROSSOVER",
            Self::InvalidSampleRate { .. } => "INVALID_SAMPLE_RATE",
            Self::InvalidBlockSize { .. } => "INVALID_BLOCK_SIZE",
            Self::InvalidChannelCount { .. } => "INVALID_CHANNEL_COUNT",
            Self::StateParse { .. } => "STATE_PARSE",
            Self::AudioReadError { .. } => "AUDIO_READ_ERROR",
            Self::AudioWriteError { .. } => "AUDIO_WRITE_ERROR",
            Self::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            Self::IoError(_) => "IO_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the host can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. }
                | Self::UnknownParameter { .. }
                | Self::ParameterKindMismatch { .. }
                | Self::BandIndexOutOfRange { .. }
                | Self::StateParse { .. }
                | Self::UnsupportedFormat { .. }
        )
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::InvalidParameter { .. } => "Adjust the parameter to be within valid range",
            Self::UnknownParameter { .. } => "Use `threeband-cli params` to list parameter names",
            Self::BandIndexOutOfRange { .. } => "Use a band index below the configured band count",
            Self::InvalidCrossover { .. } => {
                "Crossovers must be increasing, at least 20 Hz and below Nyquist"
            }
            Self::InvalidSampleRate { .. } => "Use a positive, finite sample rate",
            Self::StateParse { .. } => "Default parameters were restored; save a new preset",
            Self::UnsupportedFormat { .. } => "Use a 16, 24 or 32-bit WAV file",
            _ => "Check the error details and try again",
        }
    }
}
