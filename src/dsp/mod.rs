//! DSP building blocks
//!
//! Everything here runs on the audio thread and allocates only at
//! construction or prepare time.

pub mod band_compressor;
pub mod biquad;
pub mod crossover;
pub mod envelope;
pub mod gain_computer;

pub use band_compressor::BandCompressor;
pub use biquad::{BiquadCoeffs, BiquadState, FilterType};
pub use crossover::{BandSplitConfig, BandSplitter, MAX_BANDS};
pub use envelope::EnvelopeFollower;
pub use gain_computer::GainComputer;
