//! threeband - Multi-band Dynamics Compressor
//!
//! Splits audio into contiguous frequency bands with Linkwitz-Riley
//! crossovers, compresses each band with its own envelope follower and gain
//! computer, and sums the bands back together.
//!
//! # Architecture
//!
//! - [`dsp`]: filters, envelope follower, gain computer, band splitter and
//!   the per-band compressor
//! - [`engine`]: the [`MultiBandEngine`] lifecycle, buffers, state and WAV I/O
//! - [`params`]: parameter ranges, descriptors and the lock-free slots shared
//!   with control threads
//! - [`host`]: the plugin-host facing wrapper
//!
//! # Example
//! ```
//! use threeband::engine::buffer::AudioBuffer;
//! use threeband::{CompressorParameters, MultiBandEngine};
//!
//! let mut engine = MultiBandEngine::default();
//! engine.prepare(48000.0, 256, 2).unwrap();
//! engine
//!     .set_parameters(0, CompressorParameters { threshold_db: -18.0, ratio: 4.0, ..Default::default() })
//!     .unwrap();
//!
//! let mut buffer = AudioBuffer::new(2, 256, 48000);
//! engine.process(&mut buffer);
//! assert!(buffer.is_finite());
//! ```

pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod host;
pub mod params;

pub use dsp::crossover::BandSplitConfig;
pub use engine::{EngineState, MultiBandEngine};
pub use error::{Result, ThreebandError};
pub use params::{CompressorParameters, ParameterHandle};
