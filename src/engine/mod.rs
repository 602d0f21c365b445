//! Audio Engine Module
//!
//! - Audio buffer management
//! - The multi-band engine and its lifecycle
//! - State serialization
//! - WAV file I/O

pub mod buffer;
pub mod io;
pub mod multiband;
pub mod state;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use io::{export_audio, generate_test_tone, import_audio, ExportFormat};
pub use multiband::{EngineState, MultiBandEngine};
pub use state::EngineSnapshot;
