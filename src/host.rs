//! Host-facing wrapper
//!
//! Presents the engine the way a plugin host sees it: a fixed name, one
//! program, a bus layout check, string-keyed parameters and opaque state
//! blobs. Parameter names have the form `band{N}.{key}`, e.g.
//! `band0.threshold` or `band2.bypass`. Name lookup lives only here; the
//! engine works with [`ParamId`] and [`CompressorParameters`].

use log::debug;

use crate::dsp::crossover::BandSplitConfig;
use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::engine::MultiBandEngine;
use crate::error::{Result, ThreebandError};
use crate::params::{ParamDescriptor, ParamId, ParamValue, ParameterHandle, BAND_PARAMETERS};

/// Name reported to hosts
pub const PLUGIN_NAME: &str = "3-Band Compressor";

/// The single program
pub const PROGRAM_NAMES: [&str; 1] = ["Default"];

/// Whether an input/output bus pair can be processed
///
/// Output must be mono or stereo and the input must match it.
pub fn is_layout_supported(input: Option<ChannelLayout>, output: Option<ChannelLayout>) -> bool {
    output.is_some() && input == output
}

// ============================================================================
// Parameter Adapter
// ============================================================================

/// Maps `band{N}.{key}` names onto the shared parameter slots
#[derive(Debug, Clone)]
pub struct ParameterAdapter {
    shared: ParameterHandle,
}

impl ParameterAdapter {
    pub fn new(shared: ParameterHandle) -> Self {
        Self { shared }
    }

    /// Full name of a band parameter
    pub fn name_for(band: usize, id: ParamId) -> String {
        format!("band{}.{}", band, id.descriptor().key)
    }

    /// Resolve a name to `(band, parameter)`
    pub fn resolve(&self, name: &str) -> Result<(usize, ParamId)> {
        let unknown = || ThreebandError::UnknownParameter {
            name: name.to_string(),
        };

        let (band_part, key) = name.split_once('.').ok_or_else(unknown)?;
        let band: usize = band_part
            .strip_prefix("band")
            .and_then(|n| n.parse().ok())
            .ok_or_else(unknown)?;
        let id = ParamId::from_key(key).ok_or_else(unknown)?;

        let band_count = self.shared.band_count();
        if band >= band_count {
            return Err(ThreebandError::BandIndexOutOfRange {
                index: band,
                band_count,
            });
        }
        Ok((band, id))
    }

    /// Set one parameter by name; floats are clamped into range
    pub fn set(&self, name: &str, value: ParamValue) -> Result<()> {
        let (band, id) = self.resolve(name)?;
        let kind = id.descriptor().kind;
        if !kind.accepts(&value) {
            return Err(ThreebandError::ParameterKindMismatch {
                name: name.to_string(),
                expected: kind.name(),
            });
        }

        let mut params = self.shared.load(band)?;
        params.set(id, value);
        self.shared.store(band, params)
    }

    /// Read one parameter by name
    pub fn get(&self, name: &str) -> Result<ParamValue> {
        let (band, id) = self.resolve(name)?;
        Ok(self.shared.load(band)?.get(id))
    }

    /// Every parameter of every active band, lowest band first
    pub fn descriptors(&self) -> Vec<(String, &'static ParamDescriptor)> {
        (0..self.shared.band_count())
            .flat_map(|band| {
                BAND_PARAMETERS
                    .iter()
                    .map(move |d| (Self::name_for(band, d.id), d))
            })
            .collect()
    }
}

// ============================================================================
// Host Processor
// ============================================================================

/// Engine plus the host-side surface around it
#[derive(Debug)]
pub struct HostProcessor {
    engine: MultiBandEngine,
    parameters: ParameterAdapter,
}

impl HostProcessor {
    /// Processor with the default three-band layout
    pub fn new() -> Self {
        Self::with_config(BandSplitConfig::default())
    }

    pub fn with_config(config: BandSplitConfig) -> Self {
        let engine = MultiBandEngine::new(config);
        let parameters = ParameterAdapter::new(engine.parameter_handle());
        Self { engine, parameters }
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn num_programs(&self) -> usize {
        PROGRAM_NAMES.len()
    }

    pub fn current_program(&self) -> usize {
        0
    }

    pub fn program_name(&self, index: usize) -> Option<&'static str> {
        PROGRAM_NAMES.get(index).copied()
    }

    pub fn tail_length_seconds(&self) -> f64 {
        0.0
    }

    pub fn accepts_midi(&self) -> bool {
        false
    }

    pub fn produces_midi(&self) -> bool {
        false
    }

    /// Check the bus layout, then prepare the engine for the output channels
    pub fn prepare_to_play(
        &mut self,
        sample_rate: f64,
        max_block_size: usize,
        input_channels: usize,
        output_channels: usize,
    ) -> Result<()> {
        let input = ChannelLayout::from_count(input_channels);
        let output = ChannelLayout::from_count(output_channels);
        if !is_layout_supported(input, output) {
            return Err(ThreebandError::InvalidChannelCount {
                channels: if output.is_none() {
                    output_channels
                } else {
                    input_channels
                },
            });
        }

        debug!(
            "Host prepare: {} Hz, block {}, {} in / {} out",
            sample_rate, max_block_size, input_channels, output_channels
        );
        self.engine
            .prepare(sample_rate, max_block_size, output_channels)
    }

    /// Process one host block in place
    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        self.engine.process(buffer);
    }

    pub fn release_resources(&mut self) {
        self.engine.release_resources();
    }

    /// Opaque state blob for the host to store
    pub fn get_state_information(&self) -> Result<Vec<u8>> {
        self.engine.serialize_state()
    }

    /// Restore a blob from [`get_state_information`](Self::get_state_information)
    ///
    /// Malformed data resets every band to defaults and returns `StateParse`.
    pub fn set_state_information(&mut self, data: &[u8]) -> Result<()> {
        self.engine.deserialize_state(data)
    }

    pub fn parameters(&self) -> &ParameterAdapter {
        &self.parameters
    }

    pub fn engine(&self) -> &MultiBandEngine {
        &self.engine
    }
}

impl Default for HostProcessor {
    fn default() -> Self {
        Self::new()
    }
}
