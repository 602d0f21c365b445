//! Multi-band compressor engine
//!
//! Owns the band splitter, one [`BandCompressor`] per band and the band
//! buffers. Parameters arrive through [`SharedParameters`] and are picked up
//! once per block, so a parameter change takes effect at the next block
//! boundary.
//!
//! Per block:
//! 1. clear output channels beyond the prepared channel count
//! 2. split every channel into the band buffers
//! 3. compress each band in place (bypassed bands pass through untouched)
//! 4. sum the band buffers back into the output
//!
//! Nothing in [`MultiBandEngine::process`] allocates, locks or logs.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::dsp::band_compressor::BandCompressor;
use crate::dsp::crossover::{BandSplitConfig, BandSplitter};
use crate::engine::buffer::AudioBuffer;
use crate::engine::state::{self, EngineSnapshot};
use crate::error::{Result, ThreebandError};
use crate::params::{CompressorParameters, ParameterHandle, SharedParameters};

/// Sample rate assumed before the first prepare
const DEFAULT_SAMPLE_RATE: f64 = 48000.0;

/// Lifecycle of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No buffers sized; processing outputs silence
    #[default]
    Unprepared,
    /// Buffers and filters sized for the current sample rate and block size
    Prepared,
    /// Inside a `process` call
    ///
    /// Only held while `process` has the engine borrowed mutably, so
    /// [`MultiBandEngine::state`] never reports it to callers.
    Processing,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Unprepared => write!(f, "Unprepared"),
            EngineState::Prepared => write!(f, "Prepared"),
            EngineState::Processing => write!(f, "Processing"),
        }
    }
}

/// N-band compressor: Linkwitz-Riley splitter, per-band compressors, recombiner
pub struct MultiBandEngine {
    state: EngineState,
    config: BandSplitConfig,
    shared: ParameterHandle,
    splitter: Option<BandSplitter>,
    compressors: Vec<BandCompressor>,
    /// Parameter generation each compressor was last synced to
    seen_generations: Vec<u32>,
    /// `[band][channel][sample]`, sized to the maximum block size
    band_buffers: Vec<Vec<Vec<f32>>>,
    sample_rate: f64,
    max_block_size: usize,
    num_channels: usize,
    /// Samples in the most recent block
    last_block_len: usize,
}

impl MultiBandEngine {
    /// Create an unprepared engine for the given band layout
    pub fn new(config: BandSplitConfig) -> Self {
        let band_count = config.band_count();
        Self {
            state: EngineState::Unprepared,
            shared: Arc::new(SharedParameters::new(band_count)),
            compressors: vec![BandCompressor::new(DEFAULT_SAMPLE_RATE); band_count],
            seen_generations: vec![0; band_count],
            config,
            splitter: None,
            band_buffers: Vec::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_size: 0,
            num_channels: 0,
            last_block_len: 0,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Size buffers, derive filter coefficients and reset all state
    ///
    /// Must be called before processing and again whenever the sample rate,
    /// block size or channel count changes.
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize, num_channels: usize) -> Result<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ThreebandError::InvalidSampleRate { sample_rate });
        }
        if max_block_size == 0 {
            return Err(ThreebandError::InvalidBlockSize {
                block_size: max_block_size,
            });
        }
        if num_channels == 0 {
            return Err(ThreebandError::InvalidChannelCount {
                channels: num_channels,
            });
        }

        // Build everything before committing so a failed prepare leaves the engine as it was
        let splitter = BandSplitter::new(self.config.clone(), sample_rate, num_channels)?;
        let band_count = splitter.band_count();

        self.band_buffers = vec![vec![vec![0.0; max_block_size]; num_channels]; band_count];
        self.splitter = Some(splitter);
        self.compressors
            .resize_with(band_count, || BandCompressor::new(sample_rate));
        self.seen_generations.resize(band_count, 0);
        for compressor in &mut self.compressors {
            compressor.prepare(sample_rate);
        }

        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.num_channels = num_channels;
        self.last_block_len = 0;

        self.shared.set_band_count(band_count);
        self.shared.clear_meters();
        self.sync_all_parameters();

        self.state = EngineState::Prepared;
        debug!(
            "Prepared {} band(s) at {} Hz, block {}, {} channel(s), crossovers {:?}",
            band_count,
            sample_rate,
            max_block_size,
            num_channels,
            self.config.crossovers()
        );
        Ok(())
    }

    /// Free buffers and return to [`EngineState::Unprepared`]
    pub fn release_resources(&mut self) {
        self.splitter = None;
        self.band_buffers = Vec::new();
        self.max_block_size = 0;
        self.num_channels = 0;
        self.last_block_len = 0;
        self.state = EngineState::Unprepared;
        debug!("Released engine resources");
    }

    /// Current lifecycle state
    ///
    /// Observed from outside a `process` call, so this is `Unprepared` or
    /// `Prepared`.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Whether `process` may be called
    pub fn is_prepared(&self) -> bool {
        self.state != EngineState::Unprepared
    }

    // ========================================================================
    // Processing
    // ========================================================================

    /// Process an [`AudioBuffer`] in place
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        self.process_channels(&mut buffer.samples);
    }

    /// Process per-channel sample slices in place
    ///
    /// The block length is the length of the first channel. Channels beyond
    /// the prepared count are cleared.
    ///
    /// # Panics
    /// Panics if fewer channels than prepared are passed, if channels differ
    /// in length, or if the block is longer than the prepared maximum. In
    /// debug builds, also panics when called before [`prepare`](Self::prepare);
    /// release builds output silence instead.
    pub fn process_channels<C: AsMut<[f32]>>(&mut self, channels: &mut [C]) {
        debug_assert!(self.is_prepared(), "MultiBandEngine::process called before prepare");
        if !self.is_prepared() {
            for channel in channels.iter_mut() {
                channel.as_mut().fill(0.0);
            }
            return;
        }

        assert!(
            channels.len() >= self.num_channels,
            "buffer has {} channel(s), engine was prepared for {}",
            channels.len(),
            self.num_channels
        );
        let num_samples = channels[0].as_mut().len();
        assert!(
            num_samples <= self.max_block_size,
            "block of {} samples exceeds prepared maximum of {}",
            num_samples,
            self.max_block_size
        );

        self.state = EngineState::Processing;

        // 1. Outputs without a matching input
        for channel in channels[self.num_channels..].iter_mut() {
            channel.as_mut().fill(0.0);
        }

        self.poll_parameters();

        // 2. Split
        if let Some(splitter) = self.splitter.as_mut() {
            for (c, channel) in channels[..self.num_channels].iter_mut().enumerate() {
                let input = channel.as_mut();
                assert_eq!(
                    input.len(),
                    num_samples,
                    "channel {} length differs from channel 0",
                    c
                );
                splitter.split_block(c, input, &mut self.band_buffers);
            }
        }

        // 3. Compress
        for (band, compressor) in self.compressors.iter_mut().enumerate() {
            compressor.process(&mut self.band_buffers[band], num_samples);
            self.shared
                .publish_gain_reduction(band, compressor.gain_reduction_db());
        }

        // 4. Recombine
        for (c, channel) in channels[..self.num_channels].iter_mut().enumerate() {
            let output = channel.as_mut();
            for (n, out) in output.iter_mut().enumerate() {
                let mut sum = 0.0_f32;
                for band in &self.band_buffers {
                    sum += band[c][n];
                }
                *out = sum;
            }
        }

        self.last_block_len = num_samples;
        self.state = EngineState::Prepared;
    }

    /// Process interleaved samples in place
    ///
    /// # Panics
    /// Same contract as [`process_channels`](Self::process_channels); the
    /// number of frames must not exceed the prepared block size and
    /// `num_channels` must match the prepared channel count.
    pub fn process_interleaved(&mut self, samples: &mut [f32], num_channels: usize) {
        debug_assert!(self.is_prepared(), "MultiBandEngine::process called before prepare");
        if !self.is_prepared() {
            samples.fill(0.0);
            return;
        }
        assert_eq!(
            num_channels, self.num_channels,
            "interleaved channel count differs from prepared count"
        );
        assert_eq!(samples.len() % num_channels, 0, "partial interleaved frame");

        let num_samples = samples.len() / num_channels;
        assert!(
            num_samples <= self.max_block_size,
            "block of {} samples exceeds prepared maximum of {}",
            num_samples,
            self.max_block_size
        );

        self.state = EngineState::Processing;
        self.poll_parameters();

        if let Some(splitter) = self.splitter.as_mut() {
            let band_count = splitter.band_count();
            let mut frame = [0.0_f32; crate::dsp::crossover::MAX_BANDS];
            for (n, chunk) in samples.chunks_exact(num_channels).enumerate() {
                for (c, &sample) in chunk.iter().enumerate() {
                    splitter.split_sample(c, sample, &mut frame[..band_count]);
                    for (band, &value) in self.band_buffers.iter_mut().zip(frame.iter()) {
                        band[c][n] = value;
                    }
                }
            }
        }

        for (band, compressor) in self.compressors.iter_mut().enumerate() {
            compressor.process(&mut self.band_buffers[band], num_samples);
            self.shared
                .publish_gain_reduction(band, compressor.gain_reduction_db());
        }

        for (n, chunk) in samples.chunks_exact_mut(num_channels).enumerate() {
            for (c, out) in chunk.iter_mut().enumerate() {
                let mut sum = 0.0_f32;
                for band in &self.band_buffers {
                    sum += band[c][n];
                }
                *out = sum;
            }
        }

        self.last_block_len = num_samples;
        self.state = EngineState::Prepared;
    }

    /// Post-compression signal of one band for the last processed block
    ///
    /// Returns one slice per channel, or `None` for an unknown band or an
    /// unprepared engine.
    pub fn band_output(&self, band: usize) -> Option<Vec<&[f32]>> {
        let buffers = self.band_buffers.get(band)?;
        Some(
            buffers
                .iter()
                .map(|ch| &ch[..self.last_block_len])
                .collect(),
        )
    }

    /// Pick up parameter changes from the control side, once per block
    fn poll_parameters(&mut self) {
        for (band, compressor) in self.compressors.iter_mut().enumerate() {
            if let Some((params, generation)) =
                self.shared.slot(band).poll(self.seen_generations[band])
            {
                compressor.set_params(params);
                self.seen_generations[band] = generation;
            }
        }
    }

    fn sync_all_parameters(&mut self) {
        for (band, compressor) in self.compressors.iter_mut().enumerate() {
            let (params, generation) = self.shared.slot(band).read();
            compressor.set_params(params);
            self.seen_generations[band] = generation;
        }
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Set the parameters of one band (clamped); picked up at the next block
    pub fn set_parameters(&self, band: usize, params: CompressorParameters) -> Result<()> {
        self.shared.store(band, params)
    }

    /// Current parameters of one band
    pub fn parameters(&self, band: usize) -> Result<CompressorParameters> {
        self.shared.load(band)
    }

    /// Parameters of every band, lowest band first
    pub fn all_parameters(&self) -> Vec<CompressorParameters> {
        (0..self.band_count())
            .filter_map(|band| self.shared.load(band).ok())
            .collect()
    }

    /// Handle for control threads (UI, automation) to push parameter updates
    pub fn parameter_handle(&self) -> ParameterHandle {
        Arc::clone(&self.shared)
    }

    /// Gain reduction in dB applied to a band during the last block
    pub fn gain_reduction_db(&self, band: usize) -> Result<f32> {
        self.shared.gain_reduction_db(band)
    }

    /// Replace the crossover layout
    ///
    /// When prepared, the splitter and band buffers are rebuilt for the
    /// current sample rate, block size and channel count (this allocates and
    /// resets filter and envelope state). Bands added by the change start at
    /// default parameters.
    pub fn set_band_split_config(&mut self, config: BandSplitConfig) -> Result<()> {
        if self.is_prepared() {
            config.validate_for_sample_rate(self.sample_rate)?;
        }

        let old_count = self.config.band_count();
        let new_count = config.band_count();
        self.shared.set_band_count(new_count);
        for band in old_count..new_count {
            self.shared.store(band, CompressorParameters::default())?;
        }

        self.config = config;
        self.compressors
            .resize_with(new_count, || BandCompressor::new(self.sample_rate));
        self.seen_generations.resize(new_count, 0);

        if self.is_prepared() {
            let (sample_rate, block, channels) =
                (self.sample_rate, self.max_block_size, self.num_channels);
            self.prepare(sample_rate, block, channels)?;
        }
        debug!("Crossovers set to {:?}", self.config.crossovers());
        Ok(())
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Serialize crossovers and every band's parameters
    pub fn serialize_state(&self) -> Result<Vec<u8>> {
        state::encode(&EngineSnapshot {
            config: self.config.clone(),
            bands: self.all_parameters(),
        })
    }

    /// Restore state produced by [`serialize_state`](Self::serialize_state)
    ///
    /// On malformed input every band falls back to default parameters, a
    /// warning is logged, and the error is returned for the caller to report.
    pub fn deserialize_state(&mut self, bytes: &[u8]) -> Result<()> {
        let restored = state::decode(bytes).and_then(|snapshot| self.apply_snapshot(snapshot));
        if let Err(err) = restored {
            warn!("Falling back to default parameters: {}", err);
            self.shared.reset_to_defaults();
            return Err(match err {
                ThreebandError::StateParse { .. } => err,
                other => ThreebandError::StateParse {
                    reason: other.to_string(),
                },
            });
        }
        Ok(())
    }

    fn apply_snapshot(&mut self, snapshot: EngineSnapshot) -> Result<()> {
        if snapshot.config != self.config {
            self.set_band_split_config(snapshot.config)?;
        }
        for (band, params) in snapshot.bands.into_iter().enumerate() {
            self.shared.store(band, params)?;
        }
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn band_count(&self) -> usize {
        self.config.band_count()
    }

    pub fn crossovers(&self) -> &[f32] {
        self.config.crossovers()
    }

    pub fn band_split_config(&self) -> &BandSplitConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Capacity in samples of each band buffer (0 when unprepared)
    pub fn band_buffer_len(&self) -> usize {
        self.band_buffers
            .first()
            .and_then(|band| band.first())
            .map(|ch| ch.len())
            .unwrap_or(0)
    }

    /// Detector level of one band (linear), mainly for diagnostics
    pub fn envelope_level(&self, band: usize) -> Option<f32> {
        self.compressors.get(band).map(|c| c.envelope_level())
    }
}

impl Default for MultiBandEngine {
    fn default() -> Self {
        Self::new(BandSplitConfig::default())
    }
}

impl fmt::Debug for MultiBandEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiBandEngine")
            .field("state", &self.state)
            .field("crossovers", &self.config.crossovers())
            .field("sample_rate", &self.sample_rate)
            .field("max_block_size", &self.max_block_size)
            .field("num_channels", &self.num_channels)
            .finish()
    }
}
