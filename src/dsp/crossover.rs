//! Linkwitz-Riley band splitter
//!
//! Splits audio into N contiguous bands using N-1 Linkwitz-Riley 24dB/oct
//! crossovers. Each crossover is two cascaded 12dB/oct Butterworth sections
//! (Q = 1/√2) on both the low and the high side.
//!
//! ## Topology
//!
//! ```text
//! x ─┬─ LR4 LP(f0) ── AP(f1) ── AP(f2) ──── band 0
//!    └─ LR4 HP(f0) ─┬─ LR4 LP(f1) ── AP(f2) ─ band 1
//!                   └─ LR4 HP(f1) ─┬─ LR4 LP(f2) ─ band 2
//!                                  └─ LR4 HP(f2) ─ band 3
//! ```
//!
//! At each crossover `LP² + HP²` is the 2nd-order all-pass at that frequency.
//! The all-pass sections on the lower bands give every band the same phase,
//! so the sum of all bands is the input run through `AP(f0)·AP(f1)·…`:
//! unity magnitude at every frequency.
//!
//! Coefficients depend on the sample rate and are only derived when a
//! splitter is built (prepare time).

use crate::dsp::biquad::{BiquadCoeffs, BiquadState, FilterType, BUTTERWORTH_Q};
use crate::error::{Result, ThreebandError};

/// Maximum number of bands supported
pub const MAX_BANDS: usize = 8;

/// Lowest allowed crossover frequency in Hz
pub const MIN_CROSSOVER_HZ: f32 = 20.0;

/// Default crossovers: low/mid at 200 Hz, mid/high at 2 kHz
pub const DEFAULT_CROSSOVERS_HZ: [f32; 2] = [200.0, 2000.0];

// ============================================================================
// Configuration
// ============================================================================

/// Ordered crossover frequencies defining `crossovers + 1` bands
#[derive(Debug, Clone, PartialEq)]
pub struct BandSplitConfig {
    crossovers: Vec<f32>,
}

impl BandSplitConfig {
    /// Validate and build a configuration
    ///
    /// Frequencies must be finite, at least [`MIN_CROSSOVER_HZ`] and strictly
    /// increasing. The Nyquist bound is checked once the sample rate is known.
    pub fn new(crossovers: Vec<f32>) -> Result<Self> {
        if crossovers.len() > MAX_BANDS - 1 {
            return Err(ThreebandError::InvalidCrossover {
                reason: format!(
                    "{} crossovers given, at most {} supported",
                    crossovers.len(),
                    MAX_BANDS - 1
                ),
            });
        }

        for (i, &freq) in crossovers.iter().enumerate() {
            if !freq.is_finite() || freq < MIN_CROSSOVER_HZ {
                return Err(ThreebandError::InvalidCrossover {
                    reason: format!(
                        "crossover {} is {} Hz (minimum {} Hz)",
                        i, freq, MIN_CROSSOVER_HZ
                    ),
                });
            }
            if i > 0 && freq <= crossovers[i - 1] {
                return Err(ThreebandError::InvalidCrossover {
                    reason: format!(
                        "crossover {} ({} Hz) is not above crossover {} ({} Hz)",
                        i,
                        freq,
                        i - 1,
                        crossovers[i - 1]
                    ),
                });
            }
        }

        Ok(Self { crossovers })
    }

    /// A single full-range band (no splitting)
    pub fn single_band() -> Self {
        Self {
            crossovers: Vec::new(),
        }
    }

    /// Crossover frequencies in Hz
    pub fn crossovers(&self) -> &[f32] {
        &self.crossovers
    }

    /// Number of bands (crossovers + 1)
    pub fn band_count(&self) -> usize {
        self.crossovers.len() + 1
    }

    /// Check every crossover lies below Nyquist for `sample_rate`
    pub fn validate_for_sample_rate(&self, sample_rate: f64) -> Result<()> {
        let nyquist = sample_rate / 2.0;
        match self
            .crossovers
            .iter()
            .find(|&&freq| f64::from(freq) >= nyquist)
        {
            Some(freq) => Err(ThreebandError::InvalidCrossover {
                reason: format!(
                    "{} Hz is not below Nyquist ({} Hz at {} Hz sample rate)",
                    freq, nyquist, sample_rate
                ),
            }),
            None => Ok(()),
        }
    }
}

impl Default for BandSplitConfig {
    fn default() -> Self {
        Self {
            crossovers: DEFAULT_CROSSOVERS_HZ.to_vec(),
        }
    }
}

// ============================================================================
// Splitter
// ============================================================================

/// Coefficients of one crossover point
#[derive(Debug, Clone)]
struct CrossoverStage {
    lowpass: BiquadCoeffs,
    highpass: BiquadCoeffs,
    allpass: BiquadCoeffs,
}

impl CrossoverStage {
    fn new(sample_rate: f64, frequency: f32) -> Self {
        let freq = f64::from(frequency);
        Self {
            lowpass: BiquadCoeffs::calculate(FilterType::LowPass, sample_rate, freq, BUTTERWORTH_Q),
            highpass: BiquadCoeffs::calculate(FilterType::HighPass, sample_rate, freq, BUTTERWORTH_Q),
            allpass: BiquadCoeffs::calculate(FilterType::AllPass, sample_rate, freq, BUTTERWORTH_Q),
        }
    }
}

/// Filter memory of one channel
#[derive(Debug, Clone)]
struct ChannelState {
    /// Per crossover: [lp1, lp2, hp1, hp2]
    stages: Vec<[BiquadState; 4]>,
    /// Per band: all-pass sections for every higher crossover
    compensation: Vec<Vec<BiquadState>>,
}

impl ChannelState {
    fn new(num_crossovers: usize) -> Self {
        let compensation = (0..num_crossovers)
            .map(|band| vec![BiquadState::default(); num_crossovers - band - 1])
            .collect();
        Self {
            stages: vec![[BiquadState::default(); 4]; num_crossovers],
            compensation,
        }
    }

    fn reset(&mut self) {
        for stage in &mut self.stages {
            for state in stage.iter_mut() {
                state.reset();
            }
        }
        for band in &mut self.compensation {
            for state in band.iter_mut() {
                state.reset();
            }
        }
    }
}

/// Multi-channel Linkwitz-Riley band splitter
#[derive(Debug, Clone)]
pub struct BandSplitter {
    config: BandSplitConfig,
    sample_rate: f64,
    stages: Vec<CrossoverStage>,
    channels: Vec<ChannelState>,
}

impl BandSplitter {
    /// Derive coefficients and allocate filter state
    pub fn new(config: BandSplitConfig, sample_rate: f64, num_channels: usize) -> Result<Self> {
        config.validate_for_sample_rate(sample_rate)?;

        let stages = config
            .crossovers()
            .iter()
            .map(|&freq| CrossoverStage::new(sample_rate, freq))
            .collect::<Vec<_>>();
        let channels = vec![ChannelState::new(stages.len()); num_channels];

        Ok(Self {
            config,
            sample_rate,
            stages,
            channels,
        })
    }

    pub fn config(&self) -> &BandSplitConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn band_count(&self) -> usize {
        self.stages.len() + 1
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Clear all filter memory
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }

    /// Split one sample of `channel` into `bands[..band_count]`
    #[inline]
    pub fn split_sample(&mut self, channel: usize, input: f32, bands: &mut [f32]) {
        let Self {
            stages, channels, ..
        } = self;
        let state = &mut channels[channel];
        let mut remaining = f64::from(input);

        for (k, stage) in stages.iter().enumerate() {
            let [lp1, lp2, hp1, hp2] = &mut state.stages[k];
            let low = lp2.process(lp1.process(remaining, &stage.lowpass), &stage.lowpass);
            let high = hp2.process(hp1.process(remaining, &stage.highpass), &stage.highpass);

            let mut aligned = low;
            for (offset, allpass) in state.compensation[k].iter_mut().enumerate() {
                aligned = allpass.process(aligned, &stages[k + 1 + offset].allpass);
            }

            bands[k] = aligned as f32;
            remaining = high;
        }

        bands[stages.len()] = remaining as f32;
    }

    /// Split a block of one channel into band buffers
    ///
    /// `bands` is indexed `[band][channel][sample]`; every band buffer for
    /// `channel` must hold at least `input.len()` samples.
    pub fn split_block(&mut self, channel: usize, input: &[f32], bands: &mut [Vec<Vec<f32>>]) {
        let band_count = self.band_count();
        let mut frame = [0.0_f32; MAX_BANDS];

        for (n, &sample) in input.iter().enumerate() {
            self.split_sample(channel, sample, &mut frame[..band_count]);
            for (band, &value) in bands.iter_mut().zip(frame.iter()).take(band_count) {
                band[channel][n] = value;
            }
        }
    }
}
