//! Per-band compressor
//!
//! Envelope follower + gain computer + makeup gain, applied in place to the
//! channels of one band. Detection is stereo-linked peak: the follower sees
//! the largest rectified sample across channels and every channel gets the
//! same gain. Gain is computed every sample.

use crate::dsp::envelope::EnvelopeFollower;
use crate::dsp::gain_computer::GainComputer;
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::params::CompressorParameters;

/// Feed-forward compressor for one band
#[derive(Debug, Clone)]
pub struct BandCompressor {
    params: CompressorParameters,
    sample_rate: f64,
    envelope: EnvelopeFollower,
    gain_computer: GainComputer,
    /// Largest reduction applied during the last processed block
    gain_reduction_db: f32,
}

impl BandCompressor {
    /// Create a compressor with default parameters
    pub fn new(sample_rate: f64) -> Self {
        Self::with_params(sample_rate, CompressorParameters::default())
    }

    /// Create a compressor with custom parameters (clamped)
    pub fn with_params(sample_rate: f64, params: CompressorParameters) -> Self {
        let params = params.clamped();
        Self {
            params,
            sample_rate,
            envelope: EnvelopeFollower::new(sample_rate, params.attack_ms, params.release_ms),
            gain_computer: GainComputer::new(params.threshold_db, params.ratio, params.knee_db),
            gain_reduction_db: 0.0,
        }
    }

    /// Adopt a new sample rate and return to silence
    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.envelope
            .set_sample_rate(sample_rate, self.params.attack_ms, self.params.release_ms);
        self.reset();
    }

    /// Reset the envelope to silence
    pub fn reset(&mut self) {
        self.envelope.reset();
        self.gain_reduction_db = 0.0;
    }

    /// Get the current parameters
    pub fn params(&self) -> &CompressorParameters {
        &self.params
    }

    /// Set the parameters (clamps). Does not allocate and keeps the envelope.
    pub fn set_params(&mut self, params: CompressorParameters) {
        let params = params.clamped();
        if params.attack_ms != self.params.attack_ms || params.release_ms != self.params.release_ms {
            self.envelope.set_times(params.attack_ms, params.release_ms);
        }
        self.gain_computer = GainComputer::new(params.threshold_db, params.ratio, params.knee_db);
        self.params = params;
    }

    /// Largest gain reduction in dB applied during the last block
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }

    /// Current detector level (linear)
    pub fn envelope_level(&self) -> f32 {
        self.envelope.level()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Compress `num_samples` samples of every channel in place
    ///
    /// When bypassed the detector keeps running but samples are left untouched.
    pub fn process<C: AsMut<[f32]>>(&mut self, channels: &mut [C], num_samples: usize) {
        let bypass = self.params.bypass;
        let makeup_db = self.params.makeup_gain_db;
        let mut max_reduction = 0.0_f32;

        for n in 0..num_samples {
            let peak = channels
                .iter_mut()
                .fold(0.0_f32, |peak, ch| peak.max(ch.as_mut()[n].abs()));
            let level = self.envelope.process(peak);

            if bypass {
                continue;
            }

            let reduction = self.gain_computer.reduction_db(linear_to_db(level));
            max_reduction = max_reduction.max(reduction);

            let gain = db_to_linear(makeup_db - reduction);
            for ch in channels.iter_mut() {
                ch.as_mut()[n] *= gain;
            }
        }

        self.gain_reduction_db = max_reduction;
    }
}
