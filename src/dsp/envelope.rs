//! Envelope follower
//!
//! One-pole attack/release smoother over a rectified level. The smoothed
//! level is the only state a band compressor carries from one block to the
//! next.

/// Convert a time constant to a per-sample one-pole coefficient
///
/// `coeff = exp(-1 / (sample_rate * time_ms / 1000))`. A non-positive time
/// yields 0, i.e. the follower jumps straight to the input.
#[inline]
pub fn time_constant_coeff(time_ms: f32, sample_rate: f64) -> f32 {
    let time_samples = sample_rate * f64::from(time_ms) / 1000.0;
    if time_samples > 0.0 {
        (-1.0 / time_samples).exp() as f32
    } else {
        0.0
    }
}

/// Levels below this snap to zero so release tails never go subnormal
pub const DENORMAL_FLOOR: f32 = 1e-30;

/// Peak envelope follower with separate attack and release
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    sample_rate: f64,
    attack_coeff: f32,
    release_coeff: f32,
    level: f32,
}

impl EnvelopeFollower {
    /// Create a follower for the given sample rate and time constants
    pub fn new(sample_rate: f64, attack_ms: f32, release_ms: f32) -> Self {
        let mut follower = Self {
            sample_rate,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            level: 0.0,
        };
        follower.set_times(attack_ms, release_ms);
        follower
    }

    /// Change the sample rate, keeping the current time constants' coefficients in sync
    pub fn set_sample_rate(&mut self, sample_rate: f64, attack_ms: f32, release_ms: f32) {
        self.sample_rate = sample_rate;
        self.set_times(attack_ms, release_ms);
    }

    /// Recompute attack/release coefficients
    pub fn set_times(&mut self, attack_ms: f32, release_ms: f32) {
        self.attack_coeff = time_constant_coeff(attack_ms, self.sample_rate);
        self.release_coeff = time_constant_coeff(release_ms, self.sample_rate);
    }

    /// Advance by one sample
    ///
    /// `input` must already be rectified (non-negative). Rising input uses the
    /// attack coefficient, falling input the release coefficient.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let coeff = if input > self.level {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        let level = coeff * self.level + (1.0 - coeff) * input;
        self.level = if level < DENORMAL_FLOOR { 0.0 } else { level };
        self.level
    }

    /// Current smoothed level (linear)
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Return to silence
    pub fn reset(&mut self) {
        self.level = 0.0;
    }

    pub fn attack_coeff(&self) -> f32 {
        self.attack_coeff
    }

    pub fn release_coeff(&self) -> f32 {
        self.release_coeff
    }
}
