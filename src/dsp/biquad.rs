//! Second-order filter sections
//!
//! Butterworth low/high pass and all-pass biquads used by the band splitter.
//! All three are bilinear transforms of analog prototypes sharing the same
//! pre-warped corner and pole pair, so at a given frequency and Q
//! `LP² + HP² == AP` holds in the digital domain too.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Butterworth Q; two cascaded sections give a 4th-order Linkwitz-Riley slope
pub const BUTTERWORTH_Q: f64 = FRAC_1_SQRT_2;

/// Filter outputs smaller than this are flushed to zero
const DENORMAL_FLOOR: f64 = 1e-30;

/// Filter response of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    AllPass,
}

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (a0 + a1*z^-1 + a2*z^-2)
/// Normalized: all coefficients divided by a0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Default for BiquadCoeffs {
    /// Identity section
    fn default() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Calculate biquad coefficients using Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    pub fn calculate(filter_type: FilterType, sample_rate: f64, frequency: f64, q: f64) -> Self {
        // Keep the corner below Nyquist so tan() stays finite
        let freq = frequency.clamp(1.0, sample_rate * 0.499);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::AllPass => (
                1.0 - alpha,
                -2.0 * cos_w0,
                1.0 + alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response at `frequency`
    pub fn magnitude(&self, sample_rate: f64, frequency: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    x1: f64, // x[n-1]
    x2: f64, // x[n-2]
    y1: f64, // y[n-1]
    y2: f64, // y[n-2]
}

impl BiquadState {
    /// Process a single sample through the biquad filter
    /// Direct Form I implementation
    #[inline]
    pub fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        // Flush decaying tails before they reach the subnormal range
        let output = if output.abs() < DENORMAL_FLOOR { 0.0 } else { output };

        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
