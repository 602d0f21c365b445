//! Compressor parameters
//!
//! [`CompressorParameters`] is the value-typed snapshot every band compressor
//! works from. The control thread owns the authoritative values (see
//! [`shared`]) and the audio thread only ever copies snapshots out.

pub mod descriptor;
pub mod shared;

pub use descriptor::{ParamDescriptor, ParamId, ParamKind, ParamValue, BAND_PARAMETERS};
pub use shared::{ParameterHandle, SharedParameters};

use crate::error::{Result, ThreebandError};

// ============================================================================
// Ranges
// ============================================================================

/// Threshold range in dB
pub const THRESHOLD_RANGE_DB: (f32, f32) = (-60.0, 12.0);

/// Attack range in milliseconds
pub const ATTACK_RANGE_MS: (f32, f32) = (0.1, 500.0);

/// Release range in milliseconds
pub const RELEASE_RANGE_MS: (f32, f32) = (5.0, 5000.0);

/// Ratio range (1:1 to 100:1)
pub const RATIO_RANGE: (f32, f32) = (1.0, 100.0);

/// Knee width range in dB (0 = hard knee)
pub const KNEE_RANGE_DB: (f32, f32) = (0.0, 24.0);

/// Makeup gain range in dB
pub const MAKEUP_RANGE_DB: (f32, f32) = (-24.0, 24.0);

/// Ratio choices offered to hosts and UIs
pub const RATIO_CHOICES: [f32; 12] = [
    1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0, 10.0, 15.0, 20.0, 50.0, 100.0,
];

/// Index into [`RATIO_CHOICES`] of the default ratio (3:1)
pub const DEFAULT_RATIO_INDEX: usize = 3;

// ============================================================================
// Compressor Parameters
// ============================================================================

/// Parameters of a single compressor band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorParameters {
    /// Threshold level in dB (-60 to +12 dB)
    pub threshold_db: f32,
    /// Attack time in milliseconds (0.1 to 500 ms)
    pub attack_ms: f32,
    /// Release time in milliseconds (5 to 5000 ms)
    pub release_ms: f32,
    /// Compression ratio (1.0 to 100.0, representing 1:1 to 100:1)
    pub ratio: f32,
    /// Knee width in dB (0 = hard knee)
    pub knee_db: f32,
    /// Makeup gain in dB (-24 to +24 dB)
    pub makeup_gain_db: f32,
    /// Skip gain computation for this band
    pub bypass: bool,
}

impl Default for CompressorParameters {
    fn default() -> Self {
        Self {
            threshold_db: 0.0,
            attack_ms: 50.0,
            release_ms: 250.0,
            ratio: RATIO_CHOICES[DEFAULT_RATIO_INDEX],
            knee_db: 0.0,
            makeup_gain_db: 0.0,
            bypass: false,
        }
    }
}

impl CompressorParameters {
    /// Validate parameters against their ranges
    pub fn validate(&self) -> Result<()> {
        check("threshold_db", self.threshold_db, THRESHOLD_RANGE_DB)?;
        check("attack_ms", self.attack_ms, ATTACK_RANGE_MS)?;
        check("release_ms", self.release_ms, RELEASE_RANGE_MS)?;
        check("ratio", self.ratio, RATIO_RANGE)?;
        check("knee_db", self.knee_db, KNEE_RANGE_DB)?;
        check("makeup_gain_db", self.makeup_gain_db, MAKEUP_RANGE_DB)?;
        Ok(())
    }

    /// Clamp parameters to valid ranges
    ///
    /// Non-finite values are replaced by the field's default.
    pub fn clamp(&mut self) {
        let defaults = Self::default();
        self.threshold_db = clamp_or(self.threshold_db, THRESHOLD_RANGE_DB, defaults.threshold_db);
        self.attack_ms = clamp_or(self.attack_ms, ATTACK_RANGE_MS, defaults.attack_ms);
        self.release_ms = clamp_or(self.release_ms, RELEASE_RANGE_MS, defaults.release_ms);
        self.ratio = clamp_or(self.ratio, RATIO_RANGE, defaults.ratio);
        self.knee_db = clamp_or(self.knee_db, KNEE_RANGE_DB, defaults.knee_db);
        self.makeup_gain_db = clamp_or(self.makeup_gain_db, MAKEUP_RANGE_DB, defaults.makeup_gain_db);
    }

    /// Return a clamped copy
    pub fn clamped(mut self) -> Self {
        self.clamp();
        self
    }

    /// Index of the ratio choice closest to the current ratio
    pub fn ratio_choice_index(&self) -> usize {
        RATIO_CHOICES
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (**a - self.ratio)
                    .abs()
                    .total_cmp(&(**b - self.ratio).abs())
            })
            .map(|(i, _)| i)
            .unwrap_or(DEFAULT_RATIO_INDEX)
    }

    /// Read a single parameter as a typed value
    pub fn get(&self, id: ParamId) -> ParamValue {
        match id {
            ParamId::Threshold => ParamValue::Float(self.threshold_db),
            ParamId::Attack => ParamValue::Float(self.attack_ms),
            ParamId::Release => ParamValue::Float(self.release_ms),
            ParamId::Ratio => ParamValue::Choice(self.ratio_choice_index()),
            ParamId::Knee => ParamValue::Float(self.knee_db),
            ParamId::Makeup => ParamValue::Float(self.makeup_gain_db),
            ParamId::Bypass => ParamValue::Bool(self.bypass),
        }
    }

    /// Write a single parameter from a typed value
    ///
    /// Returns `false` if the value kind does not match the parameter kind.
    /// Float values are clamped; out-of-range choice indices select the last choice.
    pub fn set(&mut self, id: ParamId, value: ParamValue) -> bool {
        match (id, value) {
            (ParamId::Threshold, ParamValue::Float(v)) => self.threshold_db = v,
            (ParamId::Attack, ParamValue::Float(v)) => self.attack_ms = v,
            (ParamId::Release, ParamValue::Float(v)) => self.release_ms = v,
            (ParamId::Ratio, ParamValue::Choice(index)) => {
                self.ratio = RATIO_CHOICES[index.min(RATIO_CHOICES.len() - 1)]
            }
            (ParamId::Knee, ParamValue::Float(v)) => self.knee_db = v,
            (ParamId::Makeup, ParamValue::Float(v)) => self.makeup_gain_db = v,
            (ParamId::Bypass, ParamValue::Bool(v)) => self.bypass = v,
            _ => return false,
        }
        self.clamp();
        true
    }
}

fn check(param: &'static str, value: f32, (min, max): (f32, f32)) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ThreebandError::InvalidParameter {
            param,
            value,
            min,
            max,
        })
    }
}

#[inline]
fn clamp_or(value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
