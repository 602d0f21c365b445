//! Engine state serialization
//!
//! State is a small JSON document:
//!
//! ```json
//! {
//!   "format": "threeband",
//!   "version": 1,
//!   "checksum": "<sha256 of the compact payload>",
//!   "payload": { "crossovers_hz": [200.0, 2000.0], "bands": [ ... ] }
//! }
//! ```
//!
//! Values are written as f64 so every f32 parameter reads back bit-exact.
//! The checksum covers the canonical (compact) encoding of the payload, so a
//! pretty-printed preset still verifies.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::dsp::crossover::{BandSplitConfig, MAX_BANDS};
use crate::error::{Result, ThreebandError};
use crate::params::CompressorParameters;

/// Identifies documents written by this crate
pub const STATE_FORMAT: &str = "threeband";

/// Current state layout version
pub const STATE_VERSION: u32 = 1;

/// Everything needed to restore an engine: band layout and band parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub config: BandSplitConfig,
    /// One entry per band, lowest band first
    pub bands: Vec<CompressorParameters>,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        let config = BandSplitConfig::default();
        let bands = vec![CompressorParameters::default(); config.band_count()];
        Self { config, bands }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateEnvelope {
    format: String,
    version: u32,
    checksum: String,
    payload: StatePayload,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatePayload {
    crossovers_hz: Vec<f64>,
    bands: Vec<BandState>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BandState {
    threshold_db: f64,
    attack_ms: f64,
    release_ms: f64,
    ratio: f64,
    knee_db: f64,
    makeup_gain_db: f64,
    bypass: bool,
}

impl From<&CompressorParameters> for BandState {
    fn from(p: &CompressorParameters) -> Self {
        Self {
            threshold_db: f64::from(p.threshold_db),
            attack_ms: f64::from(p.attack_ms),
            release_ms: f64::from(p.release_ms),
            ratio: f64::from(p.ratio),
            knee_db: f64::from(p.knee_db),
            makeup_gain_db: f64::from(p.makeup_gain_db),
            bypass: p.bypass,
        }
    }
}

impl From<&BandState> for CompressorParameters {
    fn from(s: &BandState) -> Self {
        CompressorParameters {
            threshold_db: s.threshold_db as f32,
            attack_ms: s.attack_ms as f32,
            release_ms: s.release_ms as f32,
            ratio: s.ratio as f32,
            knee_db: s.knee_db as f32,
            makeup_gain_db: s.makeup_gain_db as f32,
            bypass: s.bypass,
        }
        .clamped()
    }
}

fn checksum(payload: &StatePayload) -> Result<String> {
    let canonical = serde_json::to_vec(payload)?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

fn parse_error(reason: impl Into<String>) -> ThreebandError {
    ThreebandError::StateParse {
        reason: reason.into(),
    }
}

/// Encode a snapshot as compact JSON bytes
pub fn encode(snapshot: &EngineSnapshot) -> Result<Vec<u8>> {
    let payload = StatePayload {
        crossovers_hz: snapshot
            .config
            .crossovers()
            .iter()
            .map(|&f| f64::from(f))
            .collect(),
        bands: snapshot.bands.iter().map(BandState::from).collect(),
    };
    let envelope = StateEnvelope {
        format: STATE_FORMAT.to_string(),
        version: STATE_VERSION,
        checksum: checksum(&payload)?,
        payload,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Encode a snapshot as indented JSON, for preset files
pub fn encode_pretty(snapshot: &EngineSnapshot) -> Result<String> {
    let compact = encode(snapshot)?;
    let value: serde_json::Value = serde_json::from_slice(&compact)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Decode and verify state bytes
///
/// Every failure (bad JSON, wrong format or version, checksum mismatch,
/// invalid crossovers, band count mismatch) is reported as `StateParse`.
/// Parameter values outside their ranges are clamped.
pub fn decode(bytes: &[u8]) -> Result<EngineSnapshot> {
    let envelope: StateEnvelope =
        serde_json::from_slice(bytes).map_err(|e| parse_error(format!("malformed JSON: {}", e)))?;

    if envelope.format != STATE_FORMAT {
        return Err(parse_error(format!(
            "unknown format '{}' (expected '{}')",
            envelope.format, STATE_FORMAT
        )));
    }
    if envelope.version != STATE_VERSION {
        return Err(parse_error(format!(
            "unsupported version {} (expected {})",
            envelope.version, STATE_VERSION
        )));
    }

    let expected = checksum(&envelope.payload)?;
    if !envelope.checksum.eq_ignore_ascii_case(&expected) {
        return Err(parse_error("checksum mismatch"));
    }

    let payload = envelope.payload;
    if payload.crossovers_hz.len() >= MAX_BANDS {
        return Err(parse_error(format!(
            "{} crossovers exceed the {}-band maximum",
            payload.crossovers_hz.len(),
            MAX_BANDS
        )));
    }
    let crossovers = payload.crossovers_hz.iter().map(|&f| f as f32).collect();
    let config = BandSplitConfig::new(crossovers).map_err(|e| parse_error(e.to_string()))?;

    if payload.bands.len() != config.band_count() {
        return Err(parse_error(format!(
            "{} band(s) stored for {} crossover(s)",
            payload.bands.len(),
            config.crossovers().len()
        )));
    }

    Ok(EngineSnapshot {
        config,
        bands: payload.bands.iter().map(CompressorParameters::from).collect(),
    })
}
