//! Statically typed parameter descriptors
//!
//! Each band exposes the same set of parameters. Their kind (float, choice or
//! bool) is fixed at compile time, so nothing downstream has to guess what a
//! parameter handle points at.

use super::{
    ATTACK_RANGE_MS, DEFAULT_RATIO_INDEX, KNEE_RANGE_DB, MAKEUP_RANGE_DB, RATIO_CHOICES,
    RELEASE_RANGE_MS, THRESHOLD_RANGE_DB,
};

/// Identifies one per-band parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    Threshold,
    Attack,
    Release,
    Ratio,
    Knee,
    Makeup,
    Bypass,
}

impl ParamId {
    /// All parameter ids in display order
    pub const ALL: [ParamId; 7] = [
        ParamId::Threshold,
        ParamId::Attack,
        ParamId::Release,
        ParamId::Ratio,
        ParamId::Knee,
        ParamId::Makeup,
        ParamId::Bypass,
    ];

    /// Descriptor for this parameter
    pub fn descriptor(self) -> &'static ParamDescriptor {
        // BAND_PARAMETERS is laid out in the same order as ALL
        &BAND_PARAMETERS[self as usize]
    }

    /// Look up a parameter by its short key (e.g. `"threshold"`)
    pub fn from_key(key: &str) -> Option<Self> {
        BAND_PARAMETERS.iter().find(|d| d.key == key).map(|d| d.id)
    }
}

/// Kind and range of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// Continuous value with a range and a step for host display
    Float {
        min: f32,
        max: f32,
        step: f32,
        default: f32,
    },
    /// One of a fixed list of values, addressed by index
    Choice {
        choices: &'static [f32],
        default_index: usize,
    },
    /// On/off switch
    Bool { default: bool },
}

impl ParamKind {
    /// Human-readable kind name
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Float { .. } => "float",
            ParamKind::Choice { .. } => "choice",
            ParamKind::Bool { .. } => "bool",
        }
    }

    /// Default value of this kind
    pub fn default_value(&self) -> ParamValue {
        match *self {
            ParamKind::Float { default, .. } => ParamValue::Float(default),
            ParamKind::Choice { default_index, .. } => ParamValue::Choice(default_index),
            ParamKind::Bool { default } => ParamValue::Bool(default),
        }
    }

    /// Whether `value` has the right kind for this parameter
    pub fn accepts(&self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (ParamKind::Float { .. }, ParamValue::Float(_))
                | (ParamKind::Choice { .. }, ParamValue::Choice(_))
                | (ParamKind::Bool { .. }, ParamValue::Bool(_))
        )
    }
}

/// Typed parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Choice(usize),
    Bool(bool),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{:.2}", v),
            ParamValue::Choice(index) => match RATIO_CHOICES.get(*index) {
                Some(ratio) => write!(f, "{:.1}", ratio),
                None => write!(f, "#{}", index),
            },
            ParamValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Static description of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    pub id: ParamId,
    /// Short key used in parameter names (`band0.<key>`)
    pub key: &'static str,
    /// Display name
    pub name: &'static str,
    /// Display unit, empty when unit-less
    pub unit: &'static str,
    pub kind: ParamKind,
}

/// Descriptors for the parameters of one band, in [`ParamId::ALL`] order
pub static BAND_PARAMETERS: [ParamDescriptor; 7] = [
    ParamDescriptor {
        id: ParamId::Threshold,
        key: "threshold",
        name: "Threshold",
        unit: "dB",
        kind: ParamKind::Float {
            min: THRESHOLD_RANGE_DB.0,
            max: THRESHOLD_RANGE_DB.1,
            step: 1.0,
            default: 0.0,
        },
    },
    ParamDescriptor {
        id: ParamId::Attack,
        key: "attack",
        name: "Attack",
        unit: "ms",
        kind: ParamKind::Float {
            min: ATTACK_RANGE_MS.0,
            max: ATTACK_RANGE_MS.1,
            step: 0.1,
            default: 50.0,
        },
    },
    ParamDescriptor {
        id: ParamId::Release,
        key: "release",
        name: "Release",
        unit: "ms",
        kind: ParamKind::Float {
            min: RELEASE_RANGE_MS.0,
            max: RELEASE_RANGE_MS.1,
            step: 1.0,
            default: 250.0,
        },
    },
    ParamDescriptor {
        id: ParamId::Ratio,
        key: "ratio",
        name: "Ratio",
        unit: ":1",
        kind: ParamKind::Choice {
            choices: &RATIO_CHOICES,
            default_index: DEFAULT_RATIO_INDEX,
        },
    },
    ParamDescriptor {
        id: ParamId::Knee,
        key: "knee",
        name: "Knee",
        unit: "dB",
        kind: ParamKind::Float {
            min: KNEE_RANGE_DB.0,
            max: KNEE_RANGE_DB.1,
            step: 0.5,
            default: 0.0,
        },
    },
    ParamDescriptor {
        id: ParamId::Makeup,
        key: "makeup",
        name: "Makeup Gain",
        unit: "dB",
        kind: ParamKind::Float {
            min: MAKEUP_RANGE_DB.0,
            max: MAKEUP_RANGE_DB.1,
            step: 0.5,
            default: 0.0,
        },
    },
    ParamDescriptor {
        id: ParamId::Bypass,
        key: "bypass",
        name: "Bypass",
        unit: "",
        kind: ParamKind::Bool { default: false },
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CompressorParameters;

    #[test]
    fn test_descriptor_order_matches_ids() {
        for id in ParamId::ALL {
            assert_eq!(id.descriptor().id, id);
        }
    }

    #[test]
    fn test_descriptor_defaults_match_parameter_defaults() {
        let defaults = CompressorParameters::default();
        for descriptor in &BAND_PARAMETERS {
            assert_eq!(
                descriptor.kind.default_value(),
                defaults.get(descriptor.id),
                "default mismatch for {}",
                descriptor.key
            );
        }
    }

    #[test]
    fn test_from_key() {
        assert_eq!(ParamId::from_key("release"), Some(ParamId::Release));
        assert_eq!(ParamId::from_key("Release"), None);
    }

    #[test]
    fn test_kind_accepts() {
        let kind = ParamId::Bypass.descriptor().kind;
        assert!(kind.accepts(&ParamValue::Bool(true)));
        assert!(!kind.accepts(&ParamValue::Float(1.0)));
        assert_eq!(kind.name(), "bool");
    }
}
