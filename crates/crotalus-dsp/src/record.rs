//! Feature catalogue and per-window records

use chrono::{DateTime, Utc};
use crotalus_core::{ChannelId, CrotalusError, CrotalusResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Features the extractor knows how to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    // Time domain
    Rsam,
    Rsem,
    Kurtosis,
    Dsar,

    // Spectral shape
    DominantFrequency,
    MedianRankFrequency,
    CentroidFrequency,
    CentroidFrequencyNormalized,
    BandRatio,
    Tonality,

    // Band aggregation
    SsamLinear,
    SsamOctave,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 12] = [
        FeatureKind::Rsam,
        FeatureKind::Rsem,
        FeatureKind::Kurtosis,
        FeatureKind::Dsar,
        FeatureKind::DominantFrequency,
        FeatureKind::MedianRankFrequency,
        FeatureKind::CentroidFrequency,
        FeatureKind::CentroidFrequencyNormalized,
        FeatureKind::BandRatio,
        FeatureKind::Tonality,
        FeatureKind::SsamLinear,
        FeatureKind::SsamOctave,
    ];

    /// Configuration and record key
    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::Rsam => "rsam",
            FeatureKind::Rsem => "rsem",
            FeatureKind::Kurtosis => "kurtosis",
            FeatureKind::Dsar => "dsar",
            FeatureKind::DominantFrequency => "dominant_frequency",
            FeatureKind::MedianRankFrequency => "median_rank_frequency",
            FeatureKind::CentroidFrequency => "centroid_frequency",
            FeatureKind::CentroidFrequencyNormalized => "centroid_frequency_normalized",
            FeatureKind::BandRatio => "band_ratio",
            FeatureKind::Tonality => "tonality",
            FeatureKind::SsamLinear => "ssam_linear",
            FeatureKind::SsamOctave => "ssam_octave",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureKind {
    type Err = CrotalusError;

    fn from_str(s: &str) -> CrotalusResult<Self> {
        FeatureKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| CrotalusError::config("feature", format!("unknown feature '{}'", s)))
    }
}

/// Value of one feature for one window
///
/// Serialises as a bare number, an array, or `null` for a window whose value
/// could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Scalar(f64),
    Vector(Vec<f64>),
    Missing,
}

impl FeatureValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            FeatureValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            FeatureValue::Vector(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Scalar(value)
    }
}

impl From<Vec<f64>> for FeatureValue {
    fn from(value: Vec<f64>) -> Self {
        FeatureValue::Vector(value)
    }
}

/// All feature values of one channel at one window start time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub timestamp: DateTime<Utc>,
    pub channel: ChannelId,
    pub values: BTreeMap<String, FeatureValue>,
}

impl FeatureRecord {
    pub fn new(timestamp: DateTime<Utc>, channel: ChannelId) -> Self {
        Self {
            timestamp,
            channel,
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, kind: FeatureKind) -> Option<&FeatureValue> {
        self.values.get(kind.name())
    }

    pub fn insert(&mut self, kind: FeatureKind, value: FeatureValue) {
        self.values.insert(kind.name().to_string(), value);
    }
}
