//! Structured composite keys and the reversible label-value encoding.
//!
//! Keys are tagged tuples rather than separator-joined strings, so a metric
//! name or label value containing `:` can never alias another key. The
//! colon-joined form survives only as a readable rendering for logs and the
//! slot's original key.

use crate::core::{MetricsError, Result};
use crate::metrics::types::MetricType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token of the implicit bucket that catches everything above the last boundary.
pub const INF_BUCKET: &str = "+Inf";

// Fixed seeds keep slot addresses stable for the lifetime of a build.
const HASH_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Identifies one metric record: unique per (type, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaKey {
    /// Table the record lives in
    pub metric_type: MetricType,
    /// Metric name
    pub name: String,
}

impl MetaKey {
    /// Key of the record for `name` in the `metric_type` table.
    pub fn new(metric_type: MetricType, name: &str) -> Self {
        Self {
            metric_type,
            name: name.to_string(),
        }
    }

    /// Slot address inside a shared table.
    pub fn address(&self) -> u64 {
        let [k0, k1, k2, k3] = HASH_SEEDS;
        ahash::RandomState::with_seeds(k0, k1, k2, k3).hash_one(self)
    }

    /// Readable form, cut to at most `max_len` bytes on a char boundary.
    pub fn original_key(&self, max_len: usize) -> String {
        let mut key = self.to_string();
        if key.len() > max_len {
            let mut cut = max_len;
            while !key.is_char_boundary(cut) {
                cut -= 1;
            }
            key.truncate(cut);
        }
        key
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:meta", self.metric_type, self.name)
    }
}

/// Deterministic, reversible text form of an ordered label-value sequence.
///
/// The values are serialized as a JSON string array and the bytes are
/// hex-encoded, which keeps the result free of separators and quoting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedLabels(String);

impl EncodedLabels {
    /// Encode label values in order.
    pub fn encode(values: &[String]) -> Result<Self> {
        let json = serde_json::to_string(values)
            .map_err(|e| MetricsError::encoding(format!("cannot serialize label values: {}", e)))?;
        Ok(Self(hex::encode(json)))
    }

    /// Wrap text that claims to be encoder output. Validation is deferred to [`decode`].
    ///
    /// [`decode`]: EncodedLabels::decode
    pub fn from_encoded(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Recover the label values, failing with [`MetricsError::Decoding`] on foreign text.
    pub fn decode(&self) -> Result<Vec<String>> {
        let bytes = hex::decode(&self.0)
            .map_err(|e| MetricsError::decoding(format!("invalid hex in {:?}: {}", self.0, e)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| MetricsError::decoding(format!("label text is not UTF-8: {}", e)))?;
        serde_json::from_str(&json)
            .map_err(|e| MetricsError::decoding(format!("not a label value array: {}", e)))
    }

    /// Encoded text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What a sample entry inside a record holds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleSlot {
    /// Counter/gauge value or summary observation list
    Value,
    /// Histogram bucket counter, by boundary token
    Bucket(String),
    /// Histogram running sum
    Sum,
}

/// Key of one sample entry, scoped to the record it lives in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleKey {
    /// Label combination of the series
    pub labels: EncodedLabels,
    /// Which sample of the series
    pub slot: SampleSlot,
}

impl SampleKey {
    /// Scalar value or observation list of a series.
    pub fn value(labels: EncodedLabels) -> Self {
        Self {
            labels,
            slot: SampleSlot::Value,
        }
    }

    /// Histogram bucket counter for one boundary.
    pub fn bucket(labels: EncodedLabels, token: impl Into<String>) -> Self {
        Self {
            labels,
            slot: SampleSlot::Bucket(token.into()),
        }
    }

    /// Histogram running sum.
    pub fn sum(labels: EncodedLabels) -> Self {
        Self {
            labels,
            slot: SampleSlot::Sum,
        }
    }

    /// Readable form qualified by the owning record.
    pub fn render(&self, meta: &MetaKey) -> String {
        let suffix = match &self.slot {
            SampleSlot::Value => "value",
            SampleSlot::Bucket(token) => token.as_str(),
            SampleSlot::Sum => "sum",
        };
        format!("{}:{}:{}:{}", meta.metric_type, meta.name, self.labels.as_str(), suffix)
    }
}

/// Label token for a bucket boundary or quantile.
pub fn number_token(value: f64) -> String {
    format!("{}", value)
}
