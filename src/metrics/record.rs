//! The per-name record stored in one shared table cell.

use crate::core::{MetricsError, Result};
use crate::metrics::keys::SampleKey;
use crate::metrics::types::{MetricType, UpdateRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive part of a record, fixed by the request that created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricMeta {
    /// Metric name
    pub name: String,
    /// Help text
    pub help: String,
    /// Metric kind
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Label names of every series
    pub label_names: Vec<String>,
    /// Histogram boundaries used for every later observation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<f64>>,
    /// Summary quantiles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantiles: Option<Vec<f64>>,
    /// Summary window length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<u64>,
}

impl MetricMeta {
    /// Meta fixed by the request that creates a record.
    pub fn from_request(req: &UpdateRequest) -> Self {
        Self {
            name: req.name.clone(),
            help: req.help.clone(),
            metric_type: req.metric_type,
            label_names: req.label_names.clone(),
            buckets: req.buckets.clone(),
            quantiles: req.quantiles.clone(),
            max_age_seconds: req.max_age_seconds,
        }
    }
}

/// One summary observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Unix seconds at update time
    pub timestamp: u64,
    /// Observed value
    pub value: f64,
}

/// Stored value of one sample entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// Counter, gauge, bucket count or sum
    Scalar(f64),
    /// Summary window
    Observations(Vec<Observation>),
}

/// Metadata plus every label combination's samples for one (type, name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Fixed descriptive part
    pub meta: MetricMeta,
    /// Entries in key order
    #[serde(with = "entries")]
    pub samples: BTreeMap<SampleKey, SampleValue>,
}

impl MetricRecord {
    /// Record with no samples yet.
    pub fn new(meta: MetricMeta) -> Self {
        Self {
            meta,
            samples: BTreeMap::new(),
        }
    }

    /// Cell bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| MetricsError::encoding(format!("cannot serialize record: {}", e)))
    }

    /// Parse cell bytes, failing with [`MetricsError::Deserialization`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| MetricsError::deserialization(e.to_string()))
    }

    /// Add `delta` to a scalar sample, starting from 0.
    ///
    /// A sum that leaves the finite range is rejected and the sample keeps
    /// its previous value.
    pub fn add(&mut self, key: SampleKey, delta: f64) -> Result<()> {
        match self.samples.entry(key).or_insert(SampleValue::Scalar(0.0)) {
            SampleValue::Scalar(v) => {
                let next = *v + delta;
                if !next.is_finite() {
                    return Err(MetricsError::invalid_request(format!(
                        "{} {:?}: adding {} to {} overflows",
                        self.meta.metric_type, self.meta.name, delta, v
                    )));
                }
                *v = next;
                Ok(())
            },
            SampleValue::Observations(_) => Err(self.mismatch("scalar")),
        }
    }

    /// Replace a scalar sample.
    pub fn set(&mut self, key: SampleKey, value: f64) {
        self.samples.insert(key, SampleValue::Scalar(value));
    }

    /// Append to an observation list, creating it if missing.
    pub fn append(&mut self, key: SampleKey, observation: Observation) -> Result<()> {
        match self
            .samples
            .entry(key)
            .or_insert_with(|| SampleValue::Observations(Vec::new()))
        {
            SampleValue::Observations(list) => {
                list.push(observation);
                Ok(())
            },
            SampleValue::Scalar(_) => Err(self.mismatch("observation list")),
        }
    }

    /// Scalar value of one entry, if it holds one.
    pub fn scalar(&self, key: &SampleKey) -> Option<f64> {
        match self.samples.get(key)? {
            SampleValue::Scalar(v) => Some(*v),
            SampleValue::Observations(_) => None,
        }
    }

    /// True when no entry is left.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn mismatch(&self, expected: &str) -> MetricsError {
        MetricsError::deserialization(format!(
            "{} record {:?} holds a sample that is not a {}",
            self.meta.metric_type, self.meta.name, expected
        ))
    }
}

// JSON object keys must be strings; samples go over the wire as [key, value] pairs.
mod entries {
    use super::{SampleKey, SampleValue};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<SampleKey, SampleValue>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<SampleKey, SampleValue>, D::Error> {
        let pairs: Vec<(SampleKey, SampleValue)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::keys::EncodedLabels;
    use crate::metrics::types::Command;

    fn labels(v: &[&str]) -> EncodedLabels {
        let owned: Vec<String> = v.iter().map(|s| s.to_string()).collect();
        EncodedLabels::encode(&owned).unwrap()
    }

    fn summary_record() -> MetricRecord {
        let req = UpdateRequest::summary("rtt", "round trips", 1.0, 60, vec![0.5, 0.9])
            .with_labels(["peer"], ["a"]);
        MetricRecord::new(MetricMeta::from_request(&req))
    }

    #[test]
    fn test_meta_from_request() {
        let req = UpdateRequest::histogram("latency", "request latency", 0.2, vec![0.1, 1.0])
            .with_labels(["method"], ["GET"]);
        let meta = MetricMeta::from_request(&req);

        assert_eq!(meta.metric_type, MetricType::Histogram);
        assert_eq!(meta.label_names, vec!["method".to_string()]);
        assert_eq!(meta.buckets, Some(vec![0.1, 1.0]));
        assert_eq!(meta.quantiles, None);
    }

    #[test]
    fn test_bytes_preserve_mixed_samples() {
        let mut record = summary_record();
        let key = SampleKey::value(labels(&["a"]));
        record.append(key.clone(), Observation { timestamp: 10, value: 1.5 }).unwrap();
        record.append(key.clone(), Observation { timestamp: 11, value: 2.5 }).unwrap();

        let restored = MetricRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, record);
        match &restored.samples[&key] {
            SampleValue::Observations(list) => assert_eq!(list.len(), 2),
            other => panic!("Expected observations, got {:?}", other),
        }
    }

    #[test]
    fn test_add_defaults_to_zero() {
        let req = UpdateRequest::counter("jobs", "jobs run", 0.0, Command::Add);
        let mut record = MetricRecord::new(MetricMeta::from_request(&req));
        let key = SampleKey::value(labels(&[]));

        record.add(key.clone(), 5.0).unwrap();
        record.add(key.clone(), 3.0).unwrap();
        assert_eq!(record.scalar(&key), Some(8.0));

        record.set(key.clone(), 0.0);
        assert_eq!(record.scalar(&key), Some(0.0));
    }

    #[test]
    fn test_overflowing_add_keeps_previous_value() {
        let req = UpdateRequest::gauge("huge", "", 0.0, Command::Add);
        let mut record = MetricRecord::new(MetricMeta::from_request(&req));
        let key = SampleKey::value(labels(&[]));

        record.add(key.clone(), 1e308).unwrap();
        let err = record.add(key.clone(), 1e308).unwrap_err();
        assert_eq!(err.category(), "validation");
        assert_eq!(record.scalar(&key), Some(1e308));

        let restored = MetricRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let mut record = summary_record();
        let key = SampleKey::value(labels(&["a"]));
        record.append(key.clone(), Observation { timestamp: 1, value: 1.0 }).unwrap();

        let err = record.add(key, 1.0).unwrap_err();
        assert_eq!(err.category(), "serialization");
    }

    #[test]
    fn test_garbage_bytes_fail_to_deserialize() {
        let err = MetricRecord::from_bytes(b"not json").unwrap_err();
        assert!(matches!(err, MetricsError::Deserialization(_)));
    }
}
