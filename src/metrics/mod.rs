//! Shared-table storage for Prometheus-style metrics.
//!
//! Workers push [`UpdateRequest`]s through a [`StorageAdapter`]; a collector
//! calls [`StorageAdapter::collect`] to get exposition-ready
//! [`MetricFamily`] snapshots.

pub mod aggregator;
pub mod keys;
pub mod record;
pub mod storage;
pub mod table;
pub mod types;

pub use keys::{EncodedLabels, MetaKey, SampleKey, SampleSlot};
pub use record::{MetricMeta, MetricRecord, Observation, SampleValue};
pub use storage::StorageAdapter;
pub use table::{InMemoryTable, Lookup, SharedTable, TableSlot};
pub use types::{Command, MetricFamily, MetricType, Sample, UpdateRequest};

#[cfg(test)]
mod tests {
    use super::types::*;

    #[test]
    fn test_metric_type_serializes_lowercase() {
        let json = serde_json::to_string(&MetricType::Histogram).unwrap();
        assert_eq!(json, "\"histogram\"");
        assert_eq!(MetricType::Summary.to_string(), "summary");
    }

    #[test]
    fn test_collection_order() {
        let order: Vec<&str> = MetricType::ALL.iter().map(MetricType::as_str).collect();
        assert_eq!(order, vec!["counter", "gauge", "histogram", "summary"]);
    }

    #[test]
    fn test_command_uppercase_wire_form() {
        let json = serde_json::to_string(&Command::Set).unwrap();
        assert_eq!(json, "\"SET\"");
    }

    #[test]
    fn test_request_builder() {
        let req = UpdateRequest::summary("rtt", "round trips", 1.5, 600, vec![0.5, 0.99])
            .with_labels(["peer", "zone"], ["a", "eu"]);

        assert_eq!(req.metric_type, MetricType::Summary);
        assert_eq!(req.label_names, vec!["peer", "zone"]);
        assert_eq!(req.label_values, vec!["a", "eu"]);
        assert_eq!(req.max_age_seconds, Some(600));
        assert_eq!(req.buckets, None);
    }
}
