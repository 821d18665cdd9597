//! Common test utilities and fixtures.

#![allow(dead_code)]

use promtable::core::{Clock, ManualClock, StorageConfig};
use promtable::metrics::{MetricFamily, Sample, StorageAdapter};
use std::sync::Arc;

/// Start of the simulated timeline used by fixtures.
pub const EPOCH: u64 = 1_700_000_000;

/// Adapter on a manual clock with cells large enough for test workloads.
pub fn adapter_with_clock() -> (StorageAdapter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(EPOCH));
    let config = StorageConfig {
        value_size: 64 * 1024,
        ..StorageConfig::default()
    };
    let adapter = StorageAdapter::with_clock(config, Arc::clone(&clock) as Arc<dyn Clock>).unwrap();
    (adapter, clock)
}

pub fn family<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
    families
        .iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("no family named {}", name))
}

pub fn sample<'a>(family: &'a MetricFamily, name: &str, label_values: &[&str]) -> &'a Sample {
    family
        .samples
        .iter()
        .find(|s| s.name == name && s.label_values == label_values)
        .unwrap_or_else(|| panic!("no sample {} {:?}", name, label_values))
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
}
