//! Turns stored records into exposition-ready sample lists.
//!
//! Counters and gauges pass through, histograms are made cumulative, and
//! summaries are pruned to their window before quantiles are estimated.

use crate::core::{MetricsError, Result};
use crate::metrics::keys::{number_token, EncodedLabels, SampleSlot, INF_BUCKET};
use crate::metrics::record::{MetricRecord, SampleValue};
use crate::metrics::types::{MetricFamily, Sample};
use std::collections::{BTreeMap, HashMap};

/// Result of aggregating one summary record.
#[derive(Debug)]
pub struct SummaryPass {
    /// Samples of the surviving observations
    pub family: MetricFamily,
    /// Observations were dropped, so the stored record is stale.
    pub pruned: bool,
}

fn family(record: &MetricRecord, samples: Vec<Sample>) -> MetricFamily {
    MetricFamily {
        name: record.meta.name.clone(),
        help: record.meta.help.clone(),
        metric_type: record.meta.metric_type,
        label_names: record.meta.label_names.clone(),
        samples,
    }
}

fn with_extra(mut values: Vec<String>, extra: String) -> Vec<String> {
    values.push(extra);
    values
}

/// Counters and gauges: one sample per label combination.
pub fn aggregate_scalars(record: &MetricRecord) -> Result<MetricFamily> {
    let mut samples = Vec::with_capacity(record.samples.len());

    for (key, value) in &record.samples {
        let SampleValue::Scalar(value) = value else {
            return Err(MetricsError::deserialization(format!(
                "{} {:?} holds an observation list",
                record.meta.metric_type, record.meta.name
            )));
        };
        samples.push(Sample {
            name: record.meta.name.clone(),
            label_names: Vec::new(),
            label_values: key.labels.decode()?,
            value: *value,
        });
    }

    samples.sort_by_cached_key(|s| s.label_values.concat());
    Ok(family(record, samples))
}

#[derive(Default)]
struct BucketGroup {
    counts: HashMap<String, f64>,
    sum: f64,
}

/// Histograms: cumulative `_bucket` samples plus `_count` and `_sum` per group.
pub fn aggregate_histogram(record: &MetricRecord) -> Result<MetricFamily> {
    let name = &record.meta.name;
    let mut tokens: Vec<String> = record
        .meta
        .buckets
        .as_ref()
        .ok_or_else(|| {
            MetricsError::deserialization(format!("histogram {:?} has no buckets", name))
        })?
        .iter()
        .map(|b| number_token(*b))
        .collect();
    tokens.push(INF_BUCKET.to_string());

    let mut groups: BTreeMap<&EncodedLabels, BucketGroup> = BTreeMap::new();
    for (key, value) in &record.samples {
        let SampleValue::Scalar(value) = value else {
            return Err(MetricsError::deserialization(format!(
                "histogram {:?} holds an observation list",
                name
            )));
        };
        let group = groups.entry(&key.labels).or_default();
        match &key.slot {
            SampleSlot::Bucket(token) => {
                group.counts.insert(token.clone(), *value);
            },
            SampleSlot::Sum => group.sum = *value,
            SampleSlot::Value => {},
        }
    }

    let mut samples = Vec::with_capacity(groups.len() * (tokens.len() + 2));
    for (labels, group) in groups {
        let values = labels.decode()?;
        let mut total = 0.0;

        for token in &tokens {
            if let Some(count) = group.counts.get(token) {
                total += count;
            }
            samples.push(Sample {
                name: format!("{}_bucket", name),
                label_names: vec!["le".to_string()],
                label_values: with_extra(values.clone(), token.clone()),
                value: total,
            });
        }

        samples.push(Sample {
            name: format!("{}_count", name),
            label_names: Vec::new(),
            label_values: values.clone(),
            value: total,
        });
        samples.push(Sample {
            name: format!("{}_sum", name),
            label_names: Vec::new(),
            label_values: values,
            value: group.sum,
        });
    }

    Ok(family(record, samples))
}

/// Summaries: drops expired observations from `record`, then estimates the
/// configured quantiles over what survived. Groups left empty are removed.
pub fn aggregate_summary(record: &mut MetricRecord, now: u64) -> Result<SummaryPass> {
    let name = record.meta.name.clone();
    let max_age = record.meta.max_age_seconds.ok_or_else(|| {
        MetricsError::deserialization(format!("summary {:?} has no max age", name))
    })?;
    let quantiles = record.meta.quantiles.clone().ok_or_else(|| {
        MetricsError::deserialization(format!("summary {:?} has no quantiles", name))
    })?;

    let mut pruned = false;
    record.samples.retain(|_, value| match value {
        SampleValue::Observations(list) => {
            let before = list.len();
            list.retain(|o| now.saturating_sub(o.timestamp) <= max_age);
            pruned |= list.len() != before;
            !list.is_empty()
        },
        SampleValue::Scalar(_) => true,
    });

    let mut samples = Vec::new();
    for (key, value) in &record.samples {
        let SampleValue::Observations(list) = value else {
            return Err(MetricsError::deserialization(format!(
                "summary {:?} holds a scalar sample",
                name
            )));
        };
        let values = key.labels.decode()?;
        let mut sorted: Vec<f64> = list.iter().map(|o| o.value).collect();
        sorted.sort_by(f64::total_cmp);

        for &q in &quantiles {
            samples.push(Sample {
                name: name.clone(),
                label_names: vec!["quantile".to_string()],
                label_values: with_extra(values.clone(), number_token(q)),
                value: quantile(&sorted, q),
            });
        }
        samples.push(Sample {
            name: format!("{}_count", name),
            label_names: Vec::new(),
            label_values: values.clone(),
            value: sorted.len() as f64,
        });
        samples.push(Sample {
            name: format!("{}_sum", name),
            label_names: Vec::new(),
            label_values: values,
            value: sorted.iter().sum(),
        });
    }

    Ok(SummaryPass {
        family: family(record, samples),
        pruned,
    })
}

/// Order-statistic estimate with linear interpolation between neighbouring
/// ranks. `sorted` must be ascending; an empty slice yields 0.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let lo = sorted[lower];
            lo + (rank - lower as f64) * (sorted[upper] - lo)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::keys::SampleKey;
    use crate::metrics::record::{MetricMeta, Observation};
    use crate::metrics::types::{Command, UpdateRequest};

    fn labels(v: &[&str]) -> EncodedLabels {
        let owned: Vec<String> = v.iter().map(|s| s.to_string()).collect();
        EncodedLabels::encode(&owned).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_close(quantile(&sorted, 0.5), 3.0);
        assert_close(quantile(&sorted, 0.9), 4.6);
        assert_close(quantile(&sorted, 0.25), 2.0);
        assert_close(quantile(&[7.0], 0.99), 7.0);
        assert_close(quantile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_scalars_sorted_by_joined_values() {
        let req = UpdateRequest::gauge("temp", "temperature", 0.0, Command::Set)
            .with_labels(["room", "floor"], ["b", "1"]);
        let mut record = MetricRecord::new(MetricMeta::from_request(&req));
        record.set(SampleKey::value(labels(&["b", "1"])), 2.0);
        record.set(SampleKey::value(labels(&["a", "2"])), 1.0);
        record.set(SampleKey::value(labels(&["a", "10"])), 3.0);

        let family = aggregate_scalars(&record).unwrap();
        let order: Vec<String> = family.samples.iter().map(|s| s.label_values.concat()).collect();
        assert_eq!(order, vec!["a10", "a2", "b1"]);
        assert_eq!(family.samples[0].value, 3.0);
        assert!(family.samples.iter().all(|s| s.name == "temp"));
    }

    #[test]
    fn test_histogram_propagates_unobserved_buckets() {
        let req = UpdateRequest::histogram("size", "payload size", 0.0, vec![1.0, 2.0, 3.0]);
        let mut record = MetricRecord::new(MetricMeta::from_request(&req));
        let l = labels(&[]);
        record.set(SampleKey::bucket(l.clone(), "1"), 2.0);
        record.set(SampleKey::bucket(l.clone(), "3"), 1.0);
        record.set(SampleKey::sum(l.clone()), 4.5);

        let family = aggregate_histogram(&record).unwrap();
        let values: Vec<f64> = family.samples.iter().map(|s| s.value).collect();
        // le=1, le=2, le=3, le=+Inf, count, sum
        assert_eq!(values, vec![2.0, 2.0, 3.0, 3.0, 3.0, 4.5]);
        assert_eq!(family.samples[3].label_values, vec!["+Inf".to_string()]);
        assert_eq!(family.samples[3].label_names, vec!["le".to_string()]);
        assert_eq!(family.samples[4].name, "size_count");
    }

    #[test]
    fn test_histogram_without_buckets_is_rejected() {
        let req = UpdateRequest::counter("broken", "", 0.0, Command::Add);
        let mut meta = MetricMeta::from_request(&req);
        meta.metric_type = crate::metrics::types::MetricType::Histogram;
        let record = MetricRecord::new(meta);

        assert!(aggregate_histogram(&record).is_err());
    }

    #[test]
    fn test_summary_drops_expired_groups() {
        let req = UpdateRequest::summary("rtt", "round trips", 0.0, 60, vec![0.5])
            .with_labels(["peer"], ["a"]);
        let mut record = MetricRecord::new(MetricMeta::from_request(&req));
        let old = SampleKey::value(labels(&["a"]));
        let fresh = SampleKey::value(labels(&["b"]));
        record.append(old.clone(), Observation { timestamp: 0, value: 9.0 }).unwrap();
        record.append(fresh.clone(), Observation { timestamp: 50, value: 1.0 }).unwrap();
        record.append(fresh.clone(), Observation { timestamp: 100, value: 3.0 }).unwrap();

        let pass = aggregate_summary(&mut record, 100).unwrap();
        assert!(pass.pruned);
        assert!(!record.samples.contains_key(&old));
        assert_eq!(pass.family.samples.len(), 3);
        assert_eq!(pass.family.samples[0].label_values, vec!["b", "0.5"]);
        assert_close(pass.family.samples[0].value, 2.0);
        assert_eq!(pass.family.samples[1].value, 2.0);
        assert_eq!(pass.family.samples[2].value, 4.0);
    }

    #[test]
    fn test_summary_keeps_observation_at_window_edge() {
        let req = UpdateRequest::summary("rtt", "", 0.0, 60, vec![0.5]);
        let mut record = MetricRecord::new(MetricMeta::from_request(&req));
        record
            .append(SampleKey::value(labels(&[])), Observation { timestamp: 40, value: 1.0 })
            .unwrap();

        let pass = aggregate_summary(&mut record, 100).unwrap();
        assert!(!pass.pruned);
        assert!(!record.is_empty());

        let pass = aggregate_summary(&mut record, 101).unwrap();
        assert!(pass.pruned);
        assert!(record.is_empty());
        assert!(pass.family.samples.is_empty());
    }
}
