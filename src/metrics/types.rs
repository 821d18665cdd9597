//! Request and snapshot types exchanged with the client library.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four Prometheus metric kinds, each stored in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Monotonic total
    Counter,
    /// Point-in-time value
    Gauge,
    /// Cumulative bucket distribution
    Histogram,
    /// Sliding-window quantiles
    Summary,
}

impl MetricType {
    /// Collection order.
    pub const ALL: [MetricType; 4] = [
        MetricType::Counter,
        MetricType::Gauge,
        MetricType::Histogram,
        MetricType::Summary,
    ];

    /// Lowercase name, as used in keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            MetricType::Counter => 0,
            MetricType::Gauge => 1,
            MetricType::Histogram => 2,
            MetricType::Summary => 3,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the request value is applied to a scalar series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    /// Add the value to the series
    Add,
    /// Replace the series value
    Set,
}

/// One update produced by the client-side metric APIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Table the update is routed to
    pub metric_type: MetricType,
    /// Metric name
    pub name: String,
    /// Help text, kept from the first request
    pub help: String,
    /// Label names, kept from the first request
    pub label_names: Vec<String>,
    /// Values matching `label_names` one to one
    pub label_values: Vec<String>,
    /// Delta, new value or observation
    pub value: f64,
    /// Scalar command; histograms and summaries always observe
    pub command: Command,
    /// Ascending histogram bucket boundaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<f64>>,
    /// Summary quantiles, each in (0, 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantiles: Option<Vec<f64>>,
    /// Summary window length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<u64>,
}

impl UpdateRequest {
    fn new(metric_type: MetricType, name: &str, help: &str, value: f64, command: Command) -> Self {
        Self {
            metric_type,
            name: name.to_string(),
            help: help.to_string(),
            label_names: Vec::new(),
            label_values: Vec::new(),
            value,
            command,
            buckets: None,
            quantiles: None,
            max_age_seconds: None,
        }
    }

    /// Counter update.
    pub fn counter(name: &str, help: &str, value: f64, command: Command) -> Self {
        Self::new(MetricType::Counter, name, help, value, command)
    }

    /// Gauge update.
    pub fn gauge(name: &str, help: &str, value: f64, command: Command) -> Self {
        Self::new(MetricType::Gauge, name, help, value, command)
    }

    /// Histogram observation with its configured bucket boundaries.
    pub fn histogram(name: &str, help: &str, value: f64, buckets: Vec<f64>) -> Self {
        let mut req = Self::new(MetricType::Histogram, name, help, value, Command::Add);
        req.buckets = Some(buckets);
        req
    }

    /// Summary observation with its window and quantiles.
    pub fn summary(
        name: &str,
        help: &str,
        value: f64,
        max_age_seconds: u64,
        quantiles: Vec<f64>,
    ) -> Self {
        let mut req = Self::new(MetricType::Summary, name, help, value, Command::Add);
        req.max_age_seconds = Some(max_age_seconds);
        req.quantiles = Some(quantiles);
        req
    }

    /// Attach label names and the matching values.
    pub fn with_labels<N, V>(mut self, names: N, values: V) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        self.label_names = names.into_iter().map(Into::into).collect();
        self.label_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// One exposition-ready sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Sample name, with any `_bucket`/`_count`/`_sum` suffix
    pub name: String,
    /// Extra label names added by aggregation (`le`, `quantile`)
    pub label_names: Vec<String>,
    /// Family label values followed by the extra ones
    pub label_values: Vec<String>,
    /// Sample value
    pub value: f64,
}

/// All samples of one metric name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFamily {
    /// Metric name
    pub name: String,
    /// Help text
    pub help: String,
    /// Metric kind
    pub metric_type: MetricType,
    /// Label names shared by every sample
    pub label_names: Vec<String>,
    /// Samples in exposition order
    pub samples: Vec<Sample>,
}
