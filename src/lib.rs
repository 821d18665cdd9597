//! promtable - shared-table storage backend for Prometheus-style metrics.
//!
//! promtable holds counters, gauges, histograms and summaries in four
//! fixed-capacity tables so that many concurrent workers can update the same
//! named metric while a collector reads exposition-ready samples.
//!
//! # Features
//!
//! - **Per-type locking**: every update is one read-modify-write under the
//!   lock of its metric type, so concurrent writers never lose updates
//! - **Cumulative histograms**: unobserved buckets carry the running total
//! - **Sliding-window summaries**: expired observations are pruned at
//!   collection time and empty series disappear
//! - **Bounded memory**: slot count and per-record cell size are fixed at
//!   construction; overflow is a distinct, observable error
//!
//! # Architecture
//!
//! - `metrics`: keys, records, tables, aggregation and the storage adapter
//! - `core`: configuration, errors and clocks
//! - `cli`: the `promtable` command-line tool
//!
//! # Example
//!
//! ```
//! use promtable::core::StorageConfig;
//! use promtable::metrics::{Command, StorageAdapter, UpdateRequest};
//!
//! # fn main() -> promtable::Result<()> {
//! let storage = StorageAdapter::new(StorageConfig::default())?;
//! let req = UpdateRequest::counter("http_requests_total", "Requests served", 1.0, Command::Add)
//!     .with_labels(["method"], ["GET"]);
//! storage.update(&req)?;
//!
//! let snapshot = storage.collect()?;
//! assert_eq!(snapshot[0].samples[0].value, 1.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod metrics;

// Re-export core types for convenience
pub use crate::core::{Config, MetricsError, Result};
pub use crate::metrics::StorageAdapter;
