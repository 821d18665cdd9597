//! Storage adapter: the facade workers update through and collectors read from.
//!
//! Every update runs its full read-modify-write under the exclusive lock of
//! its metric type. Locks are never nested, so lock ordering cannot deadlock.
//!
//! Counter, gauge and histogram collection reads the tables without locking.
//! Cells are replaced whole, so a collector sees each record either before or
//! after a concurrent update. Summary collection writes pruned records back
//! and therefore runs under the summary lock, so it cannot drop an append
//! that raced with it.

use crate::core::{CapacityLimit, Clock, MetricsError, Result, StorageConfig, SystemClock};
use crate::metrics::aggregator::{aggregate_histogram, aggregate_scalars, aggregate_summary};
use crate::metrics::keys::{number_token, EncodedLabels, MetaKey, SampleKey, INF_BUCKET};
use crate::metrics::record::{MetricMeta, MetricRecord, Observation};
use crate::metrics::table::{InMemoryTable, Lookup, SharedTable, TableSlot};
use crate::metrics::types::{Command, MetricFamily, MetricType, UpdateRequest};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;

struct TypeStore<T> {
    lock: Mutex<()>,
    table: ArcSwap<T>,
}

/// Four shared tables, one per metric type, each with its own lock.
pub struct StorageAdapter<T: SharedTable = InMemoryTable> {
    config: StorageConfig,
    stores: [TypeStore<T>; 4],
    clock: Arc<dyn Clock>,
}

impl StorageAdapter<InMemoryTable> {
    /// In-process adapter on the wall clock.
    pub fn new(config: StorageConfig) -> Result<Self> {
        Self::open(config, Arc::new(SystemClock))
    }

    /// In-process adapter on a caller-supplied clock.
    pub fn with_clock(config: StorageConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::open(config, clock)
    }
}

impl<T: SharedTable> StorageAdapter<T> {
    /// Open all four tables with any [`SharedTable`] backing.
    pub fn open(config: StorageConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let open = |metric_type| -> Result<TypeStore<T>> {
            Ok(TypeStore {
                lock: Mutex::new(()),
                table: ArcSwap::from_pointee(T::open(metric_type, &config)?),
            })
        };
        let stores = [
            open(MetricType::Counter)?,
            open(MetricType::Gauge)?,
            open(MetricType::Histogram)?,
            open(MetricType::Summary)?,
        ];

        tracing::debug!(
            "Opened metric tables: {} slots of {} bytes per type",
            config.table_size,
            config.value_size
        );

        Ok(Self {
            config,
            stores,
            clock,
        })
    }

    /// Sizing the tables were opened with.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Current table for one metric type.
    pub fn table(&self, metric_type: MetricType) -> Arc<T> {
        self.store(metric_type).table.load_full()
    }

    fn store(&self, metric_type: MetricType) -> &TypeStore<T> {
        &self.stores[metric_type.index()]
    }

    /// Dispatch on the request's metric type.
    pub fn update(&self, req: &UpdateRequest) -> Result<()> {
        match req.metric_type {
            MetricType::Counter => self.update_counter(req),
            MetricType::Gauge => self.update_gauge(req),
            MetricType::Histogram => self.update_histogram(req),
            MetricType::Summary => self.update_summary(req),
        }
    }

    /// ADD increments the series. SET puts it back to 0, whatever the request value.
    pub fn update_counter(&self, req: &UpdateRequest) -> Result<()> {
        validate(req, MetricType::Counter)?;
        self.modify(req, |record, labels| match req.command {
            Command::Add => record.add(SampleKey::value(labels), req.value),
            Command::Set => {
                record.set(SampleKey::value(labels), 0.0);
                Ok(())
            },
        })
    }

    /// ADD adds to the series, SET replaces it.
    pub fn update_gauge(&self, req: &UpdateRequest) -> Result<()> {
        validate(req, MetricType::Gauge)?;
        self.modify(req, |record, labels| match req.command {
            Command::Add => record.add(SampleKey::value(labels), req.value),
            Command::Set => {
                record.set(SampleKey::value(labels), req.value);
                Ok(())
            },
        })
    }

    /// Counts the observation in the first bucket whose boundary is not below
    /// it, or in `+Inf`, and adds it to the group's running sum.
    ///
    /// Boundaries come from the stored record, so a request carrying
    /// different buckets still lands in a bucket that collection reports.
    pub fn update_histogram(&self, req: &UpdateRequest) -> Result<()> {
        validate(req, MetricType::Histogram)?;
        self.modify(req, |record, labels| {
            let token = record
                .meta
                .buckets
                .iter()
                .flatten()
                .find(|&&boundary| req.value <= boundary)
                .map_or_else(|| INF_BUCKET.to_string(), |b| number_token(*b));

            record.add(SampleKey::bucket(labels.clone(), token), 1.0)?;
            record.add(SampleKey::sum(labels), req.value)
        })
    }

    /// Appends a timestamped observation to the series window.
    pub fn update_summary(&self, req: &UpdateRequest) -> Result<()> {
        validate(req, MetricType::Summary)?;
        let observation = Observation {
            timestamp: self.clock.now(),
            value: req.value,
        };
        self.modify(req, |record, labels| record.append(SampleKey::value(labels), observation))
    }

    fn modify<F>(&self, req: &UpdateRequest, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut MetricRecord, EncodedLabels) -> Result<()>,
    {
        let labels = EncodedLabels::encode(&req.label_values)?;
        let key = MetaKey::new(req.metric_type, &req.name);
        let store = self.store(req.metric_type);

        let _guard = store.lock.lock();
        let table = store.table.load();

        let mut record = match table.get(&key) {
            Lookup::Found(bytes) => MetricRecord::from_bytes(&bytes)?,
            Lookup::NotFound => {
                tracing::debug!("Creating record {}", key);
                MetricRecord::new(MetricMeta::from_request(req))
            },
            Lookup::CapacityExceeded => {
                tracing::warn!("Rejecting update to saturated record {}", key);
                return Err(MetricsError::CapacityExceeded {
                    key: key.to_string(),
                    limit: CapacityLimit::Saturated {
                        max: self.config.value_size,
                    },
                });
            },
        };

        mutate(&mut record, labels)?;

        table.set(&key, record.to_bytes()?).map_err(|e| {
            tracing::warn!("Failed to store {}: {}", key, e);
            e
        })?;
        tracing::trace!("Updated {}", key);
        Ok(())
    }

    /// Snapshot of every metric: counters, gauges, histograms, then summaries.
    ///
    /// Records that cannot be read back are logged and skipped; label
    /// decoding failures abort the snapshot.
    pub fn collect(&self) -> Result<Vec<MetricFamily>> {
        let mut families = self.collect_unlocked(MetricType::Counter)?;
        families.extend(self.collect_unlocked(MetricType::Gauge)?);
        families.extend(self.collect_unlocked(MetricType::Histogram)?);
        families.extend(self.collect_summaries()?);
        Ok(families)
    }

    fn collect_unlocked(&self, metric_type: MetricType) -> Result<Vec<MetricFamily>> {
        let table = self.store(metric_type).table.load_full();
        let mut families = Vec::with_capacity(table.len());

        for slot in table.iter() {
            let Some(record) = isolate(&slot, MetricRecord::from_bytes(&slot.bytes))? else {
                continue;
            };
            let aggregated = match metric_type {
                MetricType::Histogram => aggregate_histogram(&record),
                _ => aggregate_scalars(&record),
            };
            if let Some(family) = isolate(&slot, aggregated)? {
                families.push(family);
            }
        }

        families.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(families)
    }

    fn collect_summaries(&self) -> Result<Vec<MetricFamily>> {
        let store = self.store(MetricType::Summary);
        let _guard = store.lock.lock();
        let table = store.table.load();
        let now = self.clock.now();
        let mut families = Vec::with_capacity(table.len());

        for slot in table.iter() {
            let Some(mut record) = isolate(&slot, MetricRecord::from_bytes(&slot.bytes))? else {
                continue;
            };
            let Some(pass) = isolate(&slot, aggregate_summary(&mut record, now))? else {
                continue;
            };
            let key = MetaKey::new(MetricType::Summary, &record.meta.name);

            if record.is_empty() {
                table.delete(&key);
                tracing::debug!("Removed expired summary {}", key);
                continue;
            }

            if pass.pruned {
                let stored = record.to_bytes().and_then(|bytes| table.set(&key, bytes));
                if let Err(e) = stored {
                    tracing::warn!("Failed to write back pruned summary {}: {}", key, e);
                }
            }
            families.push(pass.family);
        }

        families.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(families)
    }

    /// Remove one metric. Absent metrics are a no-op.
    pub fn delete_metric(&self, metric_type: MetricType, name: &str) -> Result<()> {
        let key = MetaKey::new(metric_type, name);
        let store = self.store(metric_type);

        let _guard = store.lock.lock();
        if store.table.load().delete(&key) {
            tracing::debug!("Deleted record {}", key);
        }
        Ok(())
    }

    /// Replace all four tables with empty ones.
    pub fn wipe_storage(&self) -> Result<()> {
        for metric_type in MetricType::ALL {
            let store = self.store(metric_type);
            let _guard = store.lock.lock();
            store.table.store(Arc::new(T::open(metric_type, &self.config)?));
        }
        tracing::info!("Wiped all metric tables");
        Ok(())
    }
}

/// Keep per-record failures from aborting a collection pass.
fn isolate<R>(slot: &TableSlot, result: Result<R>) -> Result<Option<R>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ MetricsError::Decoding(_)) => Err(e),
        Err(e) => {
            tracing::warn!("Skipping record {}: {}", slot.original_key, e);
            Ok(None)
        },
    }
}

fn validate(req: &UpdateRequest, expected: MetricType) -> Result<()> {
    if req.metric_type != expected {
        return Err(MetricsError::invalid_request(format!(
            "{} update sent for {} {:?}",
            expected, req.metric_type, req.name
        )));
    }

    if req.name.is_empty() {
        return Err(MetricsError::invalid_request("metric name must not be empty"));
    }

    if req.label_names.len() != req.label_values.len() {
        return Err(MetricsError::invalid_request(format!(
            "{:?} has {} label names but {} values",
            req.name,
            req.label_names.len(),
            req.label_values.len()
        )));
    }

    if !req.value.is_finite() {
        return Err(MetricsError::invalid_request(format!(
            "{:?} value must be finite, got {}",
            req.name, req.value
        )));
    }

    match expected {
        MetricType::Histogram => {
            let buckets = req.buckets.as_deref().unwrap_or_default();
            if buckets.is_empty() {
                return Err(MetricsError::invalid_request(format!(
                    "histogram {:?} needs at least one bucket",
                    req.name
                )));
            }
            let ascending = buckets.iter().all(|b| b.is_finite())
                && buckets.windows(2).all(|pair| pair[0] < pair[1]);
            if !ascending {
                return Err(MetricsError::invalid_request(format!(
                    "histogram {:?} buckets must be finite and strictly ascending: {:?}",
                    req.name, buckets
                )));
            }
        },
        MetricType::Summary => {
            let quantiles = req.quantiles.as_deref().unwrap_or_default();
            if quantiles.is_empty() || quantiles.iter().any(|q| !(*q > 0.0 && *q < 1.0)) {
                return Err(MetricsError::invalid_request(format!(
                    "summary {:?} quantiles must lie in (0, 1): {:?}",
                    req.name, quantiles
                )));
            }
            if req.max_age_seconds.unwrap_or(0) == 0 {
                return Err(MetricsError::invalid_request(format!(
                    "summary {:?} needs a positive max age",
                    req.name
                )));
            }
        },
        MetricType::Counter | MetricType::Gauge => {},
    }

    Ok(())
}
