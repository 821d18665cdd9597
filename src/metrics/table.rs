//! Fixed-capacity shared table: the capability the adapter stores records in.
//!
//! One table exists per metric type. Cells are addressed by the hash of the
//! [`MetaKey`] and replaced whole, so a reader sees either the previous or
//! the next record and never a mix of both.

use crate::core::{CapacityLimit, MetricsError, Result, StorageConfig};
use crate::metrics::keys::MetaKey;
use crate::metrics::types::MetricType;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Outcome of reading one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Stored record bytes
    Found(Vec<u8>),
    /// Nothing stored under the key
    NotFound,
    /// The record outgrew its cell; the last bytes that fit are kept but the
    /// record accepts no further writes.
    CapacityExceeded,
}

/// One occupied slot as seen by iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSlot {
    /// Hash address of the slot
    pub address: u64,
    /// Readable key, possibly truncated
    pub original_key: String,
    /// Last stored record bytes
    pub bytes: Vec<u8>,
    /// An oversize write was refused
    pub saturated: bool,
}

/// Storage primitive behind [`StorageAdapter`](crate::metrics::StorageAdapter).
///
/// Implementations must make every single-cell operation atomic; multi-step
/// read-modify-write cycles are serialized by the adapter's per-type locks.
pub trait SharedTable: Send + Sync {
    /// Create an empty table for one metric type.
    fn open(metric_type: MetricType, config: &StorageConfig) -> Result<Self>
    where
        Self: Sized;

    /// Read one cell.
    fn get(&self, key: &MetaKey) -> Lookup;

    /// Store `bytes`, failing with [`MetricsError::CapacityExceeded`] when they
    /// do not fit a cell or no slot is free.
    fn set(&self, key: &MetaKey, bytes: Vec<u8>) -> Result<()>;

    /// Remove a cell. Returns false when nothing was stored.
    fn delete(&self, key: &MetaKey) -> bool;

    /// Snapshot of all occupied slots.
    fn iter(&self) -> Vec<TableSlot>;

    /// Maximum number of occupied slots.
    fn slot_count(&self) -> usize;

    /// Number of occupied slots.
    fn len(&self) -> usize;

    /// True when no slot is occupied.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct Slot {
    original_key: String,
    bytes: Vec<u8>,
    saturated: bool,
}

/// Single-process table backed by a concurrent map.
#[derive(Debug)]
pub struct InMemoryTable {
    metric_type: MetricType,
    slots: DashMap<u64, Slot>,
    slot_count: usize,
    value_size: usize,
    original_key_length: usize,
}

impl InMemoryTable {
    /// Empty table sized by `config`. Does not validate it; see [`SharedTable::open`].
    pub fn new(metric_type: MetricType, config: &StorageConfig) -> Self {
        Self {
            metric_type,
            slots: DashMap::with_capacity(config.table_size),
            slot_count: config.table_size,
            value_size: config.value_size,
            original_key_length: config.original_key_length,
        }
    }

    /// Metric type this table stores.
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Overwrite a cell without any size check. Lets tests plant foreign bytes.
    pub fn set_raw(&self, key: &MetaKey, bytes: Vec<u8>) {
        self.slots.insert(
            key.address(),
            Slot {
                original_key: key.original_key(self.original_key_length),
                bytes,
                saturated: false,
            },
        );
    }
}

impl SharedTable for InMemoryTable {
    fn open(metric_type: MetricType, config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(metric_type, config))
    }

    fn get(&self, key: &MetaKey) -> Lookup {
        match self.slots.get(&key.address()) {
            Some(slot) if slot.saturated => Lookup::CapacityExceeded,
            Some(slot) => Lookup::Found(slot.bytes.clone()),
            None => Lookup::NotFound,
        }
    }

    fn set(&self, key: &MetaKey, bytes: Vec<u8>) -> Result<()> {
        let over_size = bytes.len() > self.value_size;
        let limit = CapacityLimit::ValueSize {
            size: bytes.len(),
            max: self.value_size,
        };

        // DashMap::len read-locks every shard, so it must run before the entry guard is taken.
        let full = self.slots.len() >= self.slot_count;

        match self.slots.entry(key.address()) {
            Entry::Occupied(mut occupied) => {
                if over_size {
                    occupied.get_mut().saturated = true;
                    return Err(MetricsError::CapacityExceeded {
                        key: key.to_string(),
                        limit,
                    });
                }
                // A different original key here is a hash collision; it overwrites.
                let slot = occupied.get_mut();
                slot.original_key = key.original_key(self.original_key_length);
                slot.bytes = bytes;
                slot.saturated = false;
                Ok(())
            },
            Entry::Vacant(vacant) => {
                if over_size {
                    return Err(MetricsError::CapacityExceeded {
                        key: key.to_string(),
                        limit,
                    });
                }
                if full {
                    return Err(MetricsError::CapacityExceeded {
                        key: key.to_string(),
                        limit: CapacityLimit::SlotCount {
                            slots: self.slot_count,
                        },
                    });
                }
                vacant.insert(Slot {
                    original_key: key.original_key(self.original_key_length),
                    bytes,
                    saturated: false,
                });
                Ok(())
            },
        }
    }

    fn delete(&self, key: &MetaKey) -> bool {
        self.slots.remove(&key.address()).is_some()
    }

    fn iter(&self) -> Vec<TableSlot> {
        self.slots
            .iter()
            .map(|item| TableSlot {
                address: *item.key(),
                original_key: item.value().original_key.clone(),
                bytes: item.value().bytes.clone(),
                saturated: item.value().saturated,
            })
            .collect()
    }

    fn slot_count(&self) -> usize {
        self.slot_count
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(slots: usize, value_size: usize) -> InMemoryTable {
        let config = StorageConfig {
            table_size: slots,
            value_size,
            original_key_length: 256,
        };
        InMemoryTable::open(MetricType::Counter, &config).unwrap()
    }

    #[test]
    fn test_get_set_delete() {
        let table = table(4, 64);
        let key = MetaKey::new(MetricType::Counter, "requests");

        assert_eq!(table.get(&key), Lookup::NotFound);
        table.set(&key, b"abc".to_vec()).unwrap();
        assert_eq!(table.get(&key), Lookup::Found(b"abc".to_vec()));
        assert_eq!(table.len(), 1);

        assert!(table.delete(&key));
        assert!(!table.delete(&key));
        assert!(table.is_empty());
    }

    #[test]
    fn test_oversized_write_saturates_existing_slot() {
        let table = table(4, 8);
        let key = MetaKey::new(MetricType::Counter, "requests");
        table.set(&key, b"12345678".to_vec()).unwrap();

        let err = table.set(&key, b"123456789".to_vec()).unwrap_err();
        assert!(err.is_capacity_exceeded());
        assert_eq!(table.get(&key), Lookup::CapacityExceeded);

        let slots = table.iter();
        assert_eq!(slots.len(), 1);
        assert!(slots[0].saturated);
        assert_eq!(slots[0].bytes, b"12345678".to_vec());
    }

    #[test]
    fn test_oversized_first_write_stores_nothing() {
        let table = table(4, 2);
        let key = MetaKey::new(MetricType::Counter, "requests");

        assert!(table.set(&key, b"abc".to_vec()).unwrap_err().is_capacity_exceeded());
        assert_eq!(table.get(&key), Lookup::NotFound);
    }

    #[test]
    fn test_slot_exhaustion() {
        let table = table(2, 64);
        let a = MetaKey::new(MetricType::Counter, "a");
        let b = MetaKey::new(MetricType::Counter, "b");
        let c = MetaKey::new(MetricType::Counter, "c");

        table.set(&a, b"1".to_vec()).unwrap();
        table.set(&b, b"1".to_vec()).unwrap();
        let err = table.set(&c, b"1".to_vec()).unwrap_err();
        assert!(matches!(
            err,
            MetricsError::CapacityExceeded {
                limit: CapacityLimit::SlotCount { slots: 2 },
                ..
            }
        ));

        // existing keys stay writable when the table is full
        table.set(&a, b"2".to_vec()).unwrap();
        assert_eq!(table.get(&a), Lookup::Found(b"2".to_vec()));
    }

    #[test]
    fn test_iter_reports_original_keys() {
        let config = StorageConfig {
            table_size: 4,
            value_size: 64,
            original_key_length: 10,
        };
        let table = InMemoryTable::new(MetricType::Gauge, &config);
        let key = MetaKey::new(MetricType::Gauge, "temperature");
        table.set(&key, b"x".to_vec()).unwrap();

        let slots = table.iter();
        assert_eq!(slots[0].original_key, "gauge:temp");
        assert_eq!(slots[0].address, key.address());
        assert_eq!(table.slot_count(), 4);
        assert_eq!(table.metric_type(), MetricType::Gauge);
    }
}
