//! Storage backends
//!
//! The aggregation store only needs get/put by hostname, clear-all and a
//! full scan. Every backend is safe to read while another thread writes;
//! a single get or put is atomic.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{HostRecord, StoreError};

/// Persistence contract of the aggregation store.
pub trait RecordBackend: Send + Sync {
    fn get(&self, hostname: &str) -> Result<Option<HostRecord>, StoreError>;

    /// Insert or replace the record keyed by its hostname.
    fn put(&self, record: &HostRecord) -> Result<(), StoreError>;

    /// Remove every record in one step.
    fn clear(&self) -> Result<(), StoreError>;

    fn all(&self) -> Result<Vec<HostRecord>, StoreError>;

    fn get_flag(&self, key: &str) -> Result<Option<bool>, StoreError>;

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError>;
}

/// Volatile backend for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, HostRecord>>,
    flags: RwLock<HashMap<String, bool>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordBackend for MemoryBackend {
    fn get(&self, hostname: &str) -> Result<Option<HostRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(hostname).cloned())
    }

    fn put(&self, record: &HostRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.hostname.clone(), record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn all(&self) -> Result<Vec<HostRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.values().cloned().collect())
    }

    fn get_flag(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let flags = self.flags.read().unwrap_or_else(PoisonError::into_inner);
        Ok(flags.get(key).copied())
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.flags
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}
