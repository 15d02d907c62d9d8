//! Aggregation store
//!
//! Persisted "site -> trackers" graph, one [`HostRecord`] per hostname.
//! Mutations are read-modify-write and are expected to come from a single
//! writer (the event queue consumer); reads may interleave freely.
//!
//! Consistency is per record: `record_third_party` writes the first-party
//! record, then the tracker record, and a concurrent reader can observe
//! the first write without the second. A change notification is emitted
//! only once every write of an operation has committed.

mod backend;
mod migrations;
mod notify;
mod record;
mod sqlite;

use std::path::Path;

pub use backend::{MemoryBackend, RecordBackend};
pub use notify::{ChangeNotifier, StoreChanged, Subscription, SubscriptionId};
pub use record::{HostRecord, Snapshot, SnapshotEntry};
pub use sqlite::SqliteBackend;

use crate::types::Timestamp;

/// Flag set once the first run has been reported.
const FIRST_RUN_DONE: &str = "first_run_done";

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt record for '{hostname}': {reason}")]
    CorruptRecord { hostname: String, reason: String },
    #[error("Unsupported schema version {found} (supported: {supported})")]
    UnsupportedSchema { found: i32, supported: i32 },
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// The aggregation store.
pub struct Store {
    backend: Box<dyn RecordBackend>,
    notifier: ChangeNotifier,
}

impl Store {
    pub fn new<B: RecordBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Box::new(backend),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Open a SQLite-backed store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let backend = SqliteBackend::open(path)?;
        log::info!("store opened at {}", path.display());
        Ok(Self::new(backend))
    }

    /// Volatile store.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    // =========================================================================
    // Change Notifications
    // =========================================================================

    pub fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Record a completed page load of `hostname`.
    ///
    /// An empty `favicon` never replaces a stored one. No-op for an empty
    /// hostname.
    pub fn record_first_party(
        &self,
        hostname: &str,
        observed_at: Timestamp,
        favicon: Option<&str>,
    ) -> Result<(), StoreError> {
        if hostname.is_empty() {
            return Ok(());
        }

        let mut record = self.fetch_or_create(hostname)?;
        record.is_first_party = true;
        record.is_visible = true;
        record.touch(observed_at);
        if let Some(favicon) = favicon.filter(|f| !f.is_empty()) {
            record.favicon_url = Some(favicon.to_string());
        }

        self.backend.put(&record)?;
        log::debug!("recorded first party {hostname}");
        self.notifier.emit();
        Ok(())
    }

    /// Record that `tracker` was loaded by a page on `first_party`.
    ///
    /// No-op when either host is empty or both are the same host.
    pub fn record_third_party(
        &self,
        first_party: &str,
        tracker: &str,
        observed_at: Timestamp,
    ) -> Result<(), StoreError> {
        if first_party.is_empty() || tracker.is_empty() || first_party.eq_ignore_ascii_case(tracker) {
            return Ok(());
        }

        let mut parent = self.fetch_or_create(first_party)?;
        let mut child = self.fetch_or_create(tracker)?;

        child.add_parent(first_party);
        child.is_visible = true;
        child.touch(observed_at);

        parent.is_visible = true;
        parent.touch(observed_at);

        self.backend.put(&parent)?;
        self.backend.put(&child)?;
        log::debug!("recorded {tracker} on {first_party}");
        self.notifier.emit();
        Ok(())
    }

    /// Remove every record.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.backend.clear()?;
        log::info!("store reset");
        self.notifier.emit();
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get(&self, hostname: &str) -> Result<Option<HostRecord>, StoreError> {
        self.backend.get(hostname)
    }

    /// Records that are visible or first party.
    pub fn listed_records(&self) -> Result<Vec<HostRecord>, StoreError> {
        let mut records: Vec<HostRecord> = self
            .backend
            .all()?
            .into_iter()
            .filter(HostRecord::is_listed)
            .collect();
        records.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(records)
    }

    /// Read model of every listed record.
    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self
            .listed_records()?
            .iter()
            .map(|record| (record.hostname.clone(), SnapshotEntry::from(record)))
            .collect())
    }

    /// True the first time it is called against a database, false after.
    pub fn take_first_run(&self) -> Result<bool, StoreError> {
        let done = self.backend.get_flag(FIRST_RUN_DONE)?.unwrap_or(false);
        if !done {
            self.backend.set_flag(FIRST_RUN_DONE, true)?;
        }
        Ok(!done)
    }

    fn fetch_or_create(&self, hostname: &str) -> Result<HostRecord, StoreError> {
        Ok(self
            .backend
            .get(hostname)?
            .unwrap_or_else(|| HostRecord::new(hostname)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend whose writes always fail.
    struct ReadOnlyBackend(MemoryBackend);

    impl RecordBackend for ReadOnlyBackend {
        fn get(&self, hostname: &str) -> Result<Option<HostRecord>, StoreError> {
            self.0.get(hostname)
        }
        fn put(&self, _record: &HostRecord) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".into()))
        }
        fn clear(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".into()))
        }
        fn all(&self) -> Result<Vec<HostRecord>, StoreError> {
            self.0.all()
        }
        fn get_flag(&self, key: &str) -> Result<Option<bool>, StoreError> {
            self.0.get_flag(key)
        }
        fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError> {
            self.0.set_flag(key, value)
        }
    }

    fn stores() -> Vec<Store> {
        vec![
            Store::in_memory(),
            Store::new(SqliteBackend::open_in_memory().expect("sqlite")),
        ]
    }

    #[test]
    fn test_repeated_third_party_adds_parent_once() {
        for store in stores() {
            for ts in 0..5 {
                store.record_third_party("news.com", "cdn.example", 100 + ts).expect("record");
            }
            let tracker = store.get("cdn.example").expect("get").expect("present");
            assert_eq!(tracker.observed_parents.len(), 1);
            assert!(tracker.observed_parents.contains("news.com"));
        }
    }

    #[test]
    fn test_first_request_time_is_first_write() {
        for store in stores() {
            store.record_third_party("news.com", "cdn.example", 500).expect("record");
            store.record_third_party("blog.org", "cdn.example", 100).expect("record");
            store.record_first_party("cdn.example", 900, None).expect("record");

            let tracker = store.get("cdn.example").expect("get").expect("present");
            assert_eq!(tracker.first_request_time, Some(500));
            assert_eq!(tracker.last_request_time, 900);
        }
    }

    #[test]
    fn test_out_of_order_last_write_wins() {
        let store = Store::in_memory();
        store.record_third_party("news.com", "cdn.example", 500).expect("record");
        store.record_third_party("news.com", "cdn.example", 200).expect("record");
        let tracker = store.get("cdn.example").expect("get").expect("present");
        assert_eq!(tracker.last_request_time, 200);
    }

    #[test]
    fn test_empty_favicon_keeps_previous() {
        for store in stores() {
            store.record_first_party("a.com", 1, Some("fav1")).expect("record");
            store.record_first_party("a.com", 2, Some("")).expect("record");
            store.record_first_party("a.com", 3, None).expect("record");

            let record = store.get("a.com").expect("get").expect("present");
            assert_eq!(record.last_request_time, 3);
            assert_eq!(record.first_request_time, Some(1));
            assert_eq!(record.favicon_url.as_deref(), Some("fav1"));
        }
    }

    #[test]
    fn test_third_party_noops() {
        let store = Store::in_memory();
        let sub = store.subscribe();
        store.record_third_party("", "cdn.example", 1).expect("record");
        store.record_third_party("news.com", "", 1).expect("record");
        store.record_third_party("news.com", "NEWS.com", 1).expect("record");
        store.record_first_party("", 1, None).expect("record");
        assert!(store.snapshot().expect("snapshot").is_empty());
        assert_eq!(sub.drain(), 0);
    }

    #[test]
    fn test_merged_record_facets() {
        let store = Store::in_memory();
        store.record_first_party("cdn.example", 1, Some("fav")).expect("record");
        store.record_third_party("news.com", "cdn.example", 2).expect("record");

        let record = store.get("cdn.example").expect("get").expect("present");
        assert!(record.is_first_party);
        assert!(record.observed_parents.contains("news.com"));

        let parent = store.get("news.com").expect("get").expect("present");
        assert!(parent.is_visible);
        assert!(!parent.is_first_party);
        assert!(parent.observed_parents.is_empty());
    }

    #[test]
    fn test_one_notification_per_mutation() {
        let store = Store::in_memory();
        let sub = store.subscribe();
        store.record_third_party("news.com", "cdn.example", 1).expect("record");
        assert_eq!(sub.drain(), 1);
        store.record_first_party("news.com", 2, None).expect("record");
        assert_eq!(sub.drain(), 1);
        store.reset().expect("reset");
        assert_eq!(sub.drain(), 1);
    }

    #[test]
    fn test_snapshot_filters_unlisted() {
        let backend = MemoryBackend::new();
        backend.put(&HostRecord::new("ghost.example")).expect("put");
        let store = Store::new(backend);
        store.record_third_party("news.com", "cdn.example", 1).expect("record");

        let snapshot = store.snapshot().expect("snapshot");
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.contains_key("ghost.example"));
        assert_eq!(snapshot["cdn.example"].observed_parents, vec!["news.com".to_string()]);
        assert!(snapshot["news.com"].observed_parents.is_empty());
    }

    #[test]
    fn test_reset_then_reuse() {
        for store in stores() {
            store.record_third_party("news.com", "cdn.example", 1).expect("record");
            store.reset().expect("reset");
            assert!(store.snapshot().expect("snapshot").is_empty());
            store.record_first_party("a.com", 2, None).expect("record");
            assert!(store.snapshot().expect("snapshot").contains_key("a.com"));
        }
    }

    #[test]
    fn test_failed_write_skips_notification() {
        let store = Store::new(ReadOnlyBackend(MemoryBackend::new()));
        let sub = store.subscribe();
        assert!(store.record_first_party("a.com", 1, None).is_err());
        assert!(store.record_third_party("a.com", "b.com", 1).is_err());
        assert!(store.reset().is_err());
        assert_eq!(sub.drain(), 0);
    }

    #[test]
    fn test_take_first_run() {
        let store = Store::new(SqliteBackend::open_in_memory().expect("sqlite"));
        assert!(store.take_first_run().expect("first"));
        assert!(!store.take_first_run().expect("second"));
        store.reset().expect("reset");
        assert!(!store.take_first_run().expect("after reset"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("tg-core-store-{}", std::process::id()));
        let path = dir.join("tracker.db");
        let _ = std::fs::remove_file(&path);

        {
            let store = Store::open(&path).expect("open");
            assert!(store.take_first_run().expect("first run"));
            store.record_first_party("news.com", 10, Some("fav")).expect("record");
            store.record_third_party("news.com", "cdn.example", 20).expect("record");
        }

        let store = Store::open(&path).expect("reopen");
        assert!(!store.take_first_run().expect("second run"));
        let snapshot = store.snapshot().expect("snapshot");
        assert_eq!(snapshot["news.com"].favicon, "fav");
        assert!(snapshot["news.com"].is_first_party);
        assert_eq!(snapshot["cdn.example"].observed_parents, vec!["news.com".to_string()]);
        let tracker = store.get("cdn.example").expect("get").expect("present");
        assert_eq!(tracker.first_request_time, Some(20));

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
