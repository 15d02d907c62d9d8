//! Tracker service
//!
//! Owns the aggregation store and the event queue whose consumer runs the
//! ingestion pipeline. Producers call [`Tracker::enqueue`]; read/export
//! collaborators use [`Tracker::snapshot`], [`Tracker::reset`] and change
//! subscriptions.

use std::sync::Arc;

use crate::classify::{Classifier, ReferenceTables};
use crate::config::TrackerConfig;
use crate::pipeline::{AlertSink, Pipeline};
use crate::queue::{EventQueue, QueueStats};
use crate::store::{Snapshot, Store, StoreError, Subscription, SubscriptionId};
use crate::types::{CaptureEvent, ContextId};

/// Error type for starting a tracker.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to start event queue: {0}")]
    Spawn(#[source] std::io::Error),
}

pub struct Tracker {
    store: Arc<Store>,
    queue: EventQueue,
}

impl Tracker {
    /// Open the configured database and start processing.
    pub fn open(
        config: &TrackerConfig,
        tables: ReferenceTables,
        alerts: Box<dyn AlertSink>,
    ) -> Result<Self, TrackerError> {
        let store = Arc::new(Store::open(&config.database_path)?);
        Self::with_store(store, config, config.classifier(tables), alerts)
    }

    /// Start processing against an existing store.
    pub fn with_store(
        store: Arc<Store>,
        config: &TrackerConfig,
        classifier: Classifier,
        alerts: Box<dyn AlertSink>,
    ) -> Result<Self, TrackerError> {
        let pipeline = Pipeline::new(Arc::clone(&store), classifier, alerts)
            .with_excluded_schemes(&config.excluded_schemes);
        let queue = EventQueue::spawn(pipeline).map_err(TrackerError::Spawn)?;

        Ok(Self { store, queue })
    }

    // =========================================================================
    // Producers
    // =========================================================================

    pub fn enqueue(&self, event: CaptureEvent) -> bool {
        self.queue.enqueue(event)
    }

    pub fn close_context(&self, context: ContextId) -> bool {
        self.queue.close_context(context)
    }

    /// Wait for everything enqueued so far to be handled.
    pub fn flush(&self) {
        self.queue.flush();
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    // =========================================================================
    // Query/Command Surface
    // =========================================================================

    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        self.store.snapshot()
    }

    pub fn reset(&self) -> Result<(), StoreError> {
        self.store.reset()
    }

    pub fn subscribe(&self) -> Subscription {
        self.store.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// True only on the first start against this database.
    pub fn take_first_run(&self) -> Result<bool, StoreError> {
        self.store.take_first_run()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Drain the queue and stop the consumer thread.
    pub fn close(self) -> QueueStats {
        self.queue.close();
        self.queue.stats()
    }
}
