//! Tracker Graph Core Library
//!
//! Captures third-party requests made while pages load and aggregates them
//! into a persistent "site -> trackers" graph.
//!
//! # Architecture
//!
//! Capture events from any number of producers go through a single serial
//! [`queue::EventQueue`]. Its consumer, the ingestion [`pipeline::Pipeline`],
//! classifies each third-party host, surfaces blocklisted or ad-like hosts
//! once per browsing context, and writes everything else into the
//! [`store::Store`]. Readers take [`store::Snapshot`]s and subscribe to
//! change signals.
//!
//! # Modules
//!
//! - `types`: Capture events and shared type definitions
//! - `url`: Scheme and hostname extraction
//! - `classify`: Root domain collapse, TLD risk, blocklist and ad heuristics
//! - `gate`: Per-context notification dedup
//! - `queue`: Serial event queue
//! - `store`: Aggregation store with SQLite and in-memory backends
//! - `pipeline`: Ingestion policy
//! - `tracker`: Service object wiring the above together
//! - `view`: Parent -> children tree built from a snapshot
//! - `config`: Tracker configuration

pub mod classify;
pub mod config;
pub mod gate;
pub mod pipeline;
pub mod queue;
pub mod store;
pub mod tracker;
pub mod types;
pub mod url;
pub mod view;

// Re-export commonly used types
pub use classify::{root_domain, Classification, Classifier, ReferenceTables};
pub use config::{ConfigError, TrackerConfig};
pub use gate::NotificationGate;
pub use pipeline::{AlertKind, AlertSink, IngestError, Ingested, LogAlerts, Pipeline, TrackerAlert};
pub use queue::{EventHandler, EventQueue, QueueStats};
pub use store::{HostRecord, Snapshot, Store, StoreChanged, StoreError, Subscription};
pub use tracker::{Tracker, TrackerError};
pub use types::{CaptureEvent, ContextId, LoadStatus, PageLoad, ResponseObserved, Timestamp, VerdictFlags};
pub use view::SiteTree;
