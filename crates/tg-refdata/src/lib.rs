//! TrackerGraph Reference Data Loader
//!
//! This crate reads the TLD risk table and blocklists from data files and
//! builds the [`ReferenceTables`](tg_core::classify::ReferenceTables) used by the classifier.
//! Blocklists may be JSON arrays, hosts files or `||host^` filter lists.

pub mod loader;
pub mod optimizer;
pub mod parser;
pub mod tld;

pub use loader::{build_tables, load_from_config, load_reference_tables, LoadReport, RefDataError};
pub use optimizer::{dedupe_entries, DedupeStats};
pub use parser::{parse_blocklist, BlocklistEntry, BlocklistFormat};
pub use tld::parse_tld_risk;
