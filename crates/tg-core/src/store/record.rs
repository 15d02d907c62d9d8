//! Hostname records and the snapshot read model

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// One observed hostname. A host seen both as a page and as an embedded
/// resource is a single record with both facets set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRecord {
    pub hostname: String,
    /// Ever observed as the page's own origin
    pub is_first_party: bool,
    /// Participates in at least one observed relationship
    pub is_visible: bool,
    /// First write wins, never overwritten
    pub first_request_time: Option<Timestamp>,
    /// Last write wins, by processing order
    pub last_request_time: Timestamp,
    pub favicon_url: Option<String>,
    /// First-party hosts this record was loaded by
    pub observed_parents: BTreeSet<String>,
}

impl HostRecord {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            is_first_party: false,
            is_visible: false,
            first_request_time: None,
            last_request_time: 0,
            favicon_url: None,
            observed_parents: BTreeSet::new(),
        }
    }

    /// Refresh request times for an observation at `at`.
    pub fn touch(&mut self, at: Timestamp) {
        self.first_request_time.get_or_insert(at);
        self.last_request_time = at;
    }

    /// Add a first-party parent. Returns false if it was already present
    /// or names the record itself.
    pub fn add_parent(&mut self, parent: &str) -> bool {
        if parent.is_empty() || parent.eq_ignore_ascii_case(&self.hostname) {
            return false;
        }
        self.observed_parents.insert(parent.to_string())
    }

    /// Included in any read.
    pub fn is_listed(&self) -> bool {
        self.is_visible || self.is_first_party
    }
}

/// Read-model entry for one hostname, in the export layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub favicon: String,
    #[serde(rename = "thirdParties")]
    pub observed_parents: Vec<String>,
    #[serde(rename = "firstParty")]
    pub is_first_party: bool,
}

impl From<&HostRecord> for SnapshotEntry {
    fn from(record: &HostRecord) -> Self {
        Self {
            favicon: record.favicon_url.clone().unwrap_or_default(),
            observed_parents: record.observed_parents.iter().cloned().collect(),
            is_first_party: record.is_first_party,
        }
    }
}

/// Hostname -> entry, for every listed record.
pub type Snapshot = BTreeMap<String, SnapshotEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_first_write_wins() {
        let mut record = HostRecord::new("a.com");
        record.touch(100);
        record.touch(300);
        record.touch(200);
        assert_eq!(record.first_request_time, Some(100));
        assert_eq!(record.last_request_time, 200);
    }

    #[test]
    fn test_add_parent_is_idempotent() {
        let mut record = HostRecord::new("cdn.example");
        assert!(record.add_parent("news.com"));
        assert!(!record.add_parent("news.com"));
        assert!(!record.add_parent("CDN.example"));
        assert!(!record.add_parent(""));
        assert_eq!(record.observed_parents.len(), 1);
    }

    #[test]
    fn test_snapshot_entry_export_layout() {
        let mut record = HostRecord::new("cdn.example");
        record.add_parent("news.com");
        let json = serde_json::to_value(SnapshotEntry::from(&record)).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"favicon": "", "thirdParties": ["news.com"], "firstParty": false})
        );
    }
}
