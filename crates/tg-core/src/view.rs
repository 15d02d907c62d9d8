//! Read/export view
//!
//! Groups a [`Snapshot`] into first-party sites and the trackers seen on
//! them, with hosts collapsed to their root domain.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::classify::root_domain;
use crate::store::Snapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteNode {
    pub children: BTreeSet<String>,
}

/// Parent site -> tracker root domains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SiteTree {
    sites: BTreeMap<String, SiteNode>,
}

impl SiteTree {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut sites: BTreeMap<String, SiteNode> = BTreeMap::new();

        // Every first party is a parent, trackers or not
        for (host, entry) in snapshot {
            if entry.is_first_party {
                sites.entry(root_domain(host)).or_default();
            }
        }

        for (host, entry) in snapshot.iter().filter(|(_, e)| !e.is_first_party) {
            let tracker = root_domain(host);
            for parent in &entry.observed_parents {
                let parent = root_domain(parent);
                let node = sites.entry(parent.clone()).or_default();
                if parent != tracker {
                    node.children.insert(tracker.clone());
                }
            }
        }

        Self { sites }
    }

    pub fn children(&self, site: &str) -> Option<&BTreeSet<String>> {
        self.sites.get(site).map(|node| &node.children)
    }

    pub fn sites(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.sites.iter().map(|(site, node)| (site.as_str(), &node.children))
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Indented text rendering, one site per line with its trackers below.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (site, children) in self.sites() {
            out.push_str(site);
            out.push('\n');
            if children.is_empty() {
                out.push_str("  (no trackers)\n");
            }
            for child in children {
                out.push_str("  ");
                out.push_str(child);
                out.push('\n');
            }
        }
        out
    }
}
