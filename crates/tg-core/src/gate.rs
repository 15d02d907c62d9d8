//! Per-context notification dedup
//!
//! A tracker root domain is surfaced at most once per browsing context
//! until the context starts a fresh navigation. Memory only.

use std::collections::{HashMap, HashSet};

use crate::types::ContextId;

/// Dedup set keyed by (context, root domain).
#[derive(Debug, Default)]
pub struct NotificationGate {
    seen: HashMap<ContextId, HashSet<String>>,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly once per (context, root domain) pair until the
    /// context is cleared.
    pub fn should_notify(&mut self, context: ContextId, root_domain: &str) -> bool {
        let key = root_domain.to_ascii_lowercase();
        self.seen.entry(context).or_default().insert(key)
    }

    /// Forget every entry of a context.
    pub fn clear_context(&mut self, context: ContextId) {
        self.seen.remove(&context);
    }

    /// Number of contexts with at least one entry.
    pub fn context_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_once_per_context() {
        let mut gate = NotificationGate::new();
        assert!(gate.should_notify(1, "ads.example.com"));
        assert!(!gate.should_notify(1, "ads.example.com"));
        assert!(!gate.should_notify(1, "ADS.example.com"));
    }

    #[test]
    fn test_clear_context_allows_renotify() {
        let mut gate = NotificationGate::new();
        assert!(gate.should_notify(1, "ads.example.com"));
        gate.clear_context(1);
        assert!(gate.should_notify(1, "ads.example.com"));
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut gate = NotificationGate::new();
        assert!(gate.should_notify(1, "ads.example.com"));
        assert!(gate.should_notify(2, "ads.example.com"));
        gate.clear_context(1);
        assert!(!gate.should_notify(2, "ads.example.com"));
        assert_eq!(gate.context_count(), 1);
    }
}
