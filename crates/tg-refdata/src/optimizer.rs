use std::collections::HashSet;

use crate::parser::BlocklistEntry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
}

/// Drop repeated domains, keeping the first entry for each.
pub fn dedupe_entries(entries: &mut Vec<BlocklistEntry>) -> DedupeStats {
    let before = entries.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(before);
    let mut deduped = 0usize;

    entries.retain(|entry| {
        if seen.insert(entry.domain.clone()) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    DedupeStats {
        before,
        after: entries.len(),
        deduped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(domain: &str, description: &str) -> BlocklistEntry {
        BlocklistEntry {
            domain: domain.into(),
            description: description.into(),
        }
    }

    #[test]
    fn test_first_entry_wins() {
        let mut entries = vec![
            entry("a.com", "first"),
            entry("b.com", "b"),
            entry("a.com", "second"),
        ];
        let stats = dedupe_entries(&mut entries);
        assert_eq!(stats, DedupeStats { before: 3, after: 2, deduped: 1 });
        assert_eq!(entries[0].description, "first");
    }
}
