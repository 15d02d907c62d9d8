//! Hostname classification
//!
//! Maps a hostname to its root domain, a TLD risk score, an optional
//! blocklist description and a coarse ad/tracker keyword verdict.
//! Reference tables are loaded once at start-up and never mutated while
//! classifying.
//!
//! # Examples
//!
//! ```
//! use tg_core::classify::root_domain;
//!
//! assert_eq!(root_domain("static01.nytimes.com"), "nytimes.com");
//! assert_eq!(root_domain("example.co.uk"), "example.co.uk");
//! ```

use std::collections::HashMap;

use crate::types::VerdictFlags;

// =============================================================================
// Reference Tables
// =============================================================================

/// Highest TLD risk score.
pub const MAX_TLD_RISK: u8 = 10;

/// Static reference data used by the classifier.
///
/// An empty table is a valid state: it yields risk 0 and no descriptions.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    /// TLD suffix (".xyz") -> risk 0..=10
    tld_risk: HashMap<String, u8>,
    /// Root domain -> human-readable description
    blocklist: HashMap<String, String>,
}

impl ReferenceTables {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a TLD risk entry. The key is normalized to a lowercase
    /// suffix with a leading dot and the score is clamped to 0..=10.
    pub fn insert_tld_risk(&mut self, tld: &str, risk: u8) {
        let tld = tld.trim().trim_start_matches('.').to_ascii_lowercase();
        if tld.is_empty() {
            return;
        }
        self.tld_risk.insert(format!(".{tld}"), risk.min(MAX_TLD_RISK));
    }

    /// Insert a blocklist entry. Returns false if the domain was already
    /// present (the first description wins).
    pub fn insert_blocklist(&mut self, domain: &str, description: &str) -> bool {
        let domain = domain.trim().trim_matches('.').to_ascii_lowercase();
        if domain.is_empty() || self.blocklist.contains_key(&domain) {
            return false;
        }
        self.blocklist.insert(domain, description.to_string());
        true
    }

    pub fn tld_risk_len(&self) -> usize {
        self.tld_risk.len()
    }

    pub fn blocklist_len(&self) -> usize {
        self.blocklist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tld_risk.is_empty() && self.blocklist.is_empty()
    }
}

// =============================================================================
// Root Domain
// =============================================================================

/// Generic TLDs whose registrable root is the last two labels.
const GENERIC_TLDS: &[&str] = &["com", "net", "org"];

/// Collapse a hostname to its root domain.
///
/// Only generic TLDs are collapsed (last two labels); any other TLD is
/// returned unchanged. There is no public suffix lookup, so
/// `example.co.uk` and `a.b.example.io` are their own roots.
pub fn root_domain(hostname: &str) -> String {
    let labels: Vec<&str> = hostname.split('.').collect();
    let n = labels.len();
    if n <= 2 {
        return hostname.to_string();
    }

    let tld = labels[n - 1].to_ascii_lowercase();
    if GENERIC_TLDS.contains(&tld.as_str()) {
        return labels[n - 2..].join(".");
    }

    hostname.to_string()
}

/// TLD suffix of a hostname, including the leading dot.
pub fn tld_suffix(hostname: &str) -> Option<&str> {
    let dot = hostname.rfind('.')?;
    if dot + 1 == hostname.len() {
        return None;
    }
    Some(&hostname[dot..])
}

// =============================================================================
// Keyword Heuristic
// =============================================================================

/// Substrings that mark a hostname as a likely ad or tracker.
///
/// Coarse by nature: `tag` matches legitimate hosts too.
pub const AD_KEYWORDS: &[&str] = &[
    "ads",
    "adservice",
    "track",
    "tracking",
    "pixel",
    "beacon",
    "tag",
    "quant",
    "scorecard",
    "analytics",
    "doubleclick",
    "googlesyndication",
    "adnxs",
    "criteo",
    "taboola",
    "outbrain",
    "hotjar",
    "mixpanel",
];

/// Check the hostname against the fixed keyword set.
pub fn looks_like_ad(hostname: &str) -> bool {
    let host = hostname.to_ascii_lowercase();
    AD_KEYWORDS.iter().any(|kw| host.contains(kw))
}

// =============================================================================
// Classifier
// =============================================================================

/// Result of classifying a tracker hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub root_domain: String,
    pub tld_risk: u8,
    pub description: Option<String>,
    pub flags: VerdictFlags,
}

impl Classification {
    /// Observation should be surfaced instead of recorded.
    pub fn is_flagged(&self) -> bool {
        self.flags.intersects(VerdictFlags::FLAGGED)
    }
}

/// Hostname classifier over loaded reference tables.
#[derive(Debug, Clone)]
pub struct Classifier {
    tables: ReferenceTables,
    extra_keywords: Vec<String>,
    risky_tld_threshold: u8,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ReferenceTables::default())
    }
}

impl Classifier {
    /// Default risk at or above which a TLD is flagged as risky.
    pub const DEFAULT_RISKY_TLD_THRESHOLD: u8 = 7;

    pub fn new(tables: ReferenceTables) -> Self {
        Self {
            tables,
            extra_keywords: Vec::new(),
            risky_tld_threshold: Self::DEFAULT_RISKY_TLD_THRESHOLD,
        }
    }

    /// Append keywords to the fixed heuristic set.
    pub fn with_extra_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_keywords.extend(
            keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_ascii_lowercase())
                .filter(|k| !k.is_empty()),
        );
        self
    }

    pub fn with_risky_tld_threshold(mut self, threshold: u8) -> Self {
        self.risky_tld_threshold = threshold;
        self
    }

    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    /// Risk score 0..=10 of the hostname's TLD; 0 when unknown.
    pub fn tld_risk(&self, hostname: &str) -> u8 {
        match tld_suffix(hostname) {
            Some(suffix) => self
                .tables
                .tld_risk
                .get(&suffix.to_ascii_lowercase())
                .copied()
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Blocklist description of the hostname's root domain.
    pub fn blocklist_description(&self, hostname: &str) -> Option<&str> {
        let root = root_domain(hostname).to_ascii_lowercase();
        self.tables.blocklist.get(&root).map(String::as_str)
    }

    /// Keyword heuristic, including configured extra keywords.
    pub fn looks_like_ad(&self, hostname: &str) -> bool {
        if looks_like_ad(hostname) {
            return true;
        }
        if self.extra_keywords.is_empty() {
            return false;
        }
        let host = hostname.to_ascii_lowercase();
        self.extra_keywords.iter().any(|kw| host.contains(kw.as_str()))
    }

    /// Full classification of a tracker hostname.
    pub fn classify(&self, hostname: &str) -> Classification {
        let root = root_domain(hostname);
        let tld_risk = self.tld_risk(hostname);
        let description = self.blocklist_description(hostname).map(str::to_string);

        let mut flags = VerdictFlags::empty();
        if description.is_some() {
            flags |= VerdictFlags::BLOCKLISTED;
        }
        if self.looks_like_ad(hostname) {
            flags |= VerdictFlags::AD_KEYWORD;
        }
        if tld_risk > 0 && tld_risk >= self.risky_tld_threshold {
            flags |= VerdictFlags::RISKY_TLD;
        }

        Classification {
            root_domain: root,
            tld_risk,
            description,
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tables() -> ReferenceTables {
        let mut tables = ReferenceTables::new();
        tables.insert_tld_risk(".xyz", 8);
        tables.insert_tld_risk("TOP", 42);
        tables.insert_blocklist("adservice.example", "Example ad network");
        tables.insert_blocklist("doubleclick.net", "Google ad serving");
        tables
    }

    #[test]
    fn test_root_domain_generic() {
        assert_eq!(root_domain("static01.nytimes.com"), "nytimes.com");
        assert_eq!(root_domain("a.b.c.example.org"), "example.org");
        assert_eq!(root_domain("x.example.NET"), "example.NET");
    }

    #[test]
    fn test_root_domain_unchanged() {
        assert_eq!(root_domain("example.co.uk"), "example.co.uk");
        assert_eq!(root_domain("canva.com"), "canva.com");
        assert_eq!(root_domain("localhost"), "localhost");
        assert_eq!(root_domain("cdn.example"), "cdn.example");
    }

    #[test]
    fn test_tld_suffix() {
        assert_eq!(tld_suffix("a.example.xyz"), Some(".xyz"));
        assert_eq!(tld_suffix("localhost"), None);
        assert_eq!(tld_suffix("trailing."), None);
    }

    #[test]
    fn test_tld_risk() {
        let classifier = Classifier::new(sample_tables());
        assert_eq!(classifier.tld_risk("evil.XYZ"), 8);
        assert_eq!(classifier.tld_risk("cheap.top"), MAX_TLD_RISK);
        assert_eq!(classifier.tld_risk("example.com"), 0);
        assert_eq!(classifier.tld_risk("localhost"), 0);
    }

    #[test]
    fn test_blocklist_description_uses_root_domain() {
        let classifier = Classifier::new(sample_tables());
        assert_eq!(
            classifier.blocklist_description("stats.g.DoubleClick.net"),
            Some("Google ad serving")
        );
        assert_eq!(
            classifier.blocklist_description("adservice.example"),
            Some("Example ad network")
        );
        assert_eq!(classifier.blocklist_description("cdn.example"), None);
    }

    #[test]
    fn test_blocklist_first_entry_wins() {
        let mut tables = ReferenceTables::new();
        assert!(tables.insert_blocklist("a.com", "first"));
        assert!(!tables.insert_blocklist("A.com", "second"));
        let classifier = Classifier::new(tables);
        assert_eq!(classifier.blocklist_description("a.com"), Some("first"));
    }

    #[test]
    fn test_looks_like_ad() {
        assert!(looks_like_ad("pagead2.googlesyndication.com"));
        assert!(looks_like_ad("Analytics.example.com"));
        assert!(looks_like_ad("tagmanager.example.com"));
        assert!(!looks_like_ad("cdn.example"));
        assert!(!looks_like_ad("fonts.gstatic.com"));
    }

    #[test]
    fn test_extra_keywords() {
        let classifier = Classifier::default().with_extra_keywords(["Telemetry", " "]);
        assert!(classifier.looks_like_ad("telemetry.vendor.io"));
        assert!(!classifier.looks_like_ad("cdn.vendor.io"));
    }

    #[test]
    fn test_empty_tables_degrade_gracefully() {
        let classifier = Classifier::default();
        let c = classifier.classify("cdn.example");
        assert_eq!(c.tld_risk, 0);
        assert_eq!(c.description, None);
        assert!(c.flags.is_empty());
        assert!(classifier.classify("ads.example.com").is_flagged());
    }

    #[test]
    fn test_classify_flags() {
        let classifier = Classifier::new(sample_tables());
        let c = classifier.classify("adservice.example");
        assert_eq!(c.root_domain, "adservice.example");
        assert!(c.flags.contains(VerdictFlags::BLOCKLISTED | VerdictFlags::AD_KEYWORD));

        let risky = classifier.classify("cdn.shop.xyz");
        assert!(risky.flags.contains(VerdictFlags::RISKY_TLD));
        assert!(!risky.is_flagged());
    }
}
