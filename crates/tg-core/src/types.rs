//! Core type definitions for TrackerGraph
//!
//! These types describe the capture events delivered by the host
//! environment and the verdicts the classifier attaches to them.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Identifier of a browsing context (a tab, in browser terms).
pub type ContextId = i64;

// =============================================================================
// Capture Events
// =============================================================================

/// A network response observed while a page was loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseObserved {
    /// URL of the resource that was fetched
    pub url: String,
    /// URL of the initiating page, when the host reports one
    #[serde(default)]
    pub origin_url: Option<String>,
    /// URL of the document the request belongs to (fallback for origin)
    #[serde(default)]
    pub document_url: Option<String>,
    /// Browsing context that issued the request, if any
    #[serde(default)]
    pub context_id: Option<ContextId>,
    pub timestamp: Timestamp,
}

impl ResponseObserved {
    /// URL the request was initiated from.
    pub fn initiator(&self) -> &str {
        self.origin_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.document_url.as_deref())
            .unwrap_or("")
    }
}

/// Navigation status reported for a browsing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    /// Navigation started (new load or reload)
    Loading,
    /// Page finished loading
    Complete,
}

/// A page-load transition of a browsing context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLoad {
    pub context_id: ContextId,
    /// URL of the page in the context
    pub url: String,
    #[serde(default)]
    pub favicon_url: Option<String>,
    pub status: LoadStatus,
    /// Private/incognito session
    #[serde(default)]
    pub private: bool,
    pub timestamp: Timestamp,
}

/// Event accepted by the event queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CaptureEvent {
    ThirdPartyObserved(ResponseObserved),
    FirstPartyPageLoad(PageLoad),
}

impl CaptureEvent {
    /// Browsing context the event belongs to, if any.
    pub fn context_id(&self) -> Option<ContextId> {
        match self {
            Self::ThirdPartyObserved(resp) => resp.context_id,
            Self::FirstPartyPageLoad(load) => Some(load.context_id),
        }
    }
}

// =============================================================================
// Scheme
// =============================================================================

/// URL scheme of a page or request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
    Ws,
    Wss,
    Ftp,
    /// Any other scheme, lowercased and without the trailing ':'
    Other(String),
}

impl Scheme {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ws => "ws",
            Self::Wss => "wss",
            Self::Ftp => "ftp",
            Self::Other(s) => s.as_str(),
        }
    }
}

// =============================================================================
// Verdict Flags
// =============================================================================

bitflags::bitflags! {
    /// Classification verdict for a tracker root domain.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VerdictFlags: u8 {
        /// Root domain has a blocklist description
        const BLOCKLISTED = 1 << 0;
        /// Hostname matches the ad/tracker keyword heuristic
        const AD_KEYWORD = 1 << 1;
        /// TLD risk at or above the configured threshold
        const RISKY_TLD = 1 << 2;

        /// Verdicts that keep an observation out of the graph
        const FLAGGED = Self::BLOCKLISTED.bits() | Self::AD_KEYWORD.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiator_prefers_origin_url() {
        let resp = ResponseObserved {
            url: "https://cdn.example/a.js".into(),
            origin_url: Some("https://news.com/".into()),
            document_url: Some("https://other.com/".into()),
            context_id: None,
            timestamp: 1,
        };
        assert_eq!(resp.initiator(), "https://news.com/");
    }

    #[test]
    fn test_initiator_falls_back_to_document_url() {
        let resp = ResponseObserved {
            url: "https://cdn.example/a.js".into(),
            origin_url: Some(String::new()),
            document_url: Some("https://other.com/".into()),
            context_id: None,
            timestamp: 1,
        };
        assert_eq!(resp.initiator(), "https://other.com/");
    }

    #[test]
    fn test_event_json_shape() {
        let json = r#"{"kind":"FirstPartyPageLoad","contextId":3,"url":"https://a.com/","status":"complete","timestamp":5}"#;
        let event: CaptureEvent = serde_json::from_str(json).expect("event should parse");
        assert_eq!(event.context_id(), Some(3));
        match event {
            CaptureEvent::FirstPartyPageLoad(load) => {
                assert_eq!(load.status, LoadStatus::Complete);
                assert!(!load.private);
                assert_eq!(load.favicon_url, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_flagged_mask() {
        assert!(VerdictFlags::FLAGGED.contains(VerdictFlags::BLOCKLISTED));
        assert!(!VerdictFlags::RISKY_TLD.intersects(VerdictFlags::FLAGGED));
    }
}
