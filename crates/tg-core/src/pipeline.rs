//! Ingestion policy
//!
//! Turns capture events into store mutations. Runs on the event queue's
//! consumer thread, so the context registry and notification gate it owns
//! need no locking.

use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::classify::Classifier;
use crate::gate::NotificationGate;
use crate::queue::EventHandler;
use crate::store::{Store, StoreError};
use crate::types::{CaptureEvent, ContextId, LoadStatus, PageLoad, ResponseObserved};
use crate::url::{extract_scheme, hostname_of};

/// Gate key for responses that belong to no browsing context.
pub const NO_CONTEXT: ContextId = -1;

// =============================================================================
// Outcomes
// =============================================================================

/// What a handled event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    /// Third-party relationship written to the store
    Recorded { first_party: String, tracker: String },
    /// Tracker surfaced to the user instead of recorded
    Flagged(TrackerAlert),
    /// Tracker flagged again in a context that was already notified
    Suppressed { context: ContextId, root_domain: String },
    /// Completed page load written to the store
    FirstPartyRecorded { hostname: String },
    /// Context began a fresh navigation
    NavigationStarted { context: ContextId },
}

/// Why an event was not applied.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Malformed URL: '{0}'")]
    MalformedUrl(String),
    #[error("Unknown browsing context {0}")]
    UnknownContext(ContextId),
    #[error("Same-origin request to {0}")]
    SameOrigin(String),
    #[error("Private browsing context")]
    PrivateContext,
    #[error("Internal page scheme '{0}'")]
    InternalScheme(String),
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl IngestError {
    /// Policy discard, as opposed to a storage failure.
    pub fn is_discard(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

// =============================================================================
// Alerts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertKind {
    /// Root domain is on a loaded blocklist
    Blocklisted { description: String },
    /// Hostname matched the ad/tracker keyword heuristic
    AdHeuristic,
}

/// A tracker surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerAlert {
    pub context: ContextId,
    pub first_party: String,
    pub tracker: String,
    pub root_domain: String,
    pub tld_risk: u8,
    pub kind: AlertKind,
}

/// Receiver of surfaced alerts (toast display lives behind this).
pub trait AlertSink: Send {
    fn surface(&mut self, alert: &TrackerAlert);
}

/// Writes alerts to the log.
#[derive(Debug, Default)]
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn surface(&mut self, alert: &TrackerAlert) {
        match &alert.kind {
            AlertKind::Blocklisted { description } => log::info!(
                "tracker {} on {}: {} (tld risk {})",
                alert.tracker,
                alert.first_party,
                description,
                alert.tld_risk
            ),
            AlertKind::AdHeuristic => log::info!(
                "likely ad/tracker {} on {} (tld risk {})",
                alert.tracker,
                alert.first_party,
                alert.tld_risk
            ),
        }
    }
}

impl AlertSink for Sender<TrackerAlert> {
    fn surface(&mut self, alert: &TrackerAlert) {
        if self.send(alert.clone()).is_err() {
            log::debug!("alert receiver dropped");
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Last known state of a browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    pub url: String,
    pub private: bool,
}

/// Default schemes whose pages are never recorded.
pub const DEFAULT_EXCLUDED_SCHEMES: &[&str] = &[
    "about",
    "moz-extension",
    "chrome-extension",
    "chrome",
    "resource",
    "view-source",
];

pub struct Pipeline {
    store: Arc<Store>,
    classifier: Classifier,
    gate: NotificationGate,
    contexts: HashMap<ContextId, ContextInfo>,
    excluded_schemes: Vec<String>,
    alerts: Box<dyn AlertSink>,
}

impl Pipeline {
    pub fn new(store: Arc<Store>, classifier: Classifier, alerts: Box<dyn AlertSink>) -> Self {
        Self {
            store,
            classifier,
            gate: NotificationGate::new(),
            contexts: HashMap::new(),
            excluded_schemes: DEFAULT_EXCLUDED_SCHEMES.iter().map(|s| s.to_string()).collect(),
            alerts,
        }
    }

    pub fn with_excluded_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_schemes = schemes
            .into_iter()
            .map(|s| s.as_ref().trim().trim_end_matches(':').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn context(&self, context: ContextId) -> Option<&ContextInfo> {
        self.contexts.get(&context)
    }

    /// Apply one event.
    pub fn handle(&mut self, event: CaptureEvent) -> Result<Ingested, IngestError> {
        match event {
            CaptureEvent::ThirdPartyObserved(resp) => self.on_response(&resp),
            CaptureEvent::FirstPartyPageLoad(load) => self.on_page_load(load),
        }
    }

    /// Forget a context and its notification history.
    pub fn close_context(&mut self, context: ContextId) {
        self.contexts.remove(&context);
        self.gate.clear_context(context);
    }

    fn on_response(&mut self, resp: &ResponseObserved) -> Result<Ingested, IngestError> {
        let target = hostname_of(&resp.url).ok_or_else(|| IngestError::MalformedUrl(resp.url.clone()))?;
        let origin_url = resp.initiator();
        let origin = hostname_of(origin_url).ok_or_else(|| IngestError::MalformedUrl(origin_url.to_string()))?;

        let (gate_key, first_party) = match resp.context_id {
            Some(id) => {
                let info = self.contexts.get(&id).ok_or(IngestError::UnknownContext(id))?;
                if info.private {
                    return Err(IngestError::PrivateContext);
                }
                self.check_scheme(&info.url)?;
                let host = hostname_of(&info.url).ok_or_else(|| IngestError::MalformedUrl(info.url.clone()))?;
                (id, host)
            }
            None => {
                self.check_scheme(origin_url)?;
                (NO_CONTEXT, origin)
            }
        };

        if target == first_party {
            return Err(IngestError::SameOrigin(target));
        }

        let verdict = self.classifier.classify(&target);
        if verdict.is_flagged() {
            let kind = match verdict.description.clone() {
                Some(description) => AlertKind::Blocklisted { description },
                None => AlertKind::AdHeuristic,
            };
            if !self.gate.should_notify(gate_key, &verdict.root_domain) {
                return Ok(Ingested::Suppressed {
                    context: gate_key,
                    root_domain: verdict.root_domain,
                });
            }
            let alert = TrackerAlert {
                context: gate_key,
                first_party,
                tracker: target,
                root_domain: verdict.root_domain,
                tld_risk: verdict.tld_risk,
                kind,
            };
            self.alerts.surface(&alert);
            return Ok(Ingested::Flagged(alert));
        }

        self.store.record_third_party(&first_party, &target, resp.timestamp)?;
        Ok(Ingested::Recorded {
            first_party,
            tracker: target,
        })
    }

    fn on_page_load(&mut self, load: PageLoad) -> Result<Ingested, IngestError> {
        self.contexts.insert(
            load.context_id,
            ContextInfo {
                url: load.url.clone(),
                private: load.private,
            },
        );

        match load.status {
            LoadStatus::Loading => {
                self.gate.clear_context(load.context_id);
                Ok(Ingested::NavigationStarted {
                    context: load.context_id,
                })
            }
            LoadStatus::Complete => {
                if load.private {
                    return Err(IngestError::PrivateContext);
                }
                self.check_scheme(&load.url)?;
                let hostname = hostname_of(&load.url).ok_or_else(|| IngestError::MalformedUrl(load.url.clone()))?;
                self.store
                    .record_first_party(&hostname, load.timestamp, load.favicon_url.as_deref())?;
                Ok(Ingested::FirstPartyRecorded { hostname })
            }
        }
    }

    fn check_scheme(&self, url: &str) -> Result<(), IngestError> {
        let scheme = extract_scheme(url.trim()).ok_or_else(|| IngestError::MalformedUrl(url.to_string()))?;
        if self.excluded_schemes.iter().any(|s| s == scheme.as_str()) {
            return Err(IngestError::InternalScheme(scheme.as_str().to_string()));
        }
        Ok(())
    }
}

impl EventHandler for Pipeline {
    fn handle(&mut self, event: CaptureEvent) -> Result<Ingested, IngestError> {
        Pipeline::handle(self, event)
    }

    fn context_closed(&mut self, context: ContextId) {
        self.close_context(context);
    }
}
