//! Change notification channel
//!
//! Emitted after every committed store mutation. Carries no payload;
//! subscribers re-query the snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Signal that the store changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChanged;

pub type SubscriptionId = u64;

/// Receiving end of a change subscription.
pub struct Subscription {
    id: SubscriptionId,
    receiver: Receiver<StoreChanged>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Non-blocking poll.
    pub fn try_recv(&self) -> Option<StoreChanged> {
        match self.receiver.try_recv() {
            Ok(changed) => Some(changed),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next change.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StoreChanged> {
        match self.receiver.recv_timeout(timeout) {
            Ok(changed) => Some(changed),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drain pending signals, returning how many were queued.
    pub fn drain(&self) -> usize {
        self.receiver.try_iter().count()
    }
}

/// Fan-out of change signals to registered subscribers.
#[derive(Default)]
pub struct ChangeNotifier {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriptionId, Sender<StoreChanged>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        Subscription { id, receiver: rx }
    }

    /// Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Signal every live subscriber; dropped receivers are pruned.
    pub fn emit(&self) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|id, tx| {
            let alive = tx.send(StoreChanged).is_ok();
            if !alive {
                log::debug!("pruning dropped change subscriber {id}");
            }
            alive
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let notifier = ChangeNotifier::new();
        let a = notifier.subscribe();
        let b = notifier.subscribe();
        notifier.emit();
        assert_eq!(a.try_recv(), Some(StoreChanged));
        assert_eq!(b.try_recv(), Some(StoreChanged));
        assert_eq!(a.try_recv(), None);
    }

    #[test]
    fn test_unsubscribe() {
        let notifier = ChangeNotifier::new();
        let a = notifier.subscribe();
        assert!(notifier.unsubscribe(a.id()));
        assert!(!notifier.unsubscribe(a.id()));
        notifier.emit();
        assert_eq!(a.try_recv(), None);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let notifier = ChangeNotifier::new();
        let a = notifier.subscribe();
        drop(notifier.subscribe());
        assert_eq!(notifier.subscriber_count(), 2);
        notifier.emit();
        assert_eq!(notifier.subscriber_count(), 1);
        assert_eq!(a.drain(), 1);
    }
}
