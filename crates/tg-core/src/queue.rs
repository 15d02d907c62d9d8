//! Serial event queue
//!
//! Producers enqueue capture events from any thread without blocking. A
//! single worker thread takes them in FIFO order and runs the handler to
//! completion before taking the next one, so every store mutation happens
//! inside one serialized section. A failing or panicking handler only
//! loses its own event.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::pipeline::{IngestError, Ingested};
use crate::types::{CaptureEvent, ContextId};

/// Consumer side of the queue.
pub trait EventHandler: Send + 'static {
    fn handle(&mut self, event: CaptureEvent) -> Result<Ingested, IngestError>;

    /// A browsing context went away.
    fn context_closed(&mut self, _context: ContextId) {}
}

enum QueueCommand {
    Event(CaptureEvent),
    ContextClosed(ContextId),
    Flush(Sender<()>),
    Shutdown,
}

/// Counters of handled events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub processed: u64,
    pub recorded: u64,
    pub flagged: u64,
    pub suppressed: u64,
    pub discarded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct SharedState {
    pending: AtomicUsize,
    processing: AtomicBool,
    processed: AtomicU64,
    recorded: AtomicU64,
    flagged: AtomicU64,
    suppressed: AtomicU64,
    discarded: AtomicU64,
    failed: AtomicU64,
}

impl SharedState {
    fn count(&self, outcome: &Result<Ingested, IngestError>) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Ok(Ingested::Recorded { .. }) | Ok(Ingested::FirstPartyRecorded { .. }) => &self.recorded,
            Ok(Ingested::Flagged(_)) => &self.flagged,
            Ok(Ingested::Suppressed { .. }) => &self.suppressed,
            Ok(Ingested::NavigationStarted { .. }) => return,
            Err(err) if err.is_discard() => &self.discarded,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> QueueStats {
        QueueStats {
            processed: self.processed.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            flagged: self.flagged.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// FIFO queue with one consumer thread.
pub struct EventQueue {
    sender: Sender<QueueCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: Arc<SharedState>,
}

impl EventQueue {
    /// Start the consumer thread.
    pub fn spawn<H: EventHandler>(handler: H) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let state = Arc::new(SharedState::default());
        let worker_state = Arc::clone(&state);

        let worker = thread::Builder::new()
            .name("tg-event-queue".into())
            .spawn(move || run_worker(handler, receiver, worker_state))?;

        Ok(Self {
            sender,
            worker: Mutex::new(Some(worker)),
            state,
        })
    }

    /// Append an event. Never blocks; returns false once the queue is
    /// closed.
    pub fn enqueue(&self, event: CaptureEvent) -> bool {
        self.state.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(QueueCommand::Event(event)).is_err() {
            self.state.pending.fetch_sub(1, Ordering::SeqCst);
            log::warn!("event dropped: queue is closed");
            return false;
        }
        true
    }

    /// Ask the consumer to forget a browsing context, in queue order.
    pub fn close_context(&self, context: ContextId) -> bool {
        self.sender.send(QueueCommand::ContextClosed(context)).is_ok()
    }

    /// Block until every command sent before this call has been handled.
    pub fn flush(&self) {
        let (tx, rx) = mpsc::channel();
        if self.sender.send(QueueCommand::Flush(tx)).is_ok() {
            let _ = rx.recv();
        }
    }

    /// Events enqueued but not yet handled.
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    /// An event handler is running right now.
    pub fn is_processing(&self) -> bool {
        self.state.processing.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        self.state.snapshot()
    }

    /// Handle everything already enqueued, then stop the consumer.
    pub fn close(&self) {
        let mut guard = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            if self.sender.send(QueueCommand::Shutdown).is_err() {
                log::error!("event queue worker exited before shutdown");
            }
            if let Err(err) = handle.join() {
                log::error!("failed to join event queue worker: {err:?}");
            }
        }
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker<H: EventHandler>(mut handler: H, receiver: Receiver<QueueCommand>, state: Arc<SharedState>) {
    while let Ok(command) = receiver.recv() {
        match command {
            QueueCommand::Event(event) => {
                state.processing.store(true, Ordering::SeqCst);
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event)));
                state.processing.store(false, Ordering::SeqCst);

                match outcome {
                    Ok(result) => {
                        match &result {
                            Ok(ingested) => log::debug!("event handled: {ingested:?}"),
                            Err(err) if err.is_discard() => log::debug!("event discarded: {err}"),
                            Err(err) => log::warn!("event failed: {err}"),
                        }
                        state.count(&result);
                    }
                    Err(_) => {
                        log::error!("event handler panicked; continuing with next event");
                        state.processed.fetch_add(1, Ordering::Relaxed);
                        state.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                state.pending.fetch_sub(1, Ordering::SeqCst);
            }
            QueueCommand::ContextClosed(context) => handler.context_closed(context),
            QueueCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            QueueCommand::Shutdown => break,
        }
    }

    log::info!("event queue shutting down");
}
