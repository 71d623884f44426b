//! Observer fan-out.
//!
//! Each observer WebSocket gets a bounded queue drained by its own writer
//! task. Broadcasting never awaits a socket: a full queue drops the message
//! for that observer only, a closed queue removes the observer.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lamphub_protocol::ObserverMessage;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Identifier of one observer connection within its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

/// Result of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    pub pruned: usize,
}

/// The set of connected observers of one kind (operator or display).
pub struct ObserverSet {
    label: &'static str,
    capacity: usize,
    observers: Mutex<HashMap<ObserverId, mpsc::Sender<Arc<str>>>>,
    next_id: AtomicU64,
}

impl ObserverSet {
    /// Creates an empty set whose observers buffer `capacity` messages each.
    pub fn new(label: &'static str, capacity: usize) -> Self {
        Self {
            label,
            capacity: capacity.max(1),
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Adds an observer and returns the receiving end of its queue.
    pub async fn add(&self) -> (ObserverId, mpsc::Receiver<Arc<str>>) {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut observers = self.observers.lock().await;
        observers.insert(id, tx);
        debug!(set = self.label, observer = %id, count = observers.len(), "Observer added");
        (id, rx)
    }

    pub async fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().await;
        let removed = observers.remove(&id).is_some();
        if removed {
            debug!(set = self.label, observer = %id, count = observers.len(), "Observer removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.observers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.observers.lock().await.is_empty()
    }

    /// Sends `message` to every observer.
    ///
    /// The message is serialized once. Observers whose queue has closed are
    /// removed in the same pass.
    pub async fn broadcast(&self, message: &ObserverMessage) -> BroadcastReport {
        let Some(text) = self.encode(message) else {
            return BroadcastReport::default();
        };

        let mut report = BroadcastReport::default();
        let mut observers = self.observers.lock().await;
        observers.retain(|id, tx| match tx.try_send(Arc::clone(&text)) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(set = self.label, observer = %id, kind = message.kind(), "Observer queue full, message dropped");
                report.dropped += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(set = self.label, observer = %id, "Observer gone, pruning");
                report.pruned += 1;
                false
            }
        });

        debug!(
            set = self.label,
            kind = message.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            pruned = report.pruned,
            "Broadcast complete"
        );
        report
    }

    /// Sends `message` to a single observer. Returns false if it is gone or full.
    pub async fn send_to(&self, id: ObserverId, message: &ObserverMessage) -> bool {
        let Some(text) = self.encode(message) else {
            return false;
        };
        let observers = self.observers.lock().await;
        match observers.get(&id) {
            Some(tx) => tx.try_send(text).is_ok(),
            None => false,
        }
    }

    fn encode(&self, message: &ObserverMessage) -> Option<Arc<str>> {
        match message.to_json() {
            Ok(json) => Some(Arc::from(json)),
            Err(e) => {
                warn!(set = self.label, kind = message.kind(), error = %e, "Failed to serialize observer message");
                None
            }
        }
    }
}
