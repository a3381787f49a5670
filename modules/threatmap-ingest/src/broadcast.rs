//! Fire-and-forget fan-out of new records to live subscribers.
//!
//! Subscribers register on connect and get an unbounded receiver. Publishing
//! never blocks on a slow subscriber and never retries; a subscriber whose
//! receiver has been dropped is pruned on the next publish.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use threatmap_common::{ThreatRecord, NEW_THREAT_TOPIC};

/// Wire frame sent to subscribers: `{"event": "new-threat", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct LiveEvent {
    pub event: &'static str,
    pub data: ThreatRecord,
}

impl LiveEvent {
    pub fn new_threat(record: ThreatRecord) -> Self {
        Self {
            event: NEW_THREAT_TOPIC,
            data: record,
        }
    }
}

/// Handle returned by [`EventBroadcaster::register`].
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::UnboundedReceiver<LiveEvent>,
}

#[derive(Default)]
pub struct EventBroadcaster {
    subscribers: Mutex<HashMap<Uuid, mpsc::UnboundedSender<LiveEvent>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<Uuid, mpsc::UnboundedSender<LiveEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.subscribers().insert(id, tx);
        debug!(subscriber = %id, "Subscriber registered");
        Subscription { id, receiver: rx }
    }

    pub fn deregister(&self, id: Uuid) {
        if self.subscribers().remove(&id).is_some() {
            debug!(subscriber = %id, "Subscriber deregistered");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    /// Push a record to every live subscriber. Returns how many received it.
    pub fn publish(&self, record: &ThreatRecord) -> usize {
        let event = LiveEvent::new_threat(record.clone());
        let mut subscribers = self.subscribers();
        subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
        let delivered = subscribers.len();
        debug!(title = record.title.as_str(), delivered, "Published new threat");
        delivered
    }
}
