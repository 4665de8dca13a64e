use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tokio::sync::mpsc;

/// Per-subscriber channel capacity. Small and bounded: a slow subscriber should lose messages,
/// not back-pressure the publisher.
const SUBSCRIBER_CAPACITY: usize = 16;

/// Opaque subscription handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber<T> {
    topic: String,
    sender: mpsc::Sender<T>,
}

/// Topic-keyed pub/sub fan-out with per-subscriber bounded queues and slow-subscriber
/// isolation: a publish to a subscriber whose queue is full is dropped for that subscriber
/// only, never for the others, and never blocks the publisher.
///
/// Subscribers are assumed to be single-threaded consumers of their own receiver.
pub struct Hub<T> {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<u64, Subscriber<T>>>,
}

impl<T: Clone> Hub<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a topic, returning an id (for later `unsubscribe`) and the receiving half
    /// of a bounded channel.
    pub fn subscribe(&self, topic: impl Into<String>) -> (SubscriptionId, mpsc::Receiver<T>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.write().unwrap().insert(
            id,
            Subscriber {
                topic: topic.into(),
                sender: tx,
            },
        );
        (SubscriptionId(id), rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().unwrap().remove(&id.0);
    }

    /// Publish to every subscriber of `topic`. Never blocks: a full subscriber queue just
    /// drops this message for that subscriber. Safe to call while holding an unrelated lock
    /// (e.g. the Alerter's evaluation lock), which is exactly how the Alerter's state-change
    /// callback uses it.
    pub fn publish(&self, topic: &str, message: T) {
        let subscribers = self.subscribers.read().unwrap();
        for sub in subscribers.values() {
            if sub.topic == topic {
                let _ = sub.sender.try_send(message.clone());
            }
        }
    }

    /// Drop every subscriber, closing their channels.
    pub fn close(&self) {
        self.subscribers.write().unwrap().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }
}

impl<T: Clone> Default for Hub<T> {
    fn default() -> Self {
        Self::new()
    }
}
