// Broadcaster - bounded fan-out of serialized certificate messages
//
// The subscriber set is an immutable snapshot swapped copy-on-write under
// a write lock; submission clones the snapshot handle and iterates it
// without holding any lock. Each subscriber owns a bounded queue and a
// full queue drops the message for that subscriber only.

use crate::message::CertMessage;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

#[derive(Clone)]
struct Slot {
    id: u64,
    tx: mpsc::Sender<Bytes>,
}

/// Fan-out hub between the follower pool and WebSocket subscribers
pub struct Broadcaster {
    subs: RwLock<Arc<Vec<Slot>>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

/// One subscriber's receive side, bounded to the configured capacity.
/// Lifetime spans exactly one WebSocket connection; callers release it
/// with [`Broadcaster::leave`] when done.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Bytes>,
}

impl Subscription {
    /// Next serialized message, or `None` once the subscription has been
    /// released and the buffered backlog is drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

impl Broadcaster {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subs: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(0),
            buffer_size,
        }
    }

    /// Register a new subscriber and hand back its queue.
    pub fn join(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer_size);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subs.write().expect("subscriber set lock poisoned");
        let mut next = Vec::with_capacity(subs.len() + 1);
        next.extend(subs.iter().cloned());
        next.push(Slot { id, tx });
        *subs = Arc::new(next);
        Subscription { id, rx }
    }

    /// Unregister a subscriber. Messages already buffered can still be
    /// drained, after which the consumer observes end-of-stream.
    pub fn leave(&self, sub: &Subscription) {
        let mut subs = self.subs.write().expect("subscriber set lock poisoned");
        let next: Vec<Slot> = subs.iter().filter(|s| s.id != sub.id).cloned().collect();
        *subs = Arc::new(next);
    }

    /// Serialize once and offer the payload to every current subscriber.
    /// Never blocks: a full or closed queue drops the message for that
    /// subscriber alone.
    pub fn submit(&self, msg: &CertMessage) {
        let payload =
            Bytes::from(serde_json::to_vec(msg).expect("certificate message serializes"));
        let snapshot = Arc::clone(&self.subs.read().expect("subscriber set lock poisoned"));
        for slot in snapshot.iter() {
            let _ = slot.tx.try_send(payload.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subs
            .read()
            .expect("subscriber set lock poisoned")
            .len()
    }
}
