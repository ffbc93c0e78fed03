//! Subscription hub: in-process fan-out of accepted proofs.
//!
//! Each subscriber owns a bounded queue. `notify` never blocks: a subscriber
//! whose queue is full is disconnected and marked lagged. It must subscribe
//! again and reconcile through the store; nothing is replayed.

use fraud_core::{ProofKind, SharedProof};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default queue depth per subscriber.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 32;

struct Slot {
    id: u64,
    tx: mpsc::Sender<SharedProof>,
    lagged: Arc<AtomicBool>,
}

struct HubInner {
    buffer: usize,
    next_id: AtomicU64,
    closed: AtomicBool,
    slots: Mutex<HashMap<ProofKind, Vec<Slot>>>,
}

impl HubInner {
    fn remove(&self, kind: ProofKind, id: u64) {
        if let Ok(mut slots) = self.slots.lock() {
            if let Some(list) = slots.get_mut(&kind) {
                list.retain(|slot| slot.id != id);
            }
        }
    }
}

/// Fan-out point between the ingestion pipeline and in-process listeners.
#[derive(Clone)]
pub struct SubscriptionHub {
    inner: Arc<HubInner>,
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl SubscriptionHub {
    /// Create a hub whose subscribers each buffer up to `buffer` proofs.
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                buffer: buffer.max(1),
                next_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a listener for proofs of `kind` accepted from now on.
    ///
    /// After [`SubscriptionHub::shutdown`] the returned subscription is already
    /// at end of stream.
    pub fn subscribe(&self, kind: ProofKind) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let lagged = Arc::new(AtomicBool::new(false));

        if let Ok(mut slots) = self.inner.slots.lock() {
            // Checked under the lock so a concurrent shutdown cannot miss this slot.
            if !self.inner.closed.load(Ordering::Acquire) {
                slots.entry(kind).or_default().push(Slot {
                    id,
                    tx,
                    lagged: lagged.clone(),
                });
            }
        }

        debug!(%kind, id, "Subscriber registered");
        Subscription {
            kind,
            id,
            rx,
            lagged,
            hub: Arc::downgrade(&self.inner),
            closed: false,
        }
    }

    /// Deliver `proof` to every live subscriber of `kind` without blocking.
    ///
    /// Returns the number of subscribers that received it.
    pub fn notify(&self, kind: ProofKind, proof: &SharedProof) -> usize {
        let Ok(mut slots) = self.inner.slots.lock() else {
            return 0;
        };
        let Some(list) = slots.get_mut(&kind) else {
            return 0;
        };

        let mut delivered = 0;
        list.retain(|slot| match slot.tx.try_send(proof.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                slot.lagged.store(true, Ordering::Release);
                warn!(%kind, id = slot.id, "Subscriber lagging, disconnected");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        delivered
    }

    /// Number of live subscribers of `kind`.
    pub fn subscriber_count(&self, kind: ProofKind) -> usize {
        self.inner
            .slots
            .lock()
            .ok()
            .and_then(|slots| slots.get(&kind).map(Vec::len))
            .unwrap_or(0)
    }

    /// End every subscription. Later subscriptions end immediately.
    pub fn shutdown(&self) {
        if let Ok(mut slots) = self.inner.slots.lock() {
            self.inner.closed.store(true, Ordering::Release);
            slots.clear();
        }
        debug!("Subscription hub shut down");
    }
}

/// A listener's handle: a stream of proofs of one kind in acceptance order.
pub struct Subscription {
    kind: ProofKind,
    id: u64,
    rx: mpsc::Receiver<SharedProof>,
    lagged: Arc<AtomicBool>,
    hub: Weak<HubInner>,
    closed: bool,
}

impl Subscription {
    /// Kind this subscription listens to.
    pub fn kind(&self) -> ProofKind {
        self.kind
    }

    /// Next proof, or `None` once closed, disconnected or shut down.
    ///
    /// Proofs queued before a disconnect are still delivered first.
    pub async fn next(&mut self) -> Option<SharedProof> {
        self.rx.recv().await
    }

    /// Whether the hub dropped this subscription for falling behind.
    pub fn is_lagged(&self) -> bool {
        self.lagged.load(Ordering::Acquire)
    }

    /// Stop receiving. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.rx.close();
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.kind, self.id);
        }
    }
}

impl Stream for Subscription {
    type Item = SharedProof;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("lagged", &self.is_lagged())
            .finish()
    }
}
