//! Lifecycle guard: signals, once per kind, that fraud has been proven.
//!
//! The guard watches the subscription hub. The first accepted proof of a kind
//! flips that kind's halt flag and fires every registered callback exactly
//! once. Long-running collaborators (header syncer, sampler) either register a
//! callback or poll [`HaltGuard::is_halted`] and stop all further height
//! progress.

use fraud_core::{FraudError, ProofDigest, ProofKind, ProofRegistry, SharedProof};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{FraudP2pError, Result};
use crate::hub::SubscriptionHub;
use crate::store::ProofStore;

/// Callback fired when a kind becomes proven.
pub type HaltCallback = Box<dyn FnOnce(&HaltNotice) + Send + 'static>;

/// The proof that triggered a halt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaltNotice {
    /// Proven kind
    pub kind: ProofKind,
    /// Height the triggering proof accuses
    pub height: u64,
    /// Digest of the triggering proof
    pub digest: ProofDigest,
}

struct KindState {
    halted: AtomicBool,
    notice: OnceLock<HaltNotice>,
    callbacks: Mutex<Vec<HaltCallback>>,
    fired: watch::Sender<bool>,
}

impl KindState {
    fn new() -> Self {
        let (fired, _) = watch::channel(false);
        Self {
            halted: AtomicBool::new(false),
            notice: OnceLock::new(),
            callbacks: Mutex::new(Vec::new()),
            fired,
        }
    }
}

struct GuardInner {
    store: Arc<dyn ProofStore>,
    hub: SubscriptionHub,
    states: BTreeMap<ProofKind, KindState>,
    stopped: watch::Sender<bool>,
}

/// Per-kind, set-once halt flags with callbacks.
#[derive(Clone)]
pub struct HaltGuard {
    inner: Arc<GuardInner>,
}

impl HaltGuard {
    /// Create a guard for every kind in `registry`.
    pub fn new(registry: &ProofRegistry, store: Arc<dyn ProofStore>, hub: SubscriptionHub) -> Self {
        let states = registry
            .kinds()
            .into_iter()
            .map(|kind| (kind, KindState::new()))
            .collect();
        let (stopped, _) = watch::channel(false);
        Self {
            inner: Arc::new(GuardInner {
                store,
                hub,
                states,
                stopped,
            }),
        }
    }

    /// Start watching the hub, one task per kind.
    ///
    /// Each task subscribes before reconciling with the store, so a proof
    /// accepted in between is seen one way or the other.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.inner
            .states
            .keys()
            .map(|&kind| {
                let guard = self.clone();
                tokio::spawn(async move { guard.watch(kind).await })
            })
            .collect()
    }

    async fn watch(&self, kind: ProofKind) {
        loop {
            let mut subscription = self.inner.hub.subscribe(kind);
            if let Err(e) = self.reconcile(kind) {
                error!(%kind, error = %e, "Halt guard could not read the store");
            }

            while let Some(proof) = subscription.next().await {
                self.trigger(kind, &proof);
            }

            if subscription.is_lagged() {
                warn!(%kind, "Halt guard subscription lagged, re-subscribing");
                continue;
            }
            debug!(%kind, "Halt guard stopped");
            return;
        }
    }

    /// Halt `kind` if the store already holds a proof of it.
    ///
    /// Returns whether `kind` is halted afterwards.
    pub fn reconcile(&self, kind: ProofKind) -> Result<bool> {
        if self.is_halted(kind) {
            return Ok(true);
        }
        if let Some(proof) = self.inner.store.get(kind)?.first() {
            self.trigger(kind, proof);
        }
        Ok(self.is_halted(kind))
    }

    /// Register `callback` for the first proof of `kind`.
    ///
    /// Fires immediately if `kind` is already proven, including when the store
    /// holds a proof the guard has not seen yet.
    ///
    /// # Errors
    ///
    /// `UnknownKind` if `kind` is not registered.
    pub fn on_halt<F>(&self, kind: ProofKind, callback: F) -> Result<()>
    where
        F: FnOnce(&HaltNotice) + Send + 'static,
    {
        let state = self.state(kind)?;
        self.reconcile(kind)?;

        let mut callbacks = state
            .callbacks
            .lock()
            .map_err(|_| FraudP2pError::Store("halt guard lock poisoned".into()))?;
        match state.notice.get() {
            Some(notice) if state.halted.load(Ordering::Acquire) => {
                let notice = notice.clone();
                drop(callbacks);
                callback(&notice);
            }
            _ => callbacks.push(Box::new(callback)),
        }
        Ok(())
    }

    /// Whether `kind` has been proven. Unknown kinds are never halted.
    pub fn is_halted(&self, kind: ProofKind) -> bool {
        self.inner
            .states
            .get(&kind)
            .is_some_and(|state| state.halted.load(Ordering::Acquire))
    }

    /// Whether any kind has been proven.
    pub fn any_halted(&self) -> bool {
        self.inner.states.keys().any(|&kind| self.is_halted(kind))
    }

    /// The proof that halted `kind`, if any.
    pub fn halt_notice(&self, kind: ProofKind) -> Option<HaltNotice> {
        self.inner
            .states
            .get(&kind)
            .and_then(|state| state.notice.get().cloned())
    }

    /// Wait until `kind` is proven.
    ///
    /// # Errors
    ///
    /// `UnknownKind` if `kind` is not registered; `ServiceStopped` if the guard
    /// is stopped before `kind` is proven.
    pub async fn wait_halted(&self, kind: ProofKind) -> Result<HaltNotice> {
        let state = self.state(kind)?;
        let mut fired = state.fired.subscribe();
        let mut stopped = self.inner.stopped.subscribe();

        tokio::select! {
            biased;
            result = fired.wait_for(|fired| *fired) => {
                result.map_err(|_| FraudP2pError::ServiceStopped)?;
            }
            _ = stopped.wait_for(|stopped| *stopped) => {}
        }

        state.notice.get().cloned().ok_or(FraudP2pError::ServiceStopped)
    }

    /// Release every `wait_halted` caller still waiting.
    pub fn stop(&self) {
        self.inner.stopped.send_replace(true);
    }

    fn state(&self, kind: ProofKind) -> Result<&KindState> {
        self.inner
            .states
            .get(&kind)
            .ok_or_else(|| FraudError::UnknownKind(kind.to_string()).into())
    }

    fn trigger(&self, kind: ProofKind, proof: &SharedProof) {
        let Some(state) = self.inner.states.get(&kind) else {
            return;
        };

        let Ok(mut callbacks) = state.callbacks.lock() else {
            return;
        };
        if state.halted.load(Ordering::Acquire) {
            return;
        }

        let notice = HaltNotice {
            kind,
            height: proof.height(),
            digest: proof.digest(),
        };
        let _ = state.notice.set(notice.clone());
        state.halted.store(true, Ordering::Release);
        let pending = std::mem::take(&mut *callbacks);
        drop(callbacks);

        info!(%kind, height = notice.height, digest = %notice.digest, "Fraud proven, halting");
        state.fired.send_replace(true);
        for callback in pending {
            callback(&notice);
        }
    }
}
