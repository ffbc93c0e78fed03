//! The fraud service: one object owning the whole subsystem.
//!
//! Composes the registry, verifier, store, hub, ingestion pipeline, gossip
//! adapter, halt guard and fraud sync, and exposes the public API.

use fraud_core::{ProofKind, ProofRegistry, SharedProof};
use fraud_verifier::{HeaderProvider, ProofVerifier};
use libp2p::PeerId;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::FraudConfig;
use crate::error::{FraudP2pError, Result};
use crate::gossip::{GossipAdapter, GossipTransport, ValidationOutcome};
use crate::guard::{HaltGuard, HaltNotice};
use crate::hub::{Subscription, SubscriptionHub};
use crate::ingest::{Ingested, Ingestor};
use crate::protocol::{FraudSyncRequest, FraudSyncResponse};
use crate::store::{FileStore, MemoryStore, ProofStore};
use crate::sync::{serve_request, FraudSync, PeerRequestChannel, SyncOutcome};

struct ServiceInner {
    registry: Arc<ProofRegistry>,
    store: Arc<dyn ProofStore>,
    hub: SubscriptionHub,
    gossip: GossipAdapter,
    guard: HaltGuard,
    sync: FraudSync,
    trusted_peers: Vec<PeerId>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Fraud proof service.
///
/// Cheap to clone; clones share one subsystem.
///
/// # Example
///
/// ```rust,no_run
/// use fraud_p2p::{FraudP2pError, FraudService, SyncState};
///
/// # async fn run(service: FraudService) -> Result<(), FraudP2pError> {
/// let outcome = service.start().await?;
/// if outcome.state == SyncState::Halted {
///     println!("fraud proven during sync, not starting the syncer");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FraudService {
    inner: Arc<ServiceInner>,
}

impl FraudService {
    /// Build the service over the given collaborators.
    ///
    /// # Errors
    ///
    /// `Config` if `config` fails validation or names a malformed trusted peer.
    pub fn new(
        config: &FraudConfig,
        registry: Arc<ProofRegistry>,
        store: Arc<dyn ProofStore>,
        headers: Arc<dyn HeaderProvider>,
        transport: Arc<dyn GossipTransport>,
        channel: Arc<dyn PeerRequestChannel>,
    ) -> Result<Self> {
        config.validate()?;
        let trusted_peers = config
            .trusted_peer_addrs()?
            .into_iter()
            .map(|(peer, _)| peer)
            .collect();

        let hub = SubscriptionHub::new(config.subscriber_buffer);
        let verifier = ProofVerifier::new(registry.clone(), headers)
            .with_header_timeout(config.header_timeout());
        let ingestor = Arc::new(Ingestor::new(verifier, store.clone(), hub.clone()));
        let gossip = GossipAdapter::new(
            registry.clone(),
            ingestor.clone(),
            transport,
            config.rejected_cache_size,
        );
        let guard = HaltGuard::new(&registry, store.clone(), hub.clone());
        let sync = FraudSync::new(registry.clone(), ingestor, guard.clone(), channel)
            .with_timeouts(config.sync_request_timeout(), config.sync_timeout());

        Ok(Self {
            inner: Arc::new(ServiceInner {
                registry,
                store,
                hub,
                gossip,
                guard,
                sync,
                trusted_peers,
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Open the store `config` asks for: a file store under `store_path`, or memory.
    pub fn open_store(config: &FraudConfig, registry: Arc<ProofRegistry>) -> Result<Arc<dyn ProofStore>> {
        match &config.store_path {
            Some(path) => Ok(Arc::new(FileStore::open(path, registry)?)),
            None => Ok(Arc::new(MemoryStore::new())),
        }
    }

    /// Start the halt guard and run fraud sync against the configured trusted peers.
    ///
    /// # Errors
    ///
    /// `AlreadyProven` if the store already holds a proof. The guard is halted
    /// for that kind and `get` still serves the stored proofs.
    pub async fn start(&self) -> Result<SyncOutcome> {
        self.start_with_peers(&self.inner.trusted_peers).await
    }

    /// Like [`FraudService::start`], syncing from `peers` instead of the configured ones.
    pub async fn start_with_peers(&self, peers: &[PeerId]) -> Result<SyncOutcome> {
        self.spawn_guard()?;
        info!(kinds = self.inner.registry.kinds().len(), "Fraud service starting");
        self.inner.sync.run(peers).await
    }

    fn spawn_guard(&self) -> Result<()> {
        let mut tasks = self
            .inner
            .tasks
            .lock()
            .map_err(|_| FraudP2pError::Store("service task lock poisoned".into()))?;
        if tasks.is_empty() {
            tasks.extend(self.inner.guard.start());
        }
        Ok(())
    }

    /// End every subscription, release halt waiters and stop background tasks.
    pub fn stop(&self) {
        self.inner.hub.shutdown();
        self.inner.guard.stop();
        if let Ok(mut tasks) = self.inner.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        info!("Fraud service stopped");
    }

    /// Listen for proofs of `kind` accepted from now on.
    ///
    /// # Errors
    ///
    /// `UnknownKind` if `kind` is not registered.
    pub fn subscribe(&self, kind: ProofKind) -> Result<Subscription> {
        self.ensure_known(kind)?;
        Ok(self.inner.hub.subscribe(kind))
    }

    /// Every stored proof of `kind`, in acceptance order.
    pub fn get(&self, kind: ProofKind) -> Result<Vec<SharedProof>> {
        self.ensure_known(kind)?;
        self.inner.store.get(kind)
    }

    /// Verify, store and publish a locally produced proof.
    pub async fn broadcast(&self, proof: SharedProof) -> Result<Ingested> {
        self.ensure_known(proof.kind())?;
        self.inner.gossip.broadcast(proof).await
    }

    /// Register `callback` for the first proof of `kind`.
    pub fn on_halt<F>(&self, kind: ProofKind, callback: F) -> Result<()>
    where
        F: FnOnce(&HaltNotice) + Send + 'static,
    {
        self.inner.guard.on_halt(kind, callback)
    }

    /// Validate an inbound gossip message.
    pub async fn on_gossip(&self, topic: &str, data: &[u8]) -> ValidationOutcome {
        self.inner.gossip.on_topic(topic, data).await
    }

    /// Answer a peer's fraud-sync request.
    pub fn sync_response(&self, request: &FraudSyncRequest) -> Result<FraudSyncResponse> {
        let response = serve_request(&self.inner.registry, self.inner.store.as_ref(), request)?;
        debug!(proofs = response.proofs.len(), "Serving fraud sync request");
        Ok(response)
    }

    /// The halt guard.
    pub fn guard(&self) -> &HaltGuard {
        &self.inner.guard
    }

    /// The gossip adapter.
    pub fn gossip(&self) -> &GossipAdapter {
        &self.inner.gossip
    }

    /// The proof kind registry.
    pub fn registry(&self) -> &Arc<ProofRegistry> {
        &self.inner.registry
    }

    /// Gossip topics to join.
    pub fn topics(&self) -> Vec<String> {
        self.inner.gossip.topics()
    }

    fn ensure_known(&self, kind: ProofKind) -> Result<()> {
        if self.inner.registry.contains(kind) {
            Ok(())
        } else {
            Err(fraud_core::FraudError::UnknownKind(kind.to_string()).into())
        }
    }
}
