//! Fraud sync: learn about proven fraud before resuming normal operation.
//!
//! Runs once per startup, before header sync:
//!
//! 1. **LocalCheck**: a stored proof of any kind means the node already knows
//!    about fraud; startup fails with `AlreadyProven`.
//! 2. **Request**: every trusted peer is asked, concurrently, for all proofs it
//!    holds. Each returned proof goes through the shared ingestion pipeline.
//! 3. **Ready** once requests complete or time out, or **Halted** if a proof
//!    accepted during the exchange proved fraud.

use async_trait::async_trait;
use fraud_core::{ProofKind, ProofRegistry};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use libp2p::PeerId;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{FraudP2pError, Result};
use crate::guard::HaltGuard;
use crate::ingest::{Ingested, Ingestor};
use crate::protocol::{FraudSyncRequest, FraudSyncResponse, WireProof};
use crate::store::ProofStore;

/// Default bound on a single peer request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on the whole exchange.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Request-response channel to a named peer.
#[async_trait]
pub trait PeerRequestChannel: Send + Sync {
    /// Ask `peer` for its proofs of the requested kinds.
    async fn request_proofs(
        &self,
        peer: PeerId,
        request: FraudSyncRequest,
    ) -> Result<FraudSyncResponse>;
}

/// Fraud-sync states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Checking the local store
    LocalCheck,
    /// Waiting on trusted peers
    Request,
    /// No fraud known; normal operation may start
    Ready,
    /// Fraud is proven; collaborators must not start
    Halted,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocalCheck => "local-check",
            Self::Request => "request",
            Self::Ready => "ready",
            Self::Halted => "halted",
        };
        f.write_str(name)
    }
}

/// Result of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// `Ready` or `Halted`
    pub state: SyncState,
    /// Proofs newly accepted
    pub accepted: usize,
    /// Proofs that were already stored
    pub already_present: usize,
    /// Proofs that failed to decode or verify
    pub rejected: usize,
    /// Peers that were unreachable, failed or timed out
    pub failed_peers: Vec<PeerId>,
}

impl SyncOutcome {
    fn new() -> Self {
        Self {
            state: SyncState::Request,
            accepted: 0,
            already_present: 0,
            rejected: 0,
            failed_peers: Vec::new(),
        }
    }
}

/// Startup fraud-sync handler.
pub struct FraudSync {
    registry: Arc<ProofRegistry>,
    ingestor: Arc<Ingestor>,
    guard: HaltGuard,
    channel: Arc<dyn PeerRequestChannel>,
    request_timeout: Duration,
    sync_timeout: Duration,
}

impl FraudSync {
    /// Create a handler with default timeouts.
    pub fn new(
        registry: Arc<ProofRegistry>,
        ingestor: Arc<Ingestor>,
        guard: HaltGuard,
        channel: Arc<dyn PeerRequestChannel>,
    ) -> Self {
        Self {
            registry,
            ingestor,
            guard,
            channel,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }

    /// Override the per-request and overall bounds.
    pub fn with_timeouts(mut self, request_timeout: Duration, sync_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.sync_timeout = sync_timeout;
        self
    }

    /// Fail with `AlreadyProven` if the store holds a proof of any known kind.
    ///
    /// The guard is halted for that kind before returning.
    pub fn local_check(&self) -> Result<()> {
        let checked = check_store(&self.registry, self.ingestor.store().as_ref());
        if let Err(FraudP2pError::AlreadyProven { kind, .. }) = &checked {
            self.guard.reconcile(*kind)?;
        }
        checked
    }

    /// Run the whole exchange against `peers`.
    ///
    /// The overall timeout bounds both the requests and the verification of
    /// what peers return; a peer still being merged at the deadline counts as
    /// failed.
    ///
    /// # Errors
    ///
    /// `AlreadyProven` from the local check, or a store failure while merging.
    /// Peer failures are never errors; they are listed in the outcome.
    pub async fn run(&self, peers: &[PeerId]) -> Result<SyncOutcome> {
        info!(state = %SyncState::LocalCheck, "Fraud sync");
        self.local_check()?;

        let kinds = self.registry.kinds();
        let request = FraudSyncRequest::for_kinds(&kinds);
        let peers: BTreeSet<PeerId> = peers.iter().copied().collect();
        info!(state = %SyncState::Request, peers = peers.len(), "Fraud sync");

        let mut exchanges: FuturesUnordered<_> = peers
            .iter()
            .map(|&peer| self.exchange(peer, request.clone()))
            .collect();

        let mut outcome = SyncOutcome::new();
        let mut pending = peers;
        let deadline = tokio::time::Instant::now() + self.sync_timeout;

        loop {
            let (peer, exchange) = match tokio::time::timeout_at(deadline, exchanges.next()).await {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(_) => {
                    warn!(pending = pending.len(), "Fraud sync deadline reached");
                    break;
                }
            };
            pending.remove(&peer);

            match exchange {
                Exchange::Merged(tally) => {
                    let tally = tally?;
                    outcome.accepted += tally.accepted;
                    outcome.already_present += tally.already_present;
                    outcome.rejected += tally.rejected;
                }
                Exchange::Failed(e) => {
                    warn!(%peer, error = %e, "Fraud sync peer failed, skipping");
                    outcome.failed_peers.push(peer);
                }
            }
        }
        // Unfinished exchanges are dropped here, cancelling their verification.
        drop(exchanges);
        outcome.failed_peers.extend(pending);

        for kind in &kinds {
            self.guard.reconcile(*kind)?;
        }
        outcome.state = if self.guard.any_halted() {
            SyncState::Halted
        } else {
            SyncState::Ready
        };

        info!(
            state = %outcome.state,
            accepted = outcome.accepted,
            already_present = outcome.already_present,
            rejected = outcome.rejected,
            failed_peers = outcome.failed_peers.len(),
            "Fraud sync finished"
        );
        Ok(outcome)
    }

    /// Request proofs from `peer` and merge the response.
    async fn exchange(&self, peer: PeerId, request: FraudSyncRequest) -> (PeerId, Exchange) {
        let response =
            match tokio::time::timeout(self.request_timeout, self.channel.request_proofs(peer, request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return (peer, Exchange::Failed(e)),
                Err(_) => return (peer, Exchange::Failed(FraudP2pError::Timeout)),
            };
        (peer, Exchange::Merged(self.merge(peer, response).await))
    }

    /// Verify every returned proof concurrently through the ingestion pipeline.
    async fn merge(&self, peer: PeerId, response: FraudSyncResponse) -> Result<Tally> {
        debug!(%peer, proofs = response.proofs.len(), "Fraud sync response");
        let mut tally = Tally::default();

        let mut decoded = Vec::with_capacity(response.proofs.len());
        for wire in &response.proofs {
            match wire.decode(&self.registry) {
                Ok(proof) => decoded.push(proof),
                Err(e) => {
                    warn!(%peer, kind = %wire.kind, error = %e, "Skipping malformed proof");
                    tally.rejected += 1;
                }
            }
        }

        let results = join_all(decoded.iter().map(|proof| self.ingestor.ingest(proof))).await;
        for (proof, result) in decoded.iter().zip(results) {
            match result {
                Ok(Ingested::Accepted) => tally.accepted += 1,
                Ok(Ingested::AlreadyPresent) => tally.already_present += 1,
                Err(FraudP2pError::Verifier(e)) => {
                    warn!(%peer, kind = %proof.kind(), height = proof.height(), error = %e, "Skipping invalid proof");
                    tally.rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(tally)
    }
}

/// Per-peer merge counts.
#[derive(Debug, Default)]
struct Tally {
    accepted: usize,
    already_present: usize,
    rejected: usize,
}

enum Exchange {
    /// The peer answered; its proofs went through ingestion
    Merged(Result<Tally>),
    /// The request failed or timed out
    Failed(FraudP2pError),
}

/// Fail with `AlreadyProven` for the first registered kind `store` holds a proof of.
pub fn check_store(registry: &ProofRegistry, store: &dyn ProofStore) -> Result<()> {
    for kind in registry.kinds() {
        if let Some(proof) = store.get(kind)?.first() {
            return Err(FraudP2pError::AlreadyProven {
                kind,
                height: proof.height(),
                digest: proof.digest().to_hex(),
            });
        }
    }
    Ok(())
}

/// Answer a fraud-sync request from the local store.
///
/// Unknown or unregistered kinds in the request are ignored.
pub fn serve_request(
    registry: &ProofRegistry,
    store: &dyn ProofStore,
    request: &FraudSyncRequest,
) -> Result<FraudSyncResponse> {
    let kinds: BTreeSet<ProofKind> = request
        .kinds
        .iter()
        .filter_map(|name| match name.parse::<ProofKind>() {
            Ok(kind) if registry.contains(kind) => Some(kind),
            _ => {
                debug!(kind = %name, "Ignoring unknown kind in sync request");
                None
            }
        })
        .collect();

    let mut proofs = Vec::new();
    for kind in kinds {
        proofs.extend(store.get(kind)?.iter().map(WireProof::from_proof));
    }
    Ok(FraudSyncResponse { proofs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::SubscriptionHub;
    use crate::store::MemoryStore;
    use crate::test_utils::{faulty_proof, headers, honest_proof, verifier_with_headers};
    use fraud_verifier::ProofVerifier;
    use std::collections::HashMap;
    use std::time::Instant;

    enum Reply {
        Proofs(Vec<WireProof>),
        Fail,
        Hang,
    }

    #[derive(Default)]
    struct ScriptedChannel {
        replies: HashMap<PeerId, Reply>,
    }

    #[async_trait]
    impl PeerRequestChannel for ScriptedChannel {
        async fn request_proofs(&self, peer: PeerId, _request: FraudSyncRequest) -> Result<FraudSyncResponse> {
            match self.replies.get(&peer) {
                Some(Reply::Proofs(proofs)) => Ok(FraudSyncResponse { proofs: proofs.clone() }),
                Some(Reply::Hang) => futures::future::pending().await,
                Some(Reply::Fail) | None => Err(FraudP2pError::NetworkError("unreachable".into())),
            }
        }
    }

    struct Fixture {
        sync: FraudSync,
        store: Arc<MemoryStore>,
        guard: HaltGuard,
    }

    fn fixture(replies: Vec<(PeerId, Reply)>) -> Fixture {
        fixture_with(verifier_with_headers(&[20]), replies)
    }

    fn fixture_with(verifier: ProofVerifier, replies: Vec<(PeerId, Reply)>) -> Fixture {
        let registry = Arc::new(ProofRegistry::with_defaults());
        let store = Arc::new(MemoryStore::new());
        let hub = SubscriptionHub::new(8);
        let ingestor = Arc::new(Ingestor::new(verifier, store.clone(), hub.clone()));
        let guard = HaltGuard::new(&registry, store.clone(), hub);
        let channel = Arc::new(ScriptedChannel {
            replies: replies.into_iter().collect(),
        });
        let sync = FraudSync::new(registry, ingestor, guard.clone(), channel)
            .with_timeouts(Duration::from_millis(50), Duration::from_millis(200));
        Fixture { sync, store, guard }
    }

    #[tokio::test]
    async fn test_no_peers_ready() {
        let f = fixture(vec![]);
        let outcome = f.sync.run(&[]).await.unwrap();
        assert_eq!(outcome.state, SyncState::Ready);
        assert_eq!(outcome.accepted, 0);
    }

    #[tokio::test]
    async fn test_empty_peer_ready() {
        let peer = PeerId::random();
        let f = fixture(vec![(peer, Reply::Proofs(vec![]))]);
        let outcome = f.sync.run(&[peer]).await.unwrap();
        assert_eq!(outcome.state, SyncState::Ready);
        assert!(outcome.failed_peers.is_empty());
    }

    #[tokio::test]
    async fn test_proof_from_peer_halts() {
        let peer = PeerId::random();
        let wire = WireProof::from_proof(&faulty_proof(20));
        let f = fixture(vec![(peer, Reply::Proofs(vec![wire.clone(), wire]))]);

        let outcome = f.sync.run(&[peer]).await.unwrap();
        assert_eq!(outcome.state, SyncState::Halted);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.already_present, 1);
        assert!(f.guard.is_halted(ProofKind::BadEncoding));
        assert_eq!(f.store.get(ProofKind::BadEncoding).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_peers_skipped() {
        let good = PeerId::random();
        let down = PeerId::random();
        let slow = PeerId::random();
        let liar = PeerId::random();
        let f = fixture(vec![
            (good, Reply::Proofs(vec![])),
            (down, Reply::Fail),
            (slow, Reply::Hang),
            (
                liar,
                Reply::Proofs(vec![
                    WireProof::from_proof(&honest_proof(20)),
                    WireProof {
                        kind: "badencoding".into(),
                        payload: vec![0xff; 3],
                    },
                ]),
            ),
        ]);

        let outcome = f.sync.run(&[good, down, slow, liar]).await.unwrap();
        assert_eq!(outcome.state, SyncState::Ready);
        assert_eq!(outcome.rejected, 2);
        assert_eq!(outcome.failed_peers.len(), 2);
        assert!(outcome.failed_peers.contains(&down));
        assert!(outcome.failed_peers.contains(&slow));
        assert!(!f.store.has(ProofKind::BadEncoding).unwrap());
    }

    #[tokio::test]
    async fn test_many_unknown_heights_verified_concurrently() {
        let peer = PeerId::random();
        let proofs = (1000..1040).map(|h| WireProof::from_proof(&faulty_proof(h))).collect();
        let f = fixture(vec![(peer, Reply::Proofs(proofs))]);

        // Each proof waits 50ms for a header that never comes.
        let started = Instant::now();
        let outcome = f.sync.run(&[peer]).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(600));
        assert_eq!(outcome.state, SyncState::Ready);
        assert_eq!(outcome.rejected, 40);
        assert!(outcome.failed_peers.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_bounds_verification() {
        let peer = PeerId::random();
        let verifier = ProofVerifier::new(Arc::new(ProofRegistry::with_defaults()), headers(&[20]))
            .with_header_timeout(Duration::from_secs(5));
        let proofs = (1000..1010).map(|h| WireProof::from_proof(&faulty_proof(h))).collect();
        let f = fixture_with(verifier, vec![(peer, Reply::Proofs(proofs))]);

        let started = Instant::now();
        let outcome = f.sync.run(&[peer]).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(outcome.state, SyncState::Ready);
        assert_eq!(outcome.failed_peers, vec![peer]);
        assert_eq!(outcome.accepted + outcome.rejected, 0);
        assert!(!f.store.has(ProofKind::BadEncoding).unwrap());
    }

    #[tokio::test]
    async fn test_local_check_already_proven() {
        let f = fixture(vec![]);
        f.store.put(faulty_proof(20)).unwrap();

        let err = f.sync.run(&[]).await.unwrap_err();
        assert!(matches!(err, FraudP2pError::AlreadyProven { height: 20, .. }));
        assert!(f.guard.is_halted(ProofKind::BadEncoding));
    }

    #[test]
    fn test_check_store() {
        let registry = ProofRegistry::with_defaults();
        let store = MemoryStore::new();
        assert!(check_store(&registry, &store).is_ok());

        let proof = faulty_proof(20);
        store.put(proof.clone()).unwrap();
        match check_store(&registry, &store) {
            Err(FraudP2pError::AlreadyProven { kind, height, digest }) => {
                assert_eq!(kind, ProofKind::BadEncoding);
                assert_eq!(height, 20);
                assert_eq!(digest, proof.digest().to_hex());
            }
            other => panic!("expected AlreadyProven, got {:?}", other),
        }
        assert!(check_store(&ProofRegistry::new(), &store).is_ok());
    }

    #[test]
    fn test_serve_request() {
        let registry = ProofRegistry::with_defaults();
        let store = MemoryStore::new();
        store.put(faulty_proof(20)).unwrap();

        let request = FraudSyncRequest {
            kinds: vec!["badencoding".into(), "unknown".into(), "badencoding".into()],
        };
        let response = serve_request(&registry, &store, &request).unwrap();
        assert_eq!(response.proofs.len(), 1);

        let empty = serve_request(&registry, &store, &FraudSyncRequest { kinds: vec![] }).unwrap();
        assert!(empty.proofs.is_empty());
    }
}
