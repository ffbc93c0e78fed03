//! The single verify, store, notify path.
//!
//! Gossip, local broadcast and fraud-sync all accept proofs through
//! [`Ingestor::ingest`], so a proof behaves the same whatever its origin.

use fraud_core::SharedProof;
use fraud_verifier::ProofVerifier;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{FraudP2pError, Result};
use crate::hub::SubscriptionHub;
use crate::store::{ProofStore, PutOutcome};

/// What happened to an ingested proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Verified, stored and announced to subscribers.
    Accepted,
    /// Already stored; nothing was announced.
    AlreadyPresent,
}

/// Verifies proofs and commits the valid ones.
pub struct Ingestor {
    verifier: ProofVerifier,
    store: Arc<dyn ProofStore>,
    hub: SubscriptionHub,
    /// Held across put and notify so subscribers see acceptance order.
    order: Arc<Mutex<()>>,
}

impl Ingestor {
    /// Create an ingestor over the given verifier, store and hub.
    pub fn new(verifier: ProofVerifier, store: Arc<dyn ProofStore>, hub: SubscriptionHub) -> Self {
        Self {
            verifier,
            store,
            hub,
            order: Arc::new(Mutex::new(())),
        }
    }

    /// The store proofs are committed to.
    pub fn store(&self) -> &Arc<dyn ProofStore> {
        &self.store
    }

    /// The hub accepted proofs are announced on.
    pub fn hub(&self) -> &SubscriptionHub {
        &self.hub
    }

    /// Verify `proof`; if valid and new, store it and notify subscribers.
    ///
    /// A proof already in the store is reported as `AlreadyPresent` without
    /// fetching its header again.
    ///
    /// # Errors
    ///
    /// `Verifier` if verification fails; `Store` or `Io` if the store does.
    pub async fn ingest(&self, proof: &SharedProof) -> Result<Ingested> {
        let kind = proof.kind();
        let digest = proof.digest();

        if self.store.contains(kind, &digest)? {
            debug!(%kind, %digest, "Proof already stored");
            return Ok(Ingested::AlreadyPresent);
        }

        let verified = self.verifier.verify(proof).await?;

        // Own task, so a caller dropped mid-commit still announces what was stored.
        let commit = tokio::spawn(commit(
            self.order.clone(),
            self.store.clone(),
            self.hub.clone(),
            proof.clone(),
        ));
        let (outcome, delivered) = commit
            .await
            .map_err(|e| FraudP2pError::Store(format!("commit task failed: {}", e)))??;

        match outcome {
            PutOutcome::Accepted => {
                info!(
                    %kind,
                    height = verified.height,
                    %digest,
                    subscribers = delivered,
                    "Fraud proof accepted"
                );
                Ok(Ingested::Accepted)
            }
            PutOutcome::AlreadyPresent => {
                debug!(%kind, %digest, "Proof stored concurrently");
                Ok(Ingested::AlreadyPresent)
            }
        }
    }
}

/// Store `proof` and announce it if new. Returns the put outcome and how many
/// subscribers received it.
async fn commit(
    order: Arc<Mutex<()>>,
    store: Arc<dyn ProofStore>,
    hub: SubscriptionHub,
    proof: SharedProof,
) -> Result<(PutOutcome, usize)> {
    let _order = order.lock_owned().await;

    // File stores write and fsync here.
    let stored = proof.clone();
    let outcome = tokio::task::spawn_blocking(move || store.put(stored))
        .await
        .map_err(|e| FraudP2pError::Store(format!("store write failed: {}", e)))??;

    let delivered = match outcome {
        PutOutcome::Accepted => hub.notify(proof.kind(), &proof),
        PutOutcome::AlreadyPresent => 0,
    };
    Ok((outcome, delivered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FraudP2pError;
    use crate::store::MemoryStore;
    use crate::test_utils::{faulty_proof, honest_proof, verifier_with_headers};
    use fraud_core::{ProofDigest, ProofKind};
    use fraud_verifier::FraudVerifierError;
    use std::time::{Duration, Instant};

    /// Memory store whose puts block the calling thread.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    impl ProofStore for SlowStore {
        fn put(&self, proof: SharedProof) -> Result<PutOutcome> {
            std::thread::sleep(self.delay);
            self.inner.put(proof)
        }

        fn get(&self, kind: ProofKind) -> Result<Vec<SharedProof>> {
            self.inner.get(kind)
        }

        fn contains(&self, kind: ProofKind, digest: &ProofDigest) -> Result<bool> {
            self.inner.contains(kind, digest)
        }
    }

    fn slow_ingestor(delay: Duration) -> Arc<Ingestor> {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            delay,
        });
        Arc::new(Ingestor::new(verifier_with_headers(&[20]), store, SubscriptionHub::new(8)))
    }

    fn ingestor() -> Ingestor {
        Ingestor::new(
            verifier_with_headers(&[20, 21]),
            Arc::new(MemoryStore::new()),
            SubscriptionHub::new(8),
        )
    }

    #[tokio::test]
    async fn test_accept_then_already_present() {
        let ingestor = ingestor();
        let mut sub = ingestor.hub().subscribe(ProofKind::BadEncoding);
        let proof = faulty_proof(20);

        assert_eq!(ingestor.ingest(&proof).await.unwrap(), Ingested::Accepted);
        assert_eq!(ingestor.ingest(&proof).await.unwrap(), Ingested::AlreadyPresent);

        assert_eq!(sub.next().await.unwrap().digest(), proof.digest());
        ingestor.hub().shutdown();
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_false_accusation_not_stored_or_notified() {
        let ingestor = ingestor();
        let mut sub = ingestor.hub().subscribe(ProofKind::BadEncoding);

        let err = ingestor.ingest(&honest_proof(20)).await.unwrap_err();
        assert!(matches!(
            err,
            FraudP2pError::Verifier(FraudVerifierError::FalseAccusation { .. })
        ));
        assert!(!ingestor.store().has(ProofKind::BadEncoding).unwrap());

        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(20), sub.next()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_ingest_accepts_once() {
        let ingestor = Arc::new(ingestor());
        let proof = faulty_proof(21);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ingestor = ingestor.clone();
                let proof = proof.clone();
                tokio::spawn(async move { ingestor.ingest(&proof).await.unwrap() })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() == Ingested::Accepted {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_store_write_does_not_block_runtime() {
        let ingestor = slow_ingestor(Duration::from_millis(300));
        let proof = faulty_proof(20);

        let task = {
            let ingestor = ingestor.clone();
            tokio::spawn(async move { ingestor.ingest(&proof).await })
        };

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(!task.is_finished());

        assert_eq!(task.await.unwrap().unwrap(), Ingested::Accepted);
    }

    #[tokio::test]
    async fn test_dropped_caller_still_announces() {
        let ingestor = slow_ingestor(Duration::from_millis(100));
        let mut sub = ingestor.hub().subscribe(ProofKind::BadEncoding);
        let proof = faulty_proof(20);

        let gave_up = tokio::time::timeout(Duration::from_millis(30), ingestor.ingest(&proof)).await;
        assert!(gave_up.is_err());

        let announced = tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(announced.digest(), proof.digest());
        assert!(ingestor.store().has(ProofKind::BadEncoding).unwrap());
    }
}
