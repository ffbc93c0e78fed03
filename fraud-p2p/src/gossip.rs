//! Gossip adapter: the only validator between the pub/sub wire and the store.
//!
//! Inbound messages are decoded, checked against the rejected-digest cache,
//! then run through the ingestion pipeline. The outcome tells the transport
//! whether to keep propagating the message.

use async_trait::async_trait;
use fraud_core::{ProofDigest, ProofKind, ProofRegistry, SharedProof};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

use crate::cache::{RejectedCache, RejectedProof};
use crate::error::{FraudP2pError, Result};
use crate::ingest::{Ingested, Ingestor};

/// Publishing side of the pub/sub transport.
#[async_trait]
pub trait GossipTransport: Send + Sync {
    /// Publish `data` on `topic`.
    async fn publish(&self, topic: String, data: Vec<u8>) -> Result<()>;
}

/// Verdict on an inbound gossip message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// New valid proof: keep propagating.
    Accept,
    /// Invalid: drop and penalise the sender.
    Reject,
    /// Drop without penalty: duplicate, or not checkable yet.
    Ignore,
}

/// Bridges the ingestion pipeline to the pub/sub transport.
pub struct GossipAdapter {
    registry: Arc<ProofRegistry>,
    ingestor: Arc<Ingestor>,
    transport: Arc<dyn GossipTransport>,
    rejected: Mutex<RejectedCache>,
}

impl GossipAdapter {
    /// Create an adapter remembering up to `rejected_cache_size` rejected digests.
    pub fn new(
        registry: Arc<ProofRegistry>,
        ingestor: Arc<Ingestor>,
        transport: Arc<dyn GossipTransport>,
        rejected_cache_size: usize,
    ) -> Self {
        Self {
            registry,
            ingestor,
            transport,
            rejected: Mutex::new(RejectedCache::with_capacity(rejected_cache_size)),
        }
    }

    /// Topics to join, one per registered kind.
    pub fn topics(&self) -> Vec<String> {
        self.registry.kinds().iter().map(ProofKind::topic).collect()
    }

    /// Validate a message received on `topic`.
    pub async fn on_topic(&self, topic: &str, data: &[u8]) -> ValidationOutcome {
        match ProofKind::from_topic(topic) {
            Some(kind) => self.on_receive(kind, data).await,
            None => {
                debug!(topic, "Message on unknown topic");
                ValidationOutcome::Reject
            }
        }
    }

    /// Validate a message carrying a proof of `kind`.
    pub async fn on_receive(&self, kind: ProofKind, data: &[u8]) -> ValidationOutcome {
        let proof = match self.registry.decode(kind, data) {
            Ok(proof) => proof,
            Err(e) => {
                debug!(%kind, error = %e, "Rejecting undecodable proof");
                return ValidationOutcome::Reject;
            }
        };

        let digest = proof.digest();
        if self.was_rejected(&proof) {
            debug!(%kind, %digest, "Rejecting previously rejected proof");
            return ValidationOutcome::Reject;
        }

        match self.ingestor.ingest(&proof).await {
            Ok(Ingested::Accepted) => ValidationOutcome::Accept,
            Ok(Ingested::AlreadyPresent) => ValidationOutcome::Ignore,
            Err(FraudP2pError::Verifier(e)) if e.is_recoverable() => {
                debug!(%kind, %digest, error = %e, "Ignoring proof for now");
                ValidationOutcome::Ignore
            }
            Err(FraudP2pError::Verifier(e)) => {
                warn!(%kind, height = proof.height(), %digest, error = %e, "Rejecting invalid proof");
                if let Ok(mut rejected) = self.rejected.lock() {
                    rejected.insert(digest, RejectedProof::new(kind, proof.height(), e.to_string()));
                }
                ValidationOutcome::Reject
            }
            Err(e) => {
                // Local failure; the sender did nothing wrong.
                error!(%kind, %digest, error = %e, "Failed to ingest proof");
                ValidationOutcome::Ignore
            }
        }
    }

    /// Verify, store and notify a locally produced proof, then publish it.
    ///
    /// A proof that is already stored is not published again.
    pub async fn broadcast(&self, proof: SharedProof) -> Result<Ingested> {
        let outcome = self.ingestor.ingest(&proof).await?;
        if outcome == Ingested::Accepted {
            self.transport
                .publish(proof.kind().topic(), proof.encode())
                .await?;
            debug!(kind = %proof.kind(), digest = %proof.digest(), "Published proof");
        }
        Ok(outcome)
    }

    /// Whether the proof with `digest` was recently rejected here.
    pub fn is_rejected(&self, digest: &ProofDigest) -> bool {
        self.rejected
            .lock()
            .map(|mut rejected| rejected.get(digest).is_some())
            .unwrap_or(false)
    }

    fn was_rejected(&self, proof: &SharedProof) -> bool {
        self.is_rejected(&proof.digest())
    }
}
