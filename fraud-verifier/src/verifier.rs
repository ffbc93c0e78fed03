//! Proof verifier: the main public API.
//!
//! Checks a decoded proof in three steps: structural validation through the
//! registry, a bounded wait for the accused header, then the kind's own
//! recheck of the accusation against that header.

use fraud_core::{ProofRegistry, SharedProof};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{FraudVerifierError, Result};
use crate::header::HeaderProvider;
use crate::result::Verified;

/// Default bound on the header wait.
pub const DEFAULT_HEADER_TIMEOUT: Duration = Duration::from_secs(5);

/// Verifies fraud proofs against headers.
///
/// Verification is stateless: it never touches a proof store and any number
/// of verifications may run in parallel on one instance.
///
/// # Example
///
/// ```rust
/// use fraud_core::{BadEncodingProof, ExtendedHeader, ExtendedSquare, ProofRegistry, SharedProof};
/// use fraud_verifier::{MemoryHeaderStore, ProofVerifier};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let shares = (0u8..4).map(|i| vec![i; 8]).collect();
///     let mut square = ExtendedSquare::from_original(shares).unwrap();
///     square.share_mut(1, 2).unwrap()[0] ^= 1;
///
///     let headers = Arc::new(MemoryHeaderStore::new());
///     headers.insert(ExtendedHeader::from_square(20, &square));
///
///     let verifier = ProofVerifier::new(Arc::new(ProofRegistry::with_defaults()), headers);
///     let proof: SharedProof = Arc::new(BadEncodingProof::detect(20, &square).unwrap().unwrap());
///
///     let verified = verifier.verify(&proof).await.unwrap();
///     assert_eq!(verified.height, 20);
/// }
/// ```
#[derive(Clone)]
pub struct ProofVerifier {
    registry: Arc<ProofRegistry>,
    headers: Arc<dyn HeaderProvider>,
    header_timeout: Duration,
}

impl ProofVerifier {
    /// Create a verifier with the default header timeout.
    pub fn new(registry: Arc<ProofRegistry>, headers: Arc<dyn HeaderProvider>) -> Self {
        Self {
            registry,
            headers,
            header_timeout: DEFAULT_HEADER_TIMEOUT,
        }
    }

    /// Set the bound on the header wait.
    pub fn with_header_timeout(mut self, timeout: Duration) -> Self {
        self.header_timeout = timeout;
        self
    }

    /// The registry used for structural checks.
    pub fn registry(&self) -> &Arc<ProofRegistry> {
        &self.registry
    }

    /// Verify a decoded proof.
    ///
    /// # Errors
    ///
    /// - `Malformed` or `UnknownKind` if the structural checks fail
    /// - `HeaderUnavailable` (recoverable) if the header does not arrive in time
    /// - `InvalidWitness` if the witness does not open against the header
    /// - `FalseAccusation` if the header's committed values are correct
    pub async fn verify(&self, proof: &SharedProof) -> Result<Verified> {
        let start = Instant::now();
        let kind = proof.kind();
        let height = proof.height();

        // Step 1: Structural checks
        self.registry.validate(proof)?;

        // Step 2: Bounded header wait
        let header = match tokio::time::timeout(
            self.header_timeout,
            self.headers.get_by_height(height),
        )
        .await
        {
            Ok(Ok(header)) => header,
            Ok(Err(e)) => {
                debug!(%kind, height, error = %e, "Header provider failed");
                return Err(FraudVerifierError::HeaderUnavailable {
                    height,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                debug!(%kind, height, timeout = ?self.header_timeout, "Header wait timed out");
                return Err(FraudVerifierError::HeaderUnavailable {
                    height,
                    reason: format!("no header within {:?}", self.header_timeout),
                });
            }
        };
        let header_wait = start.elapsed();

        // Step 3: Recheck the accusation
        let check_start = Instant::now();
        proof.verify(&header)?;

        let verified = Verified {
            kind,
            height,
            digest: proof.digest(),
            header_wait,
            verification_time: check_start.elapsed(),
        };
        debug!(%kind, height, digest = %verified.digest, "Proof verified");
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::MemoryHeaderStore;
    use fraud_core::{Axis, BadEncodingProof, ExtendedHeader, ExtendedSquare};

    fn square(faulty: bool) -> ExtendedSquare {
        let shares = (0u8..16).map(|i| vec![i; 8]).collect();
        let mut square = ExtendedSquare::from_original(shares).unwrap();
        if faulty {
            square.share_mut(2, 5).unwrap()[1] ^= 0x10;
        }
        square
    }

    fn setup(square: &ExtendedSquare) -> ProofVerifier {
        let headers = Arc::new(MemoryHeaderStore::new());
        headers.insert(ExtendedHeader::from_square(20, square));
        ProofVerifier::new(Arc::new(ProofRegistry::with_defaults()), headers)
            .with_header_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_verified() {
        let sq = square(true);
        let verifier = setup(&sq);
        let proof: SharedProof = Arc::new(BadEncodingProof::new(20, &sq, Axis::Row, 2).unwrap());

        let verified = verifier.verify(&proof).await.unwrap();
        assert_eq!(verified.height, 20);
        assert_eq!(verified.digest, proof.digest());
    }

    #[tokio::test]
    async fn test_false_accusation() {
        let sq = square(false);
        let verifier = setup(&sq);
        let proof: SharedProof = Arc::new(BadEncodingProof::new(20, &sq, Axis::Row, 2).unwrap());

        let err = verifier.verify(&proof).await.unwrap_err();
        assert!(matches!(err, FraudVerifierError::FalseAccusation { height: 20, .. }));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_header_timeout_is_recoverable() {
        let sq = square(true);
        let verifier = setup(&sq);
        let proof: SharedProof = Arc::new(BadEncodingProof::new(21, &sq, Axis::Row, 2).unwrap());

        let err = verifier.verify(&proof).await.unwrap_err();
        assert!(matches!(err, FraudVerifierError::HeaderUnavailable { height: 21, .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_malformed_before_header_fetch() {
        let sq = square(true);
        let verifier = setup(&sq);
        let mut proof = BadEncodingProof::new(99, &sq, Axis::Row, 2).unwrap();
        proof.shares.clear();
        let proof: SharedProof = Arc::new(proof);

        // Height 99 has no header; a structural failure must surface first.
        let err = verifier.verify(&proof).await.unwrap_err();
        assert!(matches!(err, FraudVerifierError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unregistered_kind() {
        let sq = square(true);
        let headers = Arc::new(MemoryHeaderStore::new());
        let verifier = ProofVerifier::new(Arc::new(ProofRegistry::new()), headers);
        let proof: SharedProof = Arc::new(BadEncodingProof::new(20, &sq, Axis::Row, 2).unwrap());

        let err = verifier.verify(&proof).await.unwrap_err();
        assert!(matches!(err, FraudVerifierError::UnknownKind(_)));
    }
}
