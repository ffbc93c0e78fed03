//! Shared fixtures for unit tests.

use fraud_core::{Axis, BadEncodingProof, ExtendedHeader, ExtendedSquare, ProofRegistry, SharedProof};
use fraud_verifier::{MemoryHeaderStore, ProofVerifier};
use std::sync::Arc;
use std::time::Duration;

/// A 4x4 block whose row 1 parity was tampered with.
pub(crate) fn faulty_square() -> ExtendedSquare {
    let shares = (0u8..16).map(|i| vec![i; 16]).collect();
    let mut square = ExtendedSquare::from_original(shares).expect("square");
    square.share_mut(1, 6).expect("share")[0] ^= 0xAA;
    square
}

/// Valid proof against row 1 of [`faulty_square`] at `height`.
pub(crate) fn faulty_proof(height: u64) -> SharedProof {
    Arc::new(BadEncodingProof::new(height, &faulty_square(), Axis::Row, 1).expect("proof"))
}

/// False accusation against the correctly encoded row 0 of [`faulty_square`].
pub(crate) fn honest_proof(height: u64) -> SharedProof {
    Arc::new(BadEncodingProof::new(height, &faulty_square(), Axis::Row, 0).expect("proof"))
}

/// Headers for [`faulty_square`] at each of `heights`.
pub(crate) fn headers(heights: &[u64]) -> Arc<MemoryHeaderStore> {
    let store = Arc::new(MemoryHeaderStore::new());
    let square = faulty_square();
    for height in heights {
        store.insert(ExtendedHeader::from_square(*height, &square));
    }
    store
}

/// A verifier that knows headers at `heights` and gives up quickly on others.
pub(crate) fn verifier_with_headers(heights: &[u64]) -> ProofVerifier {
    ProofVerifier::new(Arc::new(ProofRegistry::with_defaults()), headers(heights))
        .with_header_timeout(Duration::from_millis(50))
}
