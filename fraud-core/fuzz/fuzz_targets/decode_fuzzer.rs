#![no_main]
use fraud_core::{ExtendedHeader, ExtendedSquare, FraudProof, ProofKind, ProofRegistry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let registry = ProofRegistry::with_defaults();
    if let Ok(proof) = registry.decode(ProofKind::BadEncoding, data) {
        if registry.validate(&proof).is_ok() {
            let shares = (0u8..4).map(|i| vec![i; 8]).collect();
            if let Ok(square) = ExtendedSquare::from_original(shares) {
                let header = ExtendedHeader::from_square(proof.height(), &square);
                let _ = proof.verify(&header);
            }
        }
    }
});
