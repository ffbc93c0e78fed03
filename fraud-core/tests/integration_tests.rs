//! End-to-end checks of the proof model: build a faulty square, detect it,
//! ship the proof through the registry and verify it against the header.

use fraud_core::{
    Axis, BadEncodingProof, ExtendedHeader, ExtendedSquare, FraudError, FraudProof, ProofKind,
    ProofRegistry,
};

fn original(k: usize, len: usize) -> Vec<Vec<u8>> {
    (0..k * k)
        .map(|i| (0..len).map(|b| (i * 31 + b * 7) as u8).collect())
        .collect()
}

#[test]
fn test_detect_ship_verify() {
    let mut square = ExtendedSquare::from_original(original(8, 32)).unwrap();
    square.share_mut(5, 12).unwrap()[7] ^= 0x42;
    let header = ExtendedHeader::from_square(20, &square);

    let proof = BadEncodingProof::detect(20, &square).unwrap().unwrap();
    assert_eq!((proof.axis, proof.index), (Axis::Row, 5));

    let registry = ProofRegistry::with_defaults();
    let decoded = registry
        .decode(ProofKind::BadEncoding, &proof.encode())
        .unwrap();
    registry.validate(&decoded).unwrap();
    decoded.verify(&header).unwrap();
    assert_eq!(decoded.digest(), proof.digest());
}

#[test]
fn test_honest_square_yields_no_proof_and_rejects_accusations() {
    let square = ExtendedSquare::from_original(original(4, 16)).unwrap();
    let header = ExtendedHeader::from_square(9, &square);
    assert!(BadEncodingProof::detect(9, &square).unwrap().is_none());

    for axis in [Axis::Row, Axis::Column] {
        for index in 0..square.width() {
            let accusation = BadEncodingProof::new(9, &square, axis, index).unwrap();
            assert!(matches!(
                accusation.verify(&header),
                Err(FraudError::FalseAccusation { .. })
            ));
        }
    }
}

#[test]
fn test_proof_against_other_block_header() {
    let mut faulty = ExtendedSquare::from_original(original(4, 16)).unwrap();
    faulty.share_mut(0, 0).unwrap()[0] ^= 1;
    let proof = BadEncodingProof::new(20, &faulty, Axis::Row, 0).unwrap();

    let other = ExtendedSquare::from_original(original(4, 17)).unwrap();
    let header = ExtendedHeader::from_square(20, &other);
    assert!(matches!(
        proof.verify(&header),
        Err(FraudError::InvalidWitness(_))
    ));
}

#[test]
fn test_proof_for_narrower_square() {
    let mut small = ExtendedSquare::from_original(original(2, 8)).unwrap();
    small.share_mut(0, 2).unwrap()[0] ^= 1;
    let proof = BadEncodingProof::new(1, &small, Axis::Row, 0).unwrap();

    let big = ExtendedSquare::from_original(original(4, 8)).unwrap();
    let header = ExtendedHeader::from_square(1, &big);
    assert!(matches!(
        proof.verify(&header),
        Err(FraudError::InvalidWitness(_))
    ));
}

#[test]
fn test_truncated_payload_is_malformed() {
    let mut square = ExtendedSquare::from_original(original(2, 8)).unwrap();
    square.share_mut(3, 3).unwrap()[0] ^= 1;
    let payload = BadEncodingProof::detect(1, &square)
        .unwrap()
        .unwrap()
        .encode();

    let registry = ProofRegistry::with_defaults();
    let err = registry
        .decode(ProofKind::BadEncoding, &payload[..payload.len() / 2])
        .unwrap_err();
    assert!(matches!(err, FraudError::MalformedPayload(_)));
}
