//! Wire types for the fraud-sync request-response protocol.
//!
//! A joining node asks a trusted peer for every proof it holds of the kinds
//! the node knows. Proof payloads keep their own bincode encoding inside the
//! CBOR envelope, so a peer can relay proofs of kinds it cannot decode.

use fraud_core::{ProofKind, ProofRegistry, SharedProof};
use serde::{Deserialize, Serialize};

/// Protocol name for fraud sync.
pub const SYNC_PROTOCOL: &str = "/fraud/sync/v0.0.1";

/// Request for every stored proof of the listed kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudSyncRequest {
    /// Kind names, e.g. `"badencoding"`
    pub kinds: Vec<String>,
}

impl FraudSyncRequest {
    /// Request for the given kinds.
    pub fn for_kinds(kinds: &[ProofKind]) -> Self {
        Self {
            kinds: kinds.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// One proof on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireProof {
    /// Kind name
    pub kind: String,
    /// The kind's wire encoding of the proof
    pub payload: Vec<u8>,
}

impl WireProof {
    /// Wrap a decoded proof.
    pub fn from_proof(proof: &SharedProof) -> Self {
        Self {
            kind: proof.kind().to_string(),
            payload: proof.encode(),
        }
    }

    /// Decode through the registry.
    pub fn decode(&self, registry: &ProofRegistry) -> fraud_core::Result<SharedProof> {
        registry.decode_named(&self.kind, &self.payload)
    }
}

/// Response carrying the requested proofs; empty if the peer holds none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudSyncResponse {
    /// Proofs in the serving peer's acceptance order, grouped by kind
    pub proofs: Vec<WireProof>,
}
