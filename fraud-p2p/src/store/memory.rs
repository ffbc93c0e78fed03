//! In-process proof store.

use fraud_core::{ProofDigest, ProofKind, SharedProof};
use std::sync::Mutex;
use tracing::debug;

use super::{ProofIndex, ProofStore, PutOutcome};
use crate::error::{FraudP2pError, Result};

/// Proof store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: Mutex<ProofIndex>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ProofIndex>> {
        self.index
            .lock()
            .map_err(|_| FraudP2pError::Store("store lock poisoned".into()))
    }
}

impl ProofStore for MemoryStore {
    fn put(&self, proof: SharedProof) -> Result<PutOutcome> {
        let digest = proof.digest();
        let kind = proof.kind();
        if self.lock()?.insert(proof, digest) {
            debug!(%kind, %digest, "Stored proof");
            Ok(PutOutcome::Accepted)
        } else {
            Ok(PutOutcome::AlreadyPresent)
        }
    }

    fn get(&self, kind: ProofKind) -> Result<Vec<SharedProof>> {
        Ok(self.lock()?.get(kind))
    }

    fn contains(&self, kind: ProofKind, digest: &ProofDigest) -> Result<bool> {
        Ok(self.lock()?.contains(kind, digest))
    }

    fn has(&self, kind: ProofKind) -> Result<bool> {
        Ok(self.lock()?.has(kind))
    }
}
