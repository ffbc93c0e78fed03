//! Proof store.
//!
//! Maps each proof kind to the proofs accepted for it, in acceptance order,
//! deduplicated by digest. Only verified proofs are ever put; the store does
//! not re-verify.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use fraud_core::{ProofDigest, ProofKind, SharedProof};
use std::collections::{BTreeMap, HashSet};

use crate::error::Result;

/// Result of a [`ProofStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The proof was new and is now durably stored.
    Accepted,
    /// A proof with the same digest was already stored.
    AlreadyPresent,
}

/// Append-only storage for accepted proofs.
///
/// Concurrent puts of one digest yield exactly one `Accepted`.
pub trait ProofStore: Send + Sync {
    /// Store a verified proof.
    fn put(&self, proof: SharedProof) -> Result<PutOutcome>;

    /// Proofs of `kind` in acceptance order; empty if none.
    fn get(&self, kind: ProofKind) -> Result<Vec<SharedProof>>;

    /// Whether a proof with `digest` is stored under `kind`.
    fn contains(&self, kind: ProofKind, digest: &ProofDigest) -> Result<bool>;

    /// Whether any proof of `kind` is stored.
    fn has(&self, kind: ProofKind) -> Result<bool> {
        Ok(!self.get(kind)?.is_empty())
    }
}

/// In-memory index shared by the store implementations.
#[derive(Debug, Default)]
pub(crate) struct ProofIndex {
    by_kind: BTreeMap<ProofKind, Vec<SharedProof>>,
    seen: HashSet<(ProofKind, ProofDigest)>,
}

impl ProofIndex {
    pub(crate) fn contains(&self, kind: ProofKind, digest: &ProofDigest) -> bool {
        self.seen.contains(&(kind, *digest))
    }

    /// Insert unless present; returns whether it was inserted.
    pub(crate) fn insert(&mut self, proof: SharedProof, digest: ProofDigest) -> bool {
        let kind = proof.kind();
        if !self.seen.insert((kind, digest)) {
            return false;
        }
        self.by_kind.entry(kind).or_default().push(proof);
        true
    }

    pub(crate) fn get(&self, kind: ProofKind) -> Vec<SharedProof> {
        self.by_kind.get(&kind).cloned().unwrap_or_default()
    }

    pub(crate) fn has(&self, kind: ProofKind) -> bool {
        self.by_kind.get(&kind).is_some_and(|proofs| !proofs.is_empty())
    }
}
