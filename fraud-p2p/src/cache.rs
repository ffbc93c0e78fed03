//! LRU cache of proofs that failed terminal verification.
//!
//! Lets the gossip adapter reject a re-delivered false accusation right after
//! decoding, without fetching its header again.

use fraud_core::{ProofDigest, ProofKind};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::Instant;

/// Default cache capacity (number of digests).
pub const DEFAULT_CAPACITY: usize = 1024;

/// Why a proof was rejected.
#[derive(Debug, Clone)]
pub struct RejectedProof {
    /// Kind of the rejected proof
    pub kind: ProofKind,
    /// Height it accused
    pub height: u64,
    /// Verification failure
    pub reason: String,
    /// When it was rejected
    pub rejected_at: Instant,
}

impl RejectedProof {
    /// Create a new rejection entry.
    pub fn new(kind: ProofKind, height: u64, reason: impl Into<String>) -> Self {
        Self {
            kind,
            height,
            reason: reason.into(),
            rejected_at: Instant::now(),
        }
    }
}

/// LRU cache of rejected proof digests.
pub struct RejectedCache {
    cache: LruCache<ProofDigest, RejectedProof>,
}

impl RejectedCache {
    /// Create a new cache with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new cache with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
        }
    }

    /// Look up a rejected digest, refreshing its recency.
    pub fn get(&mut self, digest: &ProofDigest) -> Option<&RejectedProof> {
        self.cache.get(digest)
    }

    /// Remember a rejection.
    pub fn insert(&mut self, digest: ProofDigest, entry: RejectedProof) {
        self.cache.put(digest, entry);
    }

    /// Check if a digest was rejected.
    pub fn contains(&self, digest: &ProofDigest) -> bool {
        self.cache.contains(digest)
    }

    /// Number of remembered rejections.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for RejectedCache {
    fn default() -> Self {
        Self::new()
    }
}
