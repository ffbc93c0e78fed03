//! Merkle inclusion proof for shares.
//!
//! This module provides the `InclusionProof` struct which represents a
//! cryptographic proof that a share sits at a given position under a row or
//! column root of the extended data square.

use serde::{Deserialize, Serialize};

use crate::tree::{hash_leaf, hash_node};

/// A Merkle inclusion proof for a single share.
///
/// # Verification
///
/// To verify a proof, the verifier:
/// 1. Starts with `H(0x00 || share)`
/// 2. For each sibling in `path`, walking up from the leaf:
///    - If the current index is even, compute `H(0x01 || current || sibling)`
///    - If it is odd, compute `H(0x01 || sibling || current)`
///    - Halve the index
/// 3. Compare the final hash with the expected root
///
/// # Example
///
/// ```rust
/// use fraud_core::ShareTree;
///
/// let shares = vec![vec![1u8; 8], vec![2u8; 8], vec![3u8; 8], vec![4u8; 8]];
/// let tree = ShareTree::new(&shares);
///
/// let proof = tree.prove(2).unwrap();
/// assert!(proof.verify(&shares[2], &tree.root()));
/// assert!(!proof.verify(&shares[1], &tree.root()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Position of the leaf in the tree
    pub index: u32,

    /// Sibling hashes from leaf to root
    pub path: Vec<[u8; 32]>,
}

impl InclusionProof {
    /// Verify this proof for `share` against an expected root hash.
    pub fn verify(&self, share: &[u8], expected_root: &[u8; 32]) -> bool {
        let mut current = hash_leaf(share);
        let mut index = self.index;

        for sibling in &self.path {
            current = if index % 2 == 0 {
                hash_node(&current, sibling)
            } else {
                hash_node(sibling, &current)
            };
            index /= 2;
        }

        // Leftover index bits mean the path was cut short.
        index == 0 && current == *expected_root
    }

    /// Returns the depth of the proof (number of tree levels).
    #[inline]
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}
