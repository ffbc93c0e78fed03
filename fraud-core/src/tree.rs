//! Share Merkle tree implementation.
//!
//! This module provides the `ShareTree` which constructs a binary Merkle tree
//! over the shares of one row or column of an extended data square and
//! supports inclusion proof generation.

use sha2::{Digest, Sha256};

use crate::proof::InclusionProof;

/// Domain prefix for leaf hashes.
const LEAF_PREFIX: u8 = 0x00;

/// Domain prefix for internal node hashes.
const NODE_PREFIX: u8 = 0x01;

/// Hash a share into a leaf: `SHA256(0x00 || share)`.
pub fn hash_leaf(share: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(share);
    hasher.finalize().into()
}

/// Hash two children into a parent: `SHA256(0x01 || left || right)`.
pub fn hash_node(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Number of levels above the leaves for a tree of `leaves` leaves.
pub fn tree_depth(leaves: usize) -> usize {
    let mut depth = 0;
    let mut width = leaves;
    while width > 1 {
        width = (width + 1) / 2;
        depth += 1;
    }
    depth
}

/// A binary Merkle tree over shares.
///
/// # Hashing Rules
///
/// - **Leaf**: `SHA256(0x00 || share)`
/// - **Internal node**: `SHA256(0x01 || left_hash || right_hash)`
/// - **Empty tree**: `SHA256(b"")`
/// - **Odd nodes**: the last node is paired with itself
///
/// # Example
///
/// ```rust
/// use fraud_core::ShareTree;
///
/// let shares = vec![vec![0u8; 32], vec![1u8; 32]];
/// let tree = ShareTree::new(&shares);
/// println!("Row root: 0x{}", hex::encode(tree.root()));
/// ```
#[derive(Debug, Clone)]
pub struct ShareTree {
    /// Tree layers, from leaves (index 0) to root (last index)
    layers: Vec<Vec<[u8; 32]>>,

    /// The root hash
    root: [u8; 32],
}

impl ShareTree {
    /// Build a tree over the given shares, in order.
    pub fn new<S: AsRef<[u8]>>(shares: &[S]) -> Self {
        let leaves: Vec<[u8; 32]> = shares.iter().map(|s| hash_leaf(s.as_ref())).collect();
        let (layers, root) = Self::build_tree(leaves);
        Self { layers, root }
    }

    /// Build the Merkle tree layers from leaves to root.
    fn build_tree(leaves: Vec<[u8; 32]>) -> (Vec<Vec<[u8; 32]>>, [u8; 32]) {
        if leaves.is_empty() {
            return (vec![], Sha256::digest([]).into());
        }

        let mut layers = vec![leaves];

        while let Some(current) = layers.last() {
            if current.len() == 1 {
                break;
            }

            let next_layer: Vec<[u8; 32]> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_node(left, right),
                    [single] => hash_node(single, single),
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();

            layers.push(next_layer);
        }

        let root = layers
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_else(|| Sha256::digest([]).into());
        (layers, root)
    }

    /// The root hash of the tree.
    pub fn root(&self) -> [u8; 32] {
        self.root
    }

    /// Number of leaves in the tree.
    pub fn len(&self) -> usize {
        self.layers.first().map(|l| l.len()).unwrap_or(0)
    }

    /// Whether the tree has no leaves.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generate an inclusion proof for the leaf at `index`.
    ///
    /// Returns `None` if the index is out of range.
    pub fn prove(&self, index: usize) -> Option<InclusionProof> {
        if index >= self.len() {
            return None;
        }

        let mut path = Vec::with_capacity(self.layers.len().saturating_sub(1));
        let mut idx = index;

        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            // Odd node pairs with itself
            let sibling = layer.get(sibling_idx).unwrap_or(&layer[idx]);
            path.push(*sibling);
            idx /= 2;
        }

        Some(InclusionProof {
            index: index as u32,
            path,
        })
    }
}
