//! # Docket Merkle Tree
//!
//! Binary SHA-256 tree over the ordered transaction ids of a docket. Each
//! parent is `H(left || right)`. Leaves are padded to the next power of two
//! (minimum two) with an all-zero sentinel; an empty docket has the
//! sentinel as its root.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{Hash, TxId};

/// Padding leaf and root of an empty tree.
pub const SENTINEL_HASH: Hash = [0u8; 32];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// Array form, root at index 0; children of `i` are `2i+1` and `2i+2`.
    nodes: Vec<Hash>,
    leaf_count: usize,
    padded_leaf_count: usize,
}

impl MerkleTree {
    pub fn build(leaves: &[TxId]) -> Self {
        if leaves.is_empty() {
            return Self {
                nodes: vec![SENTINEL_HASH],
                leaf_count: 0,
                padded_leaf_count: 0,
            };
        }

        let padded_leaf_count = leaves.len().next_power_of_two().max(2);
        let leaf_start = padded_leaf_count - 1;
        let mut nodes = vec![SENTINEL_HASH; 2 * padded_leaf_count - 1];
        nodes[leaf_start..leaf_start + leaves.len()].copy_from_slice(leaves);

        for i in (0..leaf_start).rev() {
            nodes[i] = hash_pair(&nodes[2 * i + 1], &nodes[2 * i + 2]);
        }

        Self {
            nodes,
            leaf_count: leaves.len(),
            padded_leaf_count,
        }
    }

    pub fn root(&self) -> Hash {
        self.nodes[0]
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count {
            return None;
        }
        let mut current = self.padded_leaf_count - 1 + index;
        let leaf = self.nodes[current];
        let mut path = Vec::new();

        while current > 0 {
            let (sibling, position) = if current % 2 == 0 {
                (current - 1, SiblingPosition::Left)
            } else {
                (current + 1, SiblingPosition::Right)
            };
            path.push(ProofNode {
                hash: self.nodes[sibling],
                position,
            });
            current = (current - 1) / 2;
        }

        Some(MerkleProof { leaf, path })
    }
}

/// Root over ordered transaction ids.
pub fn merkle_root(ids: &[TxId]) -> Hash {
    MerkleTree::build(ids).root()
}

/// Proof that a transaction id is part of a docket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: TxId,
    pub path: Vec<ProofNode>,
}

impl MerkleProof {
    pub fn verify(&self, root: &Hash) -> bool {
        let computed = self.path.iter().fold(self.leaf, |acc, node| match node.position {
            SiblingPosition::Left => hash_pair(&node.hash, &acc),
            SiblingPosition::Right => hash_pair(&acc, &node.hash),
        });
        computed == *root
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    pub hash: Hash,
    pub position: SiblingPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiblingPosition {
    Left,
    Right,
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u8) -> Vec<TxId> {
        (1..=n).map(|b| [b; 32]).collect()
    }

    #[test]
    fn test_empty_root_is_sentinel() {
        assert_eq!(merkle_root(&[]), SENTINEL_HASH);
        assert!(MerkleTree::build(&[]).proof(0).is_none());
    }

    #[test]
    fn test_single_leaf_padded() {
        let leaves = ids(1);
        assert_eq!(merkle_root(&leaves), hash_pair(&leaves[0], &SENTINEL_HASH));
    }

    #[test]
    fn test_order_matters() {
        let leaves = ids(3);
        let mut reversed = leaves.clone();
        reversed.reverse();
        assert_eq!(merkle_root(&leaves), merkle_root(&leaves.clone()));
        assert_ne!(merkle_root(&leaves), merkle_root(&reversed));
    }

    #[test]
    fn test_every_leaf_proves() {
        let leaves = ids(5);
        let tree = MerkleTree::build(&leaves);
        for index in 0..leaves.len() {
            let proof = tree.proof(index).unwrap();
            assert_eq!(proof.leaf, leaves[index]);
            assert!(proof.verify(&tree.root()));
        }
        assert!(tree.proof(5).is_none());
    }

    #[test]
    fn test_tampered_proof_fails() {
        let tree = MerkleTree::build(&ids(4));
        let mut proof = tree.proof(2).unwrap();
        proof.leaf = [0xFF; 32];
        assert!(!proof.verify(&tree.root()));
    }
}
