//! Merkle tree implementation for transaction commitment
//!
//! Leaves are transaction IDs. Each level pairs adjacent hashes left to
//! right, duplicating the last hash when the level has an odd count, and
//! combines a pair by double-hashing the concatenation of the raw bytes.

use super::hash::{double_sha256, Hash256};

/// Hash two child nodes into their parent
pub fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left);
    data[32..].copy_from_slice(right);
    double_sha256(&data)
}

/// Reduce one level of the tree to the next
fn next_level(level: &[Hash256]) -> Vec<Hash256> {
    level
        .chunks(2)
        .map(|chunk| match chunk {
            [left, right] => hash_pair(left, right),
            [single] => hash_pair(single, single),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Calculate the merkle root from an ordered list of leaf hashes
///
/// Returns `None` for an empty list. A single leaf is its own root.
pub fn merkle_root(leaves: &[Hash256]) -> Option<Hash256> {
    if leaves.is_empty() {
        return None;
    }

    let mut current_level = leaves.to_vec();
    while current_level.len() > 1 {
        current_level = next_level(&current_level);
    }

    current_level.pop()
}

/// Merkle proof for verifying transaction inclusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Sibling hashes from leaf to root, with a flag set when the sibling is on the left
    pub siblings: Vec<(Hash256, bool)>,
}

impl MerkleProof {
    /// Verify the proof against a root hash
    pub fn verify(&self, leaf_hash: &Hash256, root_hash: &Hash256) -> bool {
        let current = self
            .siblings
            .iter()
            .fold(*leaf_hash, |current, (sibling, is_left)| {
                if *is_left {
                    hash_pair(sibling, &current)
                } else {
                    hash_pair(&current, sibling)
                }
            });

        current == *root_hash
    }
}

/// Build an inclusion proof for the leaf at `index`
pub fn merkle_proof(leaves: &[Hash256], index: usize) -> Option<MerkleProof> {
    if index >= leaves.len() {
        return None;
    }

    let mut siblings = Vec::new();
    let mut position = index;
    let mut current_level = leaves.to_vec();

    while current_level.len() > 1 {
        let sibling_position = position ^ 1;
        let sibling = current_level
            .get(sibling_position)
            .copied()
            .unwrap_or(current_level[position]);
        siblings.push((sibling, sibling_position < position));

        current_level = next_level(&current_level);
        position /= 2;
    }

    Some(MerkleProof { siblings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha256;

    fn leaves(n: usize) -> Vec<Hash256> {
        (0..n).map(|i| sha256(format!("tx{}", i).as_bytes())).collect()
    }

    #[test]
    fn test_merkle_root_single() {
        let hashes = leaves(1);
        assert_eq!(merkle_root(&hashes), Some(hashes[0]));
    }

    #[test]
    fn test_merkle_root_two() {
        let hashes = leaves(2);

        let mut expected = hashes[0].to_vec();
        expected.extend_from_slice(&hashes[1]);

        assert_eq!(merkle_root(&hashes), Some(double_sha256(&expected)));
    }

    #[test]
    fn test_merkle_root_odd_duplicates_last() {
        let hashes = leaves(3);
        let left = hash_pair(&hashes[0], &hashes[1]);
        let right = hash_pair(&hashes[2], &hashes[2]);

        assert_eq!(merkle_root(&hashes), Some(hash_pair(&left, &right)));
    }

    #[test]
    fn test_merkle_root_order_matters() {
        let hashes = leaves(2);
        let swapped = vec![hashes[1], hashes[0]];
        assert_ne!(merkle_root(&hashes), merkle_root(&swapped));
    }

    #[test]
    fn test_empty_merkle_root() {
        assert_eq!(merkle_root(&[]), None);
    }

    #[test]
    fn test_merkle_proofs_verify_for_every_leaf() {
        for n in 1..=7 {
            let hashes = leaves(n);
            let root = merkle_root(&hashes).unwrap();
            for (i, leaf) in hashes.iter().enumerate() {
                let proof = merkle_proof(&hashes, i).unwrap();
                assert!(proof.verify(leaf, &root), "leaf {} of {}", i, n);
            }
        }
    }

    #[test]
    fn test_merkle_proof_rejects_wrong_leaf() {
        let hashes = leaves(4);
        let root = merkle_root(&hashes).unwrap();
        let proof = merkle_proof(&hashes, 1).unwrap();

        assert!(!proof.verify(&hashes[2], &root));
        assert!(merkle_proof(&hashes, 4).is_none());
    }
}
