//! Merkle root for docket transactions
//!
//! Binary BLAKE3 merkle tree over transaction hashes. An odd node at any
//! level is paired with itself, so the root alone does not fix the leaf
//! count; docket hashes commit to it separately. The root of an empty set is
//! all zeros.

use serde::{Deserialize, Serialize};

/// Hash size in bytes (BLAKE3 output)
pub const HASH_SIZE: usize = 32;

/// Merkle proof containing sibling hashes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf index in the tree
    pub leaf_index: u64,
    /// Sibling hashes from leaf to root
    pub siblings: Vec<[u8; HASH_SIZE]>,
    /// Root hash this proof validates against
    pub root: [u8; HASH_SIZE],
}

impl MerkleProof {
    /// Verify the proof for a given leaf hash
    pub fn verify(&self, leaf_hash: &[u8; HASH_SIZE]) -> bool {
        let mut current = *leaf_hash;
        let mut index = self.leaf_index;

        for sibling in &self.siblings {
            current = if index % 2 == 0 {
                hash_pair(&current, sibling)
            } else {
                hash_pair(sibling, &current)
            };
            index /= 2;
        }

        current == self.root
    }
}

/// Compute the merkle root of a list of leaf hashes
pub fn merkle_root(leaves: &[[u8; HASH_SIZE]]) -> [u8; HASH_SIZE] {
    if leaves.is_empty() {
        return [0u8; HASH_SIZE];
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Build an inclusion proof for the leaf at `index`
pub fn generate_proof(leaves: &[[u8; HASH_SIZE]], index: usize) -> Option<MerkleProof> {
    if index >= leaves.len() {
        return None;
    }

    let mut siblings = Vec::new();
    let mut level = leaves.to_vec();
    let mut position = index;

    while level.len() > 1 {
        let sibling = if position % 2 == 0 {
            *level.get(position + 1).unwrap_or(&level[position])
        } else {
            level[position - 1]
        };
        siblings.push(sibling);
        level = next_level(&level);
        position /= 2;
    }

    Some(MerkleProof {
        leaf_index: index as u64,
        siblings,
        root: level[0],
    })
}

fn next_level(level: &[[u8; HASH_SIZE]]) -> Vec<[u8; HASH_SIZE]> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [single] => hash_pair(single, single),
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Hash two nodes together (domain-separated from leaves)
fn hash_pair(left: &[u8; HASH_SIZE], right: &[u8; HASH_SIZE]) -> [u8; HASH_SIZE] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[0x01]);
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> [u8; HASH_SIZE] {
        *blake3::hash(&[n]).as_bytes()
    }

    #[test]
    fn test_empty_root_is_zero() {
        assert_eq!(merkle_root(&[]), [0u8; HASH_SIZE]);
    }

    #[test]
    fn test_single_leaf_is_root() {
        assert_eq!(merkle_root(&[leaf(1)]), leaf(1));
    }

    #[test]
    fn test_root_depends_on_order() {
        let a = merkle_root(&[leaf(1), leaf(2), leaf(3)]);
        let b = merkle_root(&[leaf(2), leaf(1), leaf(3)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_proofs_verify_for_every_leaf() {
        let leaves: Vec<_> = (0..5).map(leaf).collect();
        let root = merkle_root(&leaves);

        for (i, l) in leaves.iter().enumerate() {
            let proof = generate_proof(&leaves, i).unwrap();
            assert_eq!(proof.root, root);
            assert!(proof.verify(l));
            assert!(!proof.verify(&leaf(99)));
        }

        assert!(generate_proof(&leaves, 5).is_none());
    }
}
