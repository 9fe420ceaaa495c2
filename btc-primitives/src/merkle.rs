//! Merkle-tree arithmetic over HASH256: enough to recompute a block's
//! merkle root from its transaction ids.

use crate::hash::{hash256, H256};

/// Parent of two tree nodes: HASH256 of their concatenation.
pub fn merkle_parent(left: &H256, right: &H256) -> H256 {
    let mut concat = Vec::with_capacity(64);
    concat.extend_from_slice(&left.0);
    concat.extend_from_slice(&right.0);
    hash256(&concat)
}

/// Folds one level: pairs hashed left-to-right, an odd tail paired with
/// itself.
pub fn merkle_parent_level(mut hashes: Vec<H256>) -> Vec<H256> {
    if hashes.len() % 2 == 1 {
        hashes.push(*hashes.last().expect("level is non-empty"));
    }
    hashes
        .chunks_exact(2)
        .map(|pair| merkle_parent(&pair[0], &pair[1]))
        .collect()
}

/// The merkle root of a list of transaction ids in internal byte order.
/// A single-transaction block's root is that transaction's id.
///
/// # Panics
///
/// On an empty list; blocks always carry a coinbase.
pub fn merkle_root(mut hashes: Vec<H256>) -> H256 {
    assert!(!hashes.is_empty(), "merkle root of an empty list");
    while hashes.len() > 1 {
        hashes = merkle_parent_level(hashes);
    }
    hashes.remove(0)
}
