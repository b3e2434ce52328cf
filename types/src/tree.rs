//! Merkle tree snapshots and cached membership witnesses.

use serde::{Deserialize, Serialize};

use crate::hash::{Hash32, L1TxHash};

/// Minimal state needed to keep appending to an append-only Merkle tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub root: Hash32,
    /// Most recent left node per level, leaf level first.
    pub frontier: Vec<Hash32>,
    pub leaf_count: u64,
}

/// A snapshot stored after processing an L2 block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub block_number_l2: u64,
    pub transaction_hash_l1: L1TxHash,
    pub snapshot: TreeSnapshot,
}

/// Sibling path of a leaf together with the root it proves membership in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleWitness {
    pub sibling_path: Vec<Hash32>,
    pub leaf_index: u64,
    pub root: Hash32,
}
