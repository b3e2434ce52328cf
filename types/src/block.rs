//! L2 blocks as proposed on L1, and the local block index record.

use serde::{Deserialize, Serialize};

use crate::address::EthAddress;
use crate::hash::{Hash32, L1TxHash, TxHash};
use crate::time::Timestamp;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Block {
    pub block_number_l2: u64,
    pub proposer: EthAddress,
    pub root: Hash32,
    /// Number of leaves in the commitment tree before this block.
    pub leaf_count: u64,
    pub previous_block_hash: Hash32,
    pub transaction_hashes_root: Hash32,
    pub transaction_hashes: Vec<TxHash>,
}

/// A stored block, with the L1 coordinates of the proposal that carried it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block: L2Block,
    /// Cleared when the carrying L1 transaction is un-emitted.
    pub block_number_l1: Option<u64>,
    pub transaction_hash_l1: L1TxHash,
    pub timestamp: Timestamp,
}

impl BlockRecord {
    pub fn number(&self) -> u64 {
        self.block.block_number_l2
    }
}
