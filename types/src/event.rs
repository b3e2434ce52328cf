//! Chain events delivered to the sync engine.

use serde::{Deserialize, Serialize};

use crate::block::L2Block;
use crate::hash::L1TxHash;
use crate::transaction::L2Transaction;

pub const BLOCK_PROPOSED: &str = "BlockProposed";
pub const ROLLBACK: &str = "Rollback";

/// `{eventName, removed, data}` as emitted by the chain watcher. `removed`
/// is set when an L1 reorg un-emits a previously delivered event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub name: String,
    #[serde(default)]
    pub removed: bool,
    pub payload: EventPayload,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    BlockProposed(BlockProposed),
    Rollback(Rollback),
    Other(serde_json::Value),
}

/// A block proposal confirmed on L1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockProposed {
    /// L1 block number.
    pub block_number: u64,
    /// L1 transaction hash.
    pub transaction_hash: L1TxHash,
    pub block_timestamp: u64,
    pub block: L2Block,
    pub transactions: Vec<L2Transaction>,
}

/// Everything above `block_number_l2` is invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollback {
    pub block_number_l2: u64,
}

impl ChainEvent {
    pub fn block_proposed(payload: BlockProposed) -> Self {
        Self {
            name: BLOCK_PROPOSED.to_string(),
            removed: false,
            payload: EventPayload::BlockProposed(payload),
        }
    }

    pub fn rollback(block_number_l2: u64) -> Self {
        Self {
            name: ROLLBACK.to_string(),
            removed: false,
            payload: EventPayload::Rollback(Rollback { block_number_l2 }),
        }
    }

    /// The same event marked as un-emitted by an L1 reorg.
    pub fn into_removed(mut self) -> Self {
        self.removed = true;
        self
    }
}
