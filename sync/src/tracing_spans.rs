//! Pre-built [`tracing::Span`] constructors for sync operations.
//!
//! Consistent span names and field sets make it easy to filter and correlate
//! the log lines of one block or one rollback.

use shroud_types::L1TxHash;
use tracing::{debug_span, info_span, Span};

/// Span covering finality processing of one L2 block.
pub fn block_finality_span(block_number_l2: u64, transaction_hash_l1: &L1TxHash) -> Span {
    info_span!("block_finality", block = block_number_l2, l1_tx = %transaction_hash_l1)
}

/// Span covering a rollback to the highest still-valid L2 block.
pub fn rollback_span(block_number_l2: u64) -> Span {
    info_span!("rollback", valid_to = block_number_l2)
}

/// Span covering the undo of one un-emitted L1 transaction.
pub fn undo_proposal_span(transaction_hash_l1: &L1TxHash) -> Span {
    info_span!("undo_proposal", l1_tx = %transaction_hash_l1)
}

/// Span covering one task run by a queue lane.
pub fn queue_task_span(lane: &str, label: &str) -> Span {
    debug_span!("queue_task", lane = %lane, task = %label)
}
