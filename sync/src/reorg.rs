//! Rollback and L1 un-emit handling.

use shroud_store::{LedgerStore, StoreError};
use shroud_types::{CommitmentHash, L1TxHash, TxHash};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, Instrument};

use crate::tracing_spans::{rollback_span, undo_proposal_span};
use crate::SyncError;

/// What one rollback removed or reset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub valid_to: u64,
    pub deleted_commitments: usize,
    pub cleared_nullified: usize,
    pub cleared_on_chain: usize,
    pub deleted_trees: usize,
    pub deleted_blocks: usize,
    pub deleted_transactions: usize,
}

/// What undoing one L1 transaction reset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UndoReport {
    pub reset_committed: usize,
    pub reset_nullified: usize,
    pub block_cleared: bool,
    pub deleted_trees: usize,
}

#[derive(Default)]
struct Deletions {
    commitments: usize,
    trees: usize,
    blocks: usize,
    transactions: usize,
}

pub struct ReorgHandler {
    store: Arc<dyn LedgerStore>,
}

impl ReorgHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Reverse every change attributable to L2 blocks after `valid_to`.
    ///
    /// The clean-up steps run concurrently; the first storage error is
    /// returned and whatever the other steps finished stays applied.
    pub async fn rollback(&self, valid_to: u64) -> Result<RollbackReport, SyncError> {
        let span = rollback_span(valid_to);
        async move {
            let mut report = RollbackReport {
                valid_to,
                ..RollbackReport::default()
            };
            let Some(first_invalid) = valid_to.checked_add(1) else {
                return Ok(report);
            };

            let (candidates, transactions) = blocking(&self.store, move |store| {
                let candidates: Vec<CommitmentHash> = store
                    .commitments_on_chain_from(first_invalid)?
                    .into_iter()
                    .filter(|c| !c.is_deposited)
                    .map(|c| c.hash)
                    .collect();
                let transactions = invalidated_transactions(store, valid_to)?;
                Ok((candidates, transactions))
            })
            .await?;

            let (cleared_nullified, cleared_on_chain, deletions) = tokio::try_join!(
                blocking(&self.store, move |store| store.clear_nullified_from(first_invalid)),
                blocking(&self.store, move |store| store.clear_on_chain_from(first_invalid)),
                blocking(&self.store, move |store| {
                    Ok(Deletions {
                        commitments: store.delete_commitments(&candidates)?,
                        trees: store.delete_trees_from(first_invalid)?,
                        blocks: store.delete_blocks_from(first_invalid)?,
                        transactions: store.delete_transactions(&transactions)?,
                    })
                }),
            )?;

            report.cleared_nullified = cleared_nullified;
            report.cleared_on_chain = cleared_on_chain;
            report.deleted_commitments = deletions.commitments;
            report.deleted_trees = deletions.trees;
            report.deleted_blocks = deletions.blocks;
            report.deleted_transactions = deletions.transactions;

            info!(
                deleted_commitments = report.deleted_commitments,
                cleared_nullified = report.cleared_nullified,
                cleared_on_chain = report.cleared_on_chain,
                deleted_blocks = report.deleted_blocks,
                "rollback applied"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Undo the effects of a BlockProposed event whose L1 transaction was
    /// un-emitted by an L1 reorganization.
    pub async fn undo_block_proposal(
        &self,
        transaction_hash_l1: L1TxHash,
    ) -> Result<UndoReport, SyncError> {
        let span = undo_proposal_span(&transaction_hash_l1);
        blocking(&self.store, move |store| {
            let report = UndoReport {
                reset_committed: store.reset_committed_in_l1(&transaction_hash_l1)?,
                reset_nullified: store.reset_nullified_in_l1(&transaction_hash_l1)?,
                block_cleared: store.clear_block_l1(&transaction_hash_l1)?,
                deleted_trees: store.delete_tree_by_l1_transaction(&transaction_hash_l1)?,
            };
            info!(
                reset_committed = report.reset_committed,
                reset_nullified = report.reset_nullified,
                "block proposal undone"
            );
            Ok(report)
        })
        .instrument(span)
        .await
    }
}

/// Transactions carried by blocks after `valid_to` that no valid block
/// confirms, plus any stored transaction recorded at such a block.
fn invalidated_transactions(
    store: &dyn LedgerStore,
    valid_to: u64,
) -> Result<Vec<TxHash>, StoreError> {
    let is_invalid = |block: Option<u64>| block.map_or(true, |n| n > valid_to);

    let mut hashes: BTreeSet<TxHash> = BTreeSet::new();
    for block in store.blocks_from(valid_to + 1)? {
        for hash in &block.block.transaction_hashes {
            if let Some(record) = store.get_transaction(hash)? {
                if is_invalid(record.block_number_l2) {
                    hashes.insert(*hash);
                }
            }
        }
    }
    for record in store.iter_transactions()? {
        if record.block_number_l2.is_some_and(|n| n > valid_to) {
            hashes.insert(record.transaction_hash);
        }
    }
    Ok(hashes.into_iter().collect())
}

/// Run a store operation on the blocking pool.
async fn blocking<T, F>(store: &Arc<dyn LedgerStore>, op: F) -> Result<T, SyncError>
where
    T: Send + 'static,
    F: FnOnce(&dyn LedgerStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| SyncError::Other(format!("blocking store task failed: {e}")))?
        .map_err(SyncError::from)
}
