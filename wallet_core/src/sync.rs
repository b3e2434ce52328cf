//! Rescanning stored transactions for notes addressed to new keys.

use std::sync::Arc;

use shroud_crypto::ZkpKeys;
use shroud_store::LedgerStore;
use shroud_sync::recover_commitment;
use tracing::{debug, info};

use crate::error::WalletError;

/// Finds commitments, in transactions already on disk, that earlier keys
/// could not decrypt.
pub struct CommitmentSync {
    store: Arc<dyn LedgerStore>,
}

impl CommitmentSync {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Try `keys` on every stored, still-undecrypted note. Recovered
    /// commitments inherit the confirmation state of their transaction.
    /// Returns how many commitments were recovered.
    pub fn rescan(&self, keys: &[ZkpKeys]) -> Result<usize, WalletError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut recovered = 0;
        for mut tx in self.store.iter_transactions()? {
            if tx.is_decrypted || !tx.transaction_type.creates_commitments() {
                continue;
            }
            let Some(note) = tx.encrypted_note.as_ref() else {
                continue;
            };
            // The note always describes the first live output.
            let Some(target) = tx.commitments.iter().find(|c| !c.is_zero()) else {
                continue;
            };
            if self.store.get_commitment(target)?.is_some() {
                continue;
            }
            let Some(mut record) = recover_commitment(keys, &tx.commitments, note) else {
                continue;
            };
            if let Some(block_number_l2) = tx.block_number_l2 {
                record.on_chain = Some(block_number_l2);
                record.block_number_l1 = tx.block_number_l1;
                record.committed_l1 = tx.transaction_hash_l1;
            }
            debug!(tx = %tx.transaction_hash, commitment = %record.hash, "recovered commitment on rescan");
            self.store.put_commitment(&record)?;
            tx.is_decrypted = true;
            self.store.put_transaction(&tx)?;
            recovered += 1;
        }
        if recovered > 0 {
            info!(recovered, "rescan recovered commitments");
        }
        Ok(recovered)
    }
}
