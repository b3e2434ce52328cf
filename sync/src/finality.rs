//! Block finality processing.
//!
//! Applies one confirmed L2 block to the local store: recognizes commitments
//! addressed to local keys, confirms known commitments and nullifiers, advances
//! the commitment tree and caches witnesses for the wallet's own leaves.
//!
//! Every write is an upsert or a guarded transition, and the tree is always
//! rebuilt from the snapshot strictly before the block, so processing the same
//! block twice leaves the store unchanged.

use shroud_store::{ChainPosition, LedgerStore};
use shroud_tree::{empty_snapshot, AppendBatch, MerkleTree};
use shroud_types::{
    BlockProposed, BlockRecord, CommitmentHash, Hash32, MerkleWitness, Timestamp,
    TransactionRecord, TransactionType, TreeRecord, TxHash,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::discovery::recover_commitment;
use crate::keyring::KeyRing;
use crate::SyncError;

/// What processing one block changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FinalityReport {
    pub block_number_l2: u64,
    /// Commitments recovered by decrypting notes in this block.
    pub decrypted: usize,
    /// Known commitments newly marked on-chain.
    pub confirmed: usize,
    /// Known commitments whose spend was newly confirmed.
    pub nullified: usize,
    /// Witnesses written or refreshed.
    pub witnesses: usize,
    /// Stored transactions deleted because this block superseded them.
    pub superseded: usize,
    /// Unspent outputs of superseded transactions that were deleted with them.
    pub stale_outputs: usize,
    pub block_stored: bool,
    /// Commitment tree leaf count after the block.
    pub leaf_count: u64,
}

pub struct BlockFinalityProcessor {
    store: Arc<dyn LedgerStore>,
    keys: KeyRing,
    tree_height: u8,
}

impl BlockFinalityProcessor {
    pub fn new(store: Arc<dyn LedgerStore>, keys: KeyRing, tree_height: u8) -> Self {
        Self {
            store,
            keys,
            tree_height,
        }
    }

    /// Apply one BlockProposed payload. Blocking: call from a blocking task.
    pub fn process(&self, proposed: &BlockProposed) -> Result<FinalityReport, SyncError> {
        let block = &proposed.block;
        let block_number_l2 = block.block_number_l2;
        let position = ChainPosition {
            block_number_l2,
            block_number_l1: proposed.block_number,
            transaction_hash_l1: proposed.transaction_hash,
        };
        let keys = self.keys.snapshot();

        let mut report = FinalityReport {
            block_number_l2,
            ..FinalityReport::default()
        };
        let mut leaves: Vec<CommitmentHash> = Vec::new();
        let mut withdrawals: Vec<TxHash> = Vec::new();
        let mut relevant = false;

        for tx in &proposed.transactions {
            let commitments = tx.live_commitments();
            let nullifiers = tx.live_nullifiers();
            leaves.extend_from_slice(&commitments);

            let known_commitments = self.store.count_commitments(&commitments)?;
            let mut decrypted = false;
            if tx.transaction_type.creates_commitments() && known_commitments == 0 {
                if let Some(note) = &tx.encrypted_note {
                    if let Some(record) = recover_commitment(&keys, &commitments, note) {
                        debug!(commitment = %record.hash, tx = %tx.transaction_hash, "recovered commitment");
                        self.store.put_commitment(&record)?;
                        report.decrypted += 1;
                        decrypted = true;
                    }
                }
            }

            let existing = self.store.get_transaction(&tx.transaction_hash)?;
            let ours = decrypted
                || existing.is_some()
                || known_commitments > 0
                || self.store.count_nullifiers(&nullifiers)? > 0;

            if ours {
                relevant = true;
                let mut record = existing.unwrap_or_else(|| {
                    TransactionRecord::from_l2(tx, Timestamp::new(proposed.block_timestamp))
                });
                record.block_number_l2 = Some(block_number_l2);
                record.block_number_l1 = Some(proposed.block_number);
                record.transaction_hash_l1 = Some(proposed.transaction_hash);
                record.is_decrypted |= decrypted;
                self.store.put_transaction(&record)?;

                let superseded = self.store.conflicting_transactions(
                    &tx.transaction_hash,
                    &commitments,
                    &nullifiers,
                )?;
                if !superseded.is_empty() {
                    report.stale_outputs += self.delete_stale_outputs(&superseded, &commitments)?;
                    report.superseded += self.store.delete_transactions(&superseded)?;
                }

                if tx.transaction_type == TransactionType::Withdraw {
                    withdrawals.push(tx.transaction_hash);
                }
            }

            report.confirmed += self.store.mark_on_chain(&commitments, position)?;
            report.nullified += self.store.mark_nullified_on_chain(&nullifiers, position)?;
        }

        let leaf_count = self.advance_tree(proposed, &leaves, &mut report)?;
        report.leaf_count = leaf_count;

        if !withdrawals.is_empty() {
            self.cache_withdrawal_witnesses(proposed, &withdrawals)?;
        }

        if relevant {
            self.store.put_block(&BlockRecord {
                block: block.clone(),
                block_number_l1: Some(proposed.block_number),
                transaction_hash_l1: proposed.transaction_hash,
                timestamp: Timestamp::new(proposed.block_timestamp),
            })?;
            report.block_stored = true;
        }

        info!(
            block = block_number_l2,
            decrypted = report.decrypted,
            confirmed = report.confirmed,
            nullified = report.nullified,
            stored = report.block_stored,
            leaf_count,
            "block processed"
        );
        Ok(report)
    }

    /// Append the block's commitments to the previous snapshot, persist the
    /// result and cache witnesses for the wallet's leaves in this block.
    /// Delete the outputs a superseded transaction would have created, unless
    /// the confirmed transaction creates them too or they were already spent.
    fn delete_stale_outputs(
        &self,
        superseded: &[TxHash],
        confirmed: &[CommitmentHash],
    ) -> Result<usize, SyncError> {
        let mut stale = Vec::new();
        for hash in superseded {
            let Some(record) = self.store.get_transaction(hash)? else {
                continue;
            };
            for commitment in record.commitments.iter().filter(|c| !c.is_zero()) {
                if confirmed.contains(commitment) || stale.contains(commitment) {
                    continue;
                }
                match self.store.get_commitment(commitment)? {
                    Some(output) if !output.is_nullified => stale.push(*commitment),
                    _ => {}
                }
            }
        }
        if stale.is_empty() {
            return Ok(0);
        }
        debug!(count = stale.len(), "deleting outputs of superseded transactions");
        Ok(self.store.delete_commitments(&stale)?)
    }

    fn advance_tree(
        &self,
        proposed: &BlockProposed,
        leaves: &[CommitmentHash],
        report: &mut FinalityReport,
    ) -> Result<u64, SyncError> {
        let block_number_l2 = proposed.block.block_number_l2;
        let base = match self.store.latest_tree_before(block_number_l2)? {
            Some(record) => record.snapshot,
            None => empty_snapshot(self.tree_height),
        };
        if base.leaf_count != proposed.block.leaf_count {
            warn!(
                block = block_number_l2,
                local = base.leaf_count,
                announced = proposed.block.leaf_count,
                "leaf count before block differs from the announced count"
            );
        }

        let leaf_hashes: Vec<Hash32> = leaves.iter().copied().map(Hash32::from).collect();
        let batch = AppendBatch::new(&base, &leaf_hashes, self.tree_height)?;
        let snapshot = batch.snapshot();
        if snapshot.root != proposed.block.root {
            debug!(block = block_number_l2, "local root differs from the announced root");
        }

        for (index, hash) in leaves.iter().enumerate() {
            let Some(record) = self.store.get_commitment(hash)? else {
                continue;
            };
            if record.on_chain != Some(block_number_l2) || !self.keys.owns(record.owner()) {
                continue;
            }
            let witness = MerkleWitness {
                sibling_path: batch.sibling_path(index)?,
                leaf_index: batch.leaf_index(index),
                root: snapshot.root,
            };
            if self.store.set_witness(hash, witness)? {
                report.witnesses += 1;
            }
        }

        let leaf_count = snapshot.leaf_count;
        self.store.put_tree(&TreeRecord {
            block_number_l2,
            transaction_hash_l1: proposed.transaction_hash,
            snapshot,
        })?;
        Ok(leaf_count)
    }

    /// Build the block's transaction-hash tree and cache proofs for the
    /// wallet's withdrawals.
    fn cache_withdrawal_witnesses(
        &self,
        proposed: &BlockProposed,
        withdrawals: &[TxHash],
    ) -> Result<(), SyncError> {
        let hashes: Vec<Hash32> = proposed
            .block
            .transaction_hashes
            .iter()
            .copied()
            .map(Hash32::from)
            .collect();
        let tree = MerkleTree::new(hashes, MerkleTree::height_for(proposed.block.transaction_hashes.len()))?;

        for withdrawal in withdrawals {
            let leaf = Hash32::from(*withdrawal);
            let (Some(path), Some(index)) = (tree.sibling_path(&leaf)?, tree.leaf_index(&leaf)) else {
                warn!(tx = %withdrawal, "withdrawal missing from the block's transaction hashes");
                continue;
            };
            let witness = MerkleWitness {
                sibling_path: path,
                leaf_index: index as u64,
                root: tree.root(),
            };
            self.store.set_transaction_witness(withdrawal, witness)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_crypto::{commitment_hash, encrypt_note, NoteSecrets, ZkpKeys};
    use shroud_nullables::NullStore;
    use shroud_store::{CommitmentStore, TransactionStore, TreeStore};
    use shroud_tree::compute_root;
    use shroud_types::{
        CommitmentRecord, EthAddress, L1TxHash, L2Block, L2Transaction, NullifierHash, Preimage,
        Salt, TokenId,
    };

    const HEIGHT: u8 = 8;

    fn setup() -> (Arc<NullStore>, KeyRing, BlockFinalityProcessor) {
        let store = Arc::new(NullStore::new());
        let keys = KeyRing::new(vec![ZkpKeys::from_root_key(&[1; 32])]);
        let processor = BlockFinalityProcessor::new(store.clone(), keys.clone(), HEIGHT);
        (store, keys, processor)
    }

    fn incoming(keys: &KeyRing, value: u128, salt: u8) -> (CommitmentHash, L2Transaction) {
        let owner = keys.public_keys()[0];
        let preimage = Preimage {
            erc_address: EthAddress::new([5; 20]),
            token_id: TokenId::ZERO,
            value,
            owner,
            salt: Salt::new([salt; 32]),
        };
        let hash = commitment_hash(&preimage);
        let note = encrypt_note(&NoteSecrets::from_preimage(&preimage), &owner).unwrap();
        let tx = L2Transaction {
            transaction_hash: TxHash::new([salt; 32]),
            transaction_type: TransactionType::SingleTransfer,
            erc_address: EthAddress::ZERO,
            token_id: TokenId::ZERO,
            value: 0,
            fee: 1,
            commitments: vec![hash, CommitmentHash::ZERO],
            nullifiers: vec![NullifierHash::new([salt.wrapping_add(100); 32])],
            encrypted_note: Some(note),
        };
        (hash, tx)
    }

    fn proposal(number: u64, leaf_count: u64, transactions: Vec<L2Transaction>) -> BlockProposed {
        BlockProposed {
            block_number: 1_000 + number,
            transaction_hash: L1TxHash::new([number as u8; 32]),
            block_timestamp: 1_700_000_000,
            block: L2Block {
                block_number_l2: number,
                proposer: EthAddress::new([9; 20]),
                root: Hash32::ZERO,
                leaf_count,
                previous_block_hash: Hash32::ZERO,
                transaction_hashes_root: Hash32::ZERO,
                transaction_hashes: transactions.iter().map(|t| t.transaction_hash).collect(),
            },
            transactions,
        }
    }

    #[test]
    fn recovers_and_confirms_incoming_commitment() {
        let (store, keys, processor) = setup();
        let (hash, tx) = incoming(&keys, 50, 1);
        let report = processor.process(&proposal(0, 0, vec![tx])).unwrap();

        assert_eq!(report.decrypted, 1);
        assert_eq!(report.confirmed, 1);
        assert!(report.block_stored);
        assert_eq!(report.leaf_count, 1);

        let record = store.get_commitment(&hash).unwrap().unwrap();
        assert_eq!(record.on_chain, Some(0));
        let witness = record.witness.unwrap();
        assert_eq!(
            compute_root(&Hash32::from(hash), witness.leaf_index, &witness.sibling_path),
            witness.root
        );
        let stored_tx = store.get_transaction(&TxHash::new([1; 32])).unwrap().unwrap();
        assert!(stored_tx.is_decrypted);
        assert_eq!(stored_tx.block_number_l2, Some(0));
    }

    #[test]
    fn unrelated_block_advances_tree_without_storing_block() {
        let (store, _keys, processor) = setup();
        let stranger = KeyRing::new(vec![ZkpKeys::from_root_key(&[2; 32])]);
        let (_, tx) = incoming(&stranger, 50, 1);
        let report = processor.process(&proposal(0, 0, vec![tx])).unwrap();

        assert_eq!(report.decrypted, 0);
        assert!(!report.block_stored);
        assert_eq!(store.latest_tree().unwrap().unwrap().snapshot.leaf_count, 1);
        assert!(store.iter_commitments().unwrap().is_empty());
    }

    #[test]
    fn spend_of_known_commitment_is_confirmed() {
        let (store, keys, processor) = setup();
        let (hash, tx) = incoming(&keys, 50, 1);
        processor.process(&proposal(0, 0, vec![tx])).unwrap();
        let nullifier = store.get_commitment(&hash).unwrap().unwrap().nullifier;

        let spend = L2Transaction {
            transaction_hash: TxHash::new([77; 32]),
            transaction_type: TransactionType::Withdraw,
            erc_address: EthAddress::new([5; 20]),
            token_id: TokenId::ZERO,
            value: 50,
            fee: 0,
            commitments: vec![CommitmentHash::ZERO],
            nullifiers: vec![nullifier, NullifierHash::ZERO],
            encrypted_note: None,
        };
        let report = processor.process(&proposal(1, 1, vec![spend])).unwrap();

        assert_eq!(report.nullified, 1);
        let record = store.get_commitment(&hash).unwrap().unwrap();
        assert!(!record.is_nullified);
        assert!(!record.is_spendable());
        assert_eq!(record.nullified_on_chain, Some(1));
        let withdrawal = store.get_transaction(&TxHash::new([77; 32])).unwrap().unwrap();
        assert_eq!(withdrawal.witness.unwrap().leaf_index, 0);
    }

    #[test]
    fn replay_is_idempotent() {
        let (store, keys, processor) = setup();
        let (_, tx) = incoming(&keys, 50, 1);
        let block = proposal(0, 0, vec![tx]);
        processor.process(&block).unwrap();
        let commitments = store.iter_commitments().unwrap();
        let tree = store.latest_tree().unwrap();

        let again = processor.process(&block).unwrap();
        assert_eq!(again.decrypted, 0);
        assert_eq!(again.confirmed, 0);
        assert_eq!(again.witnesses, 0);
        assert_eq!(store.iter_commitments().unwrap(), commitments);
        assert_eq!(store.latest_tree().unwrap(), tree);
    }

    #[test]
    fn superseded_transaction_is_deleted() {
        let (store, keys, processor) = setup();
        let (hash, tx) = incoming(&keys, 50, 1);
        processor.process(&proposal(0, 0, vec![tx])).unwrap();

        // A locally built spend that was re-proved under a different hash.
        let nullifier = store.get_commitment(&hash).unwrap().unwrap().nullifier;
        let owner = keys.public_keys()[0];
        let output = |value: u128, salt: u8| {
            let preimage = Preimage {
                erc_address: EthAddress::new([5; 20]),
                token_id: TokenId::ZERO,
                value,
                owner,
                salt: Salt::new([salt; 32]),
            };
            CommitmentRecord::new(
                commitment_hash(&preimage),
                preimage,
                NullifierHash::new([salt; 32]),
            )
        };
        // Change the stale build stored locally, plus one already respent.
        let change = output(20, 60);
        let respent = output(5, 61);
        store.put_commitment(&change).unwrap();
        store.put_commitment(&respent).unwrap();
        store
            .mark_nullified(&[respent.hash], TxHash::new([42; 32]), TransactionType::SingleTransfer)
            .unwrap();
        let stale = TransactionRecord::from_l2(
            &L2Transaction {
                transaction_hash: TxHash::new([40; 32]),
                transaction_type: TransactionType::Withdraw,
                erc_address: EthAddress::new([5; 20]),
                token_id: TokenId::ZERO,
                value: 50,
                fee: 0,
                commitments: vec![change.hash, respent.hash],
                nullifiers: vec![nullifier],
                encrypted_note: None,
            },
            Timestamp::new(1),
        );
        store.put_transaction(&stale).unwrap();
        let mined = L2Transaction {
            transaction_hash: TxHash::new([41; 32]),
            transaction_type: TransactionType::Withdraw,
            erc_address: EthAddress::new([5; 20]),
            token_id: TokenId::ZERO,
            value: 50,
            fee: 0,
            commitments: vec![],
            nullifiers: vec![nullifier],
            encrypted_note: None,
        };
        let report = processor.process(&proposal(1, 1, vec![mined])).unwrap();

        assert_eq!(report.superseded, 1);
        assert_eq!(report.stale_outputs, 1);
        assert!(store.get_transaction(&TxHash::new([40; 32])).unwrap().is_none());
        assert!(store.get_transaction(&TxHash::new([41; 32])).unwrap().is_some());
        assert!(store.get_commitment(&change.hash).unwrap().is_none());
        assert!(store.get_commitment(&respent.hash).unwrap().is_some());
        assert_eq!(store.balance_of(&owner, &EthAddress::new([5; 20])).unwrap(), 0);
    }
}
