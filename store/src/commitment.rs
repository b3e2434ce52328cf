//! Commitment storage trait.
//!
//! Backends implement the primitive reads and [`CommitmentStore::update_commitments`];
//! every lifecycle transition is a provided method built on them, so backends
//! cannot disagree about guard conditions.

use shroud_types::{
    CommitmentHash, CommitmentRecord, EthAddress, L1TxHash, MerkleWitness, NullifierHash, TokenId,
    TransactionType, TxHash, ZkpPublicKey,
};

use crate::balance::{self, Balances};
use crate::StoreError;

/// Where on the chain a block was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainPosition {
    pub block_number_l2: u64,
    pub block_number_l1: u64,
    pub transaction_hash_l1: L1TxHash,
}

pub trait CommitmentStore {
    /// Insert or replace a commitment, keeping secondary indices in step.
    fn put_commitment(&self, record: &CommitmentRecord) -> Result<(), StoreError>;

    fn get_commitment(&self, hash: &CommitmentHash) -> Result<Option<CommitmentRecord>, StoreError>;

    /// Returns how many of `hashes` existed.
    fn delete_commitments(&self, hashes: &[CommitmentHash]) -> Result<usize, StoreError>;

    fn iter_commitments(&self) -> Result<Vec<CommitmentRecord>, StoreError>;

    fn commitment_by_nullifier(
        &self,
        nullifier: &NullifierHash,
    ) -> Result<Option<CommitmentHash>, StoreError>;

    /// Every commitment of `owner` in one asset, whatever its state.
    fn owned_commitments(
        &self,
        owner: &ZkpPublicKey,
        erc_address: &EthAddress,
        token_id: &TokenId,
    ) -> Result<Vec<CommitmentRecord>, StoreError>;

    /// Commitments confirmed at L2 block `block_number_l2` or later.
    fn commitments_on_chain_from(&self, block_number_l2: u64)
        -> Result<Vec<CommitmentRecord>, StoreError>;

    /// Commitments whose spend was confirmed at `block_number_l2` or later.
    fn commitments_nullified_on_chain_from(
        &self,
        block_number_l2: u64,
    ) -> Result<Vec<CommitmentRecord>, StoreError>;

    /// Read-modify-write each listed commitment within one logical operation.
    ///
    /// `update` returns whether it changed the record; only changed records
    /// are written back. Unknown hashes are skipped. Returns the number of
    /// records changed.
    fn update_commitments(
        &self,
        hashes: &[CommitmentHash],
        update: &mut dyn FnMut(&mut CommitmentRecord) -> bool,
    ) -> Result<usize, StoreError>;

    // ── Lookups ──────────────────────────────────────────────────────────

    fn count_commitments(&self, hashes: &[CommitmentHash]) -> Result<usize, StoreError> {
        let mut count = 0;
        for hash in hashes {
            if self.get_commitment(hash)?.is_some() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn count_nullifiers(&self, nullifiers: &[NullifierHash]) -> Result<usize, StoreError> {
        Ok(self.hashes_for_nullifiers(nullifiers)?.len())
    }

    fn hashes_for_nullifiers(
        &self,
        nullifiers: &[NullifierHash],
    ) -> Result<Vec<CommitmentHash>, StoreError> {
        let mut hashes = Vec::new();
        for nullifier in nullifiers {
            if let Some(hash) = self.commitment_by_nullifier(nullifier)? {
                hashes.push(hash);
            }
        }
        Ok(hashes)
    }

    /// Spendable commitments of one asset, ascending by value.
    fn spendable_commitments(
        &self,
        owner: &ZkpPublicKey,
        erc_address: &EthAddress,
        token_id: &TokenId,
    ) -> Result<Vec<CommitmentRecord>, StoreError> {
        let mut candidates: Vec<CommitmentRecord> = self
            .owned_commitments(owner, erc_address, token_id)?
            .into_iter()
            .filter(CommitmentRecord::is_spendable)
            .collect();
        candidates.sort_by_key(CommitmentRecord::value);
        Ok(candidates)
    }

    /// Every commitment of `owner` that has not been spent.
    fn wallet_commitments(&self, owner: &ZkpPublicKey) -> Result<Vec<CommitmentRecord>, StoreError> {
        Ok(self
            .iter_commitments()?
            .into_iter()
            .filter(|c| c.owner() == owner && !c.is_nullified && c.nullified_on_chain.is_none())
            .collect())
    }

    // ── Confirmation ─────────────────────────────────────────────────────

    /// Confirm commitments at `position`. Rows already confirmed are left alone.
    fn mark_on_chain(
        &self,
        hashes: &[CommitmentHash],
        position: ChainPosition,
    ) -> Result<usize, StoreError> {
        self.update_commitments(hashes, &mut |c| {
            if c.on_chain.is_some() {
                return false;
            }
            c.on_chain = Some(position.block_number_l2);
            c.block_number_l1 = Some(position.block_number_l1);
            c.committed_l1 = Some(position.transaction_hash_l1);
            true
        })
    }

    /// Confirm the spend of the commitments behind `nullifiers`. Rows whose
    /// spend is already confirmed are left alone.
    fn mark_nullified_on_chain(
        &self,
        nullifiers: &[NullifierHash],
        position: ChainPosition,
    ) -> Result<usize, StoreError> {
        let hashes = self.hashes_for_nullifiers(nullifiers)?;
        self.update_commitments(&hashes, &mut |c| {
            if c.nullified_on_chain.is_some() {
                return false;
            }
            c.nullified_on_chain = Some(position.block_number_l2);
            c.block_number_l1 = Some(position.block_number_l1);
            c.nullified_l1 = Some(position.transaction_hash_l1);
            true
        })
    }

    /// Cache the membership proof of a confirmed commitment.
    fn set_witness(&self, hash: &CommitmentHash, witness: MerkleWitness) -> Result<bool, StoreError> {
        let changed = self.update_commitments(std::slice::from_ref(hash), &mut |c| {
            if c.on_chain.is_none() || c.witness.as_ref() == Some(&witness) {
                return false;
            }
            c.witness = Some(witness.clone());
            true
        })?;
        Ok(changed > 0)
    }

    // ── Spend reservation ────────────────────────────────────────────────

    fn mark_pending(&self, hashes: &[CommitmentHash]) -> Result<usize, StoreError> {
        self.update_commitments(hashes, &mut |c| {
            if c.is_pending_nullification {
                return false;
            }
            c.is_pending_nullification = true;
            true
        })
    }

    fn clear_pending(&self, hashes: &[CommitmentHash]) -> Result<usize, StoreError> {
        self.update_commitments(hashes, &mut |c| {
            if !c.is_pending_nullification {
                return false;
            }
            c.is_pending_nullification = false;
            true
        })
    }

    /// Record that `spent_in` spends these commitments.
    fn mark_nullified(
        &self,
        hashes: &[CommitmentHash],
        spent_in: TxHash,
        spend_type: TransactionType,
    ) -> Result<usize, StoreError> {
        self.update_commitments(hashes, &mut |c| {
            c.is_pending_nullification = false;
            c.is_nullified = true;
            c.spent_in = Some(spent_in);
            c.spend_type = Some(spend_type);
            true
        })
    }

    // ── Rollback ─────────────────────────────────────────────────────────

    /// Forget spends confirmed at `block_number_l2` or later.
    fn clear_nullified_from(&self, block_number_l2: u64) -> Result<usize, StoreError> {
        let hashes: Vec<CommitmentHash> = self
            .commitments_nullified_on_chain_from(block_number_l2)?
            .iter()
            .map(|c| c.hash)
            .collect();
        self.update_commitments(&hashes, &mut |c| match c.nullified_on_chain {
            Some(n) if n >= block_number_l2 => {
                c.nullified_on_chain = None;
                c.nullified_l1 = None;
                c.block_number_l1 = None;
                true
            }
            _ => false,
        })
    }

    /// Forget confirmations at `block_number_l2` or later.
    fn clear_on_chain_from(&self, block_number_l2: u64) -> Result<usize, StoreError> {
        let hashes: Vec<CommitmentHash> = self
            .commitments_on_chain_from(block_number_l2)?
            .iter()
            .map(|c| c.hash)
            .collect();
        self.update_commitments(&hashes, &mut |c| match c.on_chain {
            Some(n) if n >= block_number_l2 => {
                c.on_chain = None;
                c.committed_l1 = None;
                c.block_number_l1 = None;
                c.witness = None;
                true
            }
            _ => false,
        })
    }

    /// Undo confirmations carried by an un-emitted L1 transaction.
    fn reset_committed_in_l1(&self, transaction_hash_l1: &L1TxHash) -> Result<usize, StoreError> {
        let hashes: Vec<CommitmentHash> = self
            .iter_commitments()?
            .iter()
            .filter(|c| c.committed_l1.as_ref() == Some(transaction_hash_l1))
            .map(|c| c.hash)
            .collect();
        self.update_commitments(&hashes, &mut |c| {
            c.on_chain = None;
            c.committed_l1 = None;
            c.block_number_l1 = None;
            c.witness = None;
            true
        })
    }

    /// Undo spend confirmations carried by an un-emitted L1 transaction.
    fn reset_nullified_in_l1(&self, transaction_hash_l1: &L1TxHash) -> Result<usize, StoreError> {
        let hashes: Vec<CommitmentHash> = self
            .iter_commitments()?
            .iter()
            .filter(|c| c.nullified_l1.as_ref() == Some(transaction_hash_l1))
            .map(|c| c.hash)
            .collect();
        self.update_commitments(&hashes, &mut |c| {
            c.nullified_on_chain = None;
            c.nullified_l1 = None;
            c.block_number_l1 = None;
            true
        })
    }

    // ── Balances ─────────────────────────────────────────────────────────

    fn balances(&self) -> Result<Balances, StoreError> {
        Ok(Balances::aggregate(&self.iter_commitments()?, balance::is_spendable))
    }

    fn balance_of(&self, owner: &ZkpPublicKey, erc_address: &EthAddress) -> Result<u128, StoreError> {
        Ok(self.balances()?.get(owner, erc_address))
    }

    fn pending_deposit_balances(&self) -> Result<Balances, StoreError> {
        Ok(Balances::aggregate(&self.iter_commitments()?, balance::is_pending_deposit))
    }

    fn pending_spent_balances(&self) -> Result<Balances, StoreError> {
        Ok(Balances::aggregate(&self.iter_commitments()?, balance::is_pending_spent))
    }
}
