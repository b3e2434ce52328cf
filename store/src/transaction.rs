//! Transaction storage trait.

use shroud_types::{CommitmentHash, MerkleWitness, NullifierHash, TransactionRecord, TxHash};

use crate::StoreError;

pub trait TransactionStore {
    /// Insert or replace a transaction record.
    fn put_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError>;

    fn get_transaction(&self, hash: &TxHash) -> Result<Option<TransactionRecord>, StoreError>;

    /// Returns how many of `hashes` existed.
    fn delete_transactions(&self, hashes: &[TxHash]) -> Result<usize, StoreError>;

    fn iter_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError>;

    /// Cache the transaction-hash tree proof of a withdrawal.
    fn set_transaction_witness(
        &self,
        hash: &TxHash,
        witness: MerkleWitness,
    ) -> Result<bool, StoreError> {
        match self.get_transaction(hash)? {
            Some(mut record) if record.witness.as_ref() != Some(&witness) => {
                record.witness = Some(witness);
                self.put_transaction(&record)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Other stored transactions claiming any of the same outputs or inputs.
    fn conflicting_transactions(
        &self,
        keep: &TxHash,
        commitments: &[CommitmentHash],
        nullifiers: &[NullifierHash],
    ) -> Result<Vec<TxHash>, StoreError> {
        if commitments.is_empty() && nullifiers.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .iter_transactions()?
            .into_iter()
            .filter(|t| &t.transaction_hash != keep)
            .filter(|t| t.shares_outputs_or_inputs(commitments, nullifiers))
            .map(|t| t.transaction_hash)
            .collect())
    }
}
