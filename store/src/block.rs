//! Block index storage trait. Keys are L2 block numbers.

use shroud_types::{BlockRecord, L1TxHash};

use crate::StoreError;

pub trait BlockStore {
    /// Insert or replace the block at its L2 number.
    fn put_block(&self, record: &BlockRecord) -> Result<(), StoreError>;

    fn get_block(&self, block_number_l2: u64) -> Result<Option<BlockRecord>, StoreError>;

    /// Blocks numbered `block_number_l2` or higher, ascending.
    fn blocks_from(&self, block_number_l2: u64) -> Result<Vec<BlockRecord>, StoreError>;

    /// Delete blocks numbered `block_number_l2` or higher; returns how many.
    fn delete_blocks_from(&self, block_number_l2: u64) -> Result<usize, StoreError>;

    fn block_by_l1_transaction(
        &self,
        transaction_hash_l1: &L1TxHash,
    ) -> Result<Option<BlockRecord>, StoreError> {
        Ok(self
            .blocks_from(0)?
            .into_iter()
            .find(|b| &b.transaction_hash_l1 == transaction_hash_l1))
    }

    /// Clear the L1 block number of the block carried by an un-emitted L1 transaction.
    fn clear_block_l1(&self, transaction_hash_l1: &L1TxHash) -> Result<bool, StoreError> {
        match self.block_by_l1_transaction(transaction_hash_l1)? {
            Some(mut record) if record.block_number_l1.is_some() => {
                record.block_number_l1 = None;
                self.put_block(&record)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
