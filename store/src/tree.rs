//! Tree snapshot storage trait. Keys are L2 block numbers.

use shroud_types::{L1TxHash, TreeRecord};

use crate::StoreError;

pub trait TreeStore {
    /// Insert or replace the snapshot taken after a block.
    fn put_tree(&self, record: &TreeRecord) -> Result<(), StoreError>;

    fn get_tree(&self, block_number_l2: u64) -> Result<Option<TreeRecord>, StoreError>;

    /// The snapshot with the highest block number strictly below `block_number_l2`.
    fn latest_tree_before(&self, block_number_l2: u64) -> Result<Option<TreeRecord>, StoreError>;

    fn iter_trees(&self) -> Result<Vec<TreeRecord>, StoreError>;

    fn delete_tree(&self, block_number_l2: u64) -> Result<bool, StoreError>;

    /// Delete snapshots numbered `block_number_l2` or higher; returns how many.
    fn delete_trees_from(&self, block_number_l2: u64) -> Result<usize, StoreError>;

    fn latest_tree(&self) -> Result<Option<TreeRecord>, StoreError> {
        self.latest_tree_before(u64::MAX)
    }

    fn delete_tree_by_l1_transaction(&self, transaction_hash_l1: &L1TxHash) -> Result<usize, StoreError> {
        let mut deleted = 0;
        for record in self.iter_trees()? {
            if &record.transaction_hash_l1 == transaction_hash_l1 && self.delete_tree(record.block_number_l2)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
