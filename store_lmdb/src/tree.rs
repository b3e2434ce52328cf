//! LMDB implementation of TreeStore.

use std::ops::Bound;

use shroud_store::{StoreError, TreeStore};
use shroud_types::TreeRecord;

use crate::block::{delete_from, scan_from};
use crate::keys::block_key;
use crate::{LmdbEnvironment, LmdbError};

impl TreeStore for LmdbEnvironment {
    fn put_tree(&self, record: &TreeRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.trees_db
            .put(&mut wtxn, &block_key(record.block_number_l2), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_tree(&self, block_number_l2: u64) -> Result<Option<TreeRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .trees_db
            .get(&rtxn, &block_key(block_number_l2))
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn latest_tree_before(&self, block_number_l2: u64) -> Result<Option<TreeRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let end = block_key(block_number_l2);
        let range: (Bound<&[u8]>, Bound<&[u8]>) = (Bound::Unbounded, Bound::Excluded(&end[..]));
        let last = self
            .trees_db
            .rev_range(&rtxn, &range)
            .map_err(LmdbError::from)?
            .next()
            .transpose()
            .map_err(LmdbError::from)?;
        match last {
            Some((_, bytes)) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn iter_trees(&self) -> Result<Vec<TreeRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let records = scan_from::<TreeRecord>(&rtxn, self.trees_db, 0)?;
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    fn delete_tree(&self, block_number_l2: u64) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let deleted = self
            .trees_db
            .delete(&mut wtxn, &block_key(block_number_l2))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(deleted)
    }

    fn delete_trees_from(&self, block_number_l2: u64) -> Result<usize, StoreError> {
        Ok(delete_from(&self.env, self.trees_db, block_number_l2)?)
    }
}
