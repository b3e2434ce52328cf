//! LMDB implementation of BlockStore.

use std::ops::Bound;

use heed::types::Bytes;
use heed::{Database, RoTxn};
use serde::de::DeserializeOwned;
use shroud_store::{BlockStore, StoreError};
use shroud_types::BlockRecord;

use crate::keys::{block_key, parse_block_key};
use crate::{LmdbEnvironment, LmdbError};

/// Records in a block-keyed table at `from` or later, with their keys.
pub(crate) fn scan_from<T: DeserializeOwned>(
    txn: &RoTxn<'_>,
    db: Database<Bytes, Bytes>,
    from: u64,
) -> Result<Vec<(u64, T)>, LmdbError> {
    let start = block_key(from);
    let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (Bound::Included(&start[..]), Bound::Unbounded);
    let mut records = Vec::new();
    for entry in db.range(txn, &bounds)? {
        let (key, bytes) = entry?;
        records.push((parse_block_key(key)?, bincode::deserialize(bytes)?));
    }
    Ok(records)
}

/// Delete every key at `from` or later in a block-keyed table.
pub(crate) fn delete_from(
    env: &heed::Env,
    db: Database<Bytes, Bytes>,
    from: u64,
) -> Result<usize, LmdbError> {
    let start = block_key(from);
    let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (Bound::Included(&start[..]), Bound::Unbounded);
    let mut wtxn = env.write_txn()?;
    let deleted = db.delete_range(&mut wtxn, &bounds)?;
    wtxn.commit()?;
    Ok(deleted)
}

impl BlockStore for LmdbEnvironment {
    fn put_block(&self, record: &BlockRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.blocks_db
            .put(&mut wtxn, &block_key(record.number()), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_block(&self, block_number_l2: u64) -> Result<Option<BlockRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .blocks_db
            .get(&rtxn, &block_key(block_number_l2))
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn blocks_from(&self, block_number_l2: u64) -> Result<Vec<BlockRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let records = scan_from::<BlockRecord>(&rtxn, self.blocks_db, block_number_l2)?;
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    fn delete_blocks_from(&self, block_number_l2: u64) -> Result<usize, StoreError> {
        Ok(delete_from(&self.env, self.blocks_db, block_number_l2)?)
    }
}
