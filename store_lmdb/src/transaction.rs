//! LMDB implementation of TransactionStore.

use shroud_store::{StoreError, TransactionStore};
use shroud_types::{TransactionRecord, TxHash};

use crate::{LmdbEnvironment, LmdbError};

impl TransactionStore for LmdbEnvironment {
    fn put_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.transactions_db
            .put(&mut wtxn, record.transaction_hash.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_transaction(&self, hash: &TxHash) -> Result<Option<TransactionRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .transactions_db
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn delete_transactions(&self, hashes: &[TxHash]) -> Result<usize, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut deleted = 0;
        for hash in hashes {
            if self
                .transactions_db
                .delete(&mut wtxn, hash.as_bytes())
                .map_err(LmdbError::from)?
            {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(deleted)
    }

    fn iter_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for entry in self.transactions_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_, bytes) = entry.map_err(LmdbError::from)?;
            records.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(records)
    }
}
