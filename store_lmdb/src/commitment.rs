//! LMDB implementation of CommitmentStore.
//!
//! Every write goes through [`LmdbEnvironment::write_commitment`] or
//! [`LmdbEnvironment::remove_commitment`], which keep the four secondary
//! indices in the same write transaction as the record itself.

use std::ops::Bound;

use heed::{RoTxn, RwTxn};
use shroud_store::{CommitmentStore, StoreError};
use shroud_types::{CommitmentHash, CommitmentRecord, EthAddress, NullifierHash, TokenId, ZkpPublicKey};

use crate::keys::{block_hash_key, block_key, increment_prefix, owner_key, owner_prefix, trailing_hash};
use crate::{LmdbEnvironment, LmdbError};

impl LmdbEnvironment {
    fn read_commitment(
        &self,
        txn: &RoTxn<'_>,
        hash: &CommitmentHash,
    ) -> Result<Option<CommitmentRecord>, LmdbError> {
        match self.commitments_db.get(txn, hash.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    /// Read the records behind index entries, failing on dangling entries.
    fn resolve(
        &self,
        txn: &RoTxn<'_>,
        hashes: Vec<CommitmentHash>,
    ) -> Result<Vec<CommitmentRecord>, LmdbError> {
        hashes
            .into_iter()
            .map(|hash| {
                self.read_commitment(txn, &hash)?
                    .ok_or_else(|| LmdbError::Corruption(format!("index points at missing commitment {hash}")))
            })
            .collect()
    }

    fn unindex(&self, wtxn: &mut RwTxn<'_>, record: &CommitmentRecord) -> Result<(), LmdbError> {
        let key = owner_key(record.owner(), record.erc_address(), record.token_id(), &record.hash);
        self.owner_index_db.delete(wtxn, &key)?;
        self.nullifier_index_db.delete(wtxn, record.nullifier.as_bytes())?;
        if let Some(block) = record.on_chain {
            self.on_chain_index_db.delete(wtxn, &block_hash_key(block, &record.hash))?;
        }
        if let Some(block) = record.nullified_on_chain {
            self.nullified_index_db.delete(wtxn, &block_hash_key(block, &record.hash))?;
        }
        Ok(())
    }

    fn index(&self, wtxn: &mut RwTxn<'_>, record: &CommitmentRecord) -> Result<(), LmdbError> {
        let key = owner_key(record.owner(), record.erc_address(), record.token_id(), &record.hash);
        self.owner_index_db.put(wtxn, &key, &[])?;
        self.nullifier_index_db
            .put(wtxn, record.nullifier.as_bytes(), record.hash.as_bytes())?;
        if let Some(block) = record.on_chain {
            self.on_chain_index_db.put(wtxn, &block_hash_key(block, &record.hash), &[])?;
        }
        if let Some(block) = record.nullified_on_chain {
            self.nullified_index_db.put(wtxn, &block_hash_key(block, &record.hash), &[])?;
        }
        Ok(())
    }

    fn write_commitment(
        &self,
        wtxn: &mut RwTxn<'_>,
        previous: Option<&CommitmentRecord>,
        record: &CommitmentRecord,
    ) -> Result<(), LmdbError> {
        if let Some(previous) = previous {
            self.unindex(wtxn, previous)?;
        }
        let bytes = bincode::serialize(record)?;
        self.commitments_db.put(wtxn, record.hash.as_bytes(), &bytes)?;
        self.index(wtxn, record)
    }

    fn remove_commitment(&self, wtxn: &mut RwTxn<'_>, hash: &CommitmentHash) -> Result<bool, LmdbError> {
        match self.read_commitment(wtxn, hash)? {
            Some(record) => {
                self.unindex(wtxn, &record)?;
                self.commitments_db.delete(wtxn, hash.as_bytes())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Hashes listed in a block-keyed index at `from` or later.
    fn scan_block_index(
        &self,
        txn: &RoTxn<'_>,
        db: heed::Database<heed::types::Bytes, heed::types::Bytes>,
        from: u64,
    ) -> Result<Vec<CommitmentHash>, LmdbError> {
        let start = block_key(from);
        let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (Bound::Included(&start[..]), Bound::Unbounded);
        let mut hashes = Vec::new();
        for entry in db.range(txn, &bounds)? {
            let (key, _) = entry?;
            hashes.push(trailing_hash(key)?);
        }
        Ok(hashes)
    }
}

impl CommitmentStore for LmdbEnvironment {
    fn put_commitment(&self, record: &CommitmentRecord) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let previous = self.read_commitment(&wtxn, &record.hash)?;
        self.write_commitment(&mut wtxn, previous.as_ref(), record)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_commitment(&self, hash: &CommitmentHash) -> Result<Option<CommitmentRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_commitment(&rtxn, hash)?)
    }

    fn delete_commitments(&self, hashes: &[CommitmentHash]) -> Result<usize, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut deleted = 0;
        for hash in hashes {
            if self.remove_commitment(&mut wtxn, hash)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(deleted)
    }

    fn iter_commitments(&self) -> Result<Vec<CommitmentRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for entry in self.commitments_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_, bytes) = entry.map_err(LmdbError::from)?;
            records.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(records)
    }

    fn commitment_by_nullifier(
        &self,
        nullifier: &NullifierHash,
    ) -> Result<Option<CommitmentHash>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .nullifier_index_db
            .get(&rtxn, nullifier.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(trailing_hash(bytes)?)),
            None => Ok(None),
        }
    }

    fn owned_commitments(
        &self,
        owner: &ZkpPublicKey,
        erc_address: &EthAddress,
        token_id: &TokenId,
    ) -> Result<Vec<CommitmentRecord>, StoreError> {
        let prefix = owner_prefix(owner, erc_address, token_id);
        let upper = increment_prefix(&prefix);
        let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (
            Bound::Included(prefix.as_slice()),
            upper.as_deref().map_or(Bound::Unbounded, Bound::Excluded),
        );

        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut hashes = Vec::new();
        for entry in self.owner_index_db.range(&rtxn, &bounds).map_err(LmdbError::from)? {
            let (key, _) = entry.map_err(LmdbError::from)?;
            hashes.push(trailing_hash(key)?);
        }
        Ok(self.resolve(&rtxn, hashes)?)
    }

    fn commitments_on_chain_from(
        &self,
        block_number_l2: u64,
    ) -> Result<Vec<CommitmentRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let hashes = self.scan_block_index(&rtxn, self.on_chain_index_db, block_number_l2)?;
        Ok(self.resolve(&rtxn, hashes)?)
    }

    fn commitments_nullified_on_chain_from(
        &self,
        block_number_l2: u64,
    ) -> Result<Vec<CommitmentRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let hashes = self.scan_block_index(&rtxn, self.nullified_index_db, block_number_l2)?;
        Ok(self.resolve(&rtxn, hashes)?)
    }

    fn update_commitments(
        &self,
        hashes: &[CommitmentHash],
        update: &mut dyn FnMut(&mut CommitmentRecord) -> bool,
    ) -> Result<usize, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut changed = 0;
        for hash in hashes {
            let Some(previous) = self.read_commitment(&wtxn, hash)? else {
                continue;
            };
            let mut record = previous.clone();
            if update(&mut record) {
                self.write_commitment(&mut wtxn, Some(&previous), &record)?;
                changed += 1;
            }
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(changed)
    }
}
