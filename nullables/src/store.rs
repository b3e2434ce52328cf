//! Nullable store: thread-safe in-memory storage for testing.
//!
//! Indexed queries are linear scans; the point is determinism, not speed.
//! Writes can be made to fail on demand to exercise error paths.

use shroud_store::{BlockStore, CommitmentStore, StoreError, TransactionStore, TreeStore};
use shroud_types::{
    BlockRecord, CommitmentHash, CommitmentRecord, EthAddress, NullifierHash, TokenId,
    TransactionRecord, TreeRecord, TxHash, ZkpPublicKey,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// An in-memory implementation of every storage trait.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullStore {
    commitments: Mutex<HashMap<CommitmentHash, CommitmentRecord>>,
    transactions: Mutex<HashMap<TxHash, TransactionRecord>>,
    blocks: Mutex<BTreeMap<u64, BlockRecord>>,
    trees: Mutex<BTreeMap<u64, TreeRecord>>,
    fail_writes: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("null store lock poisoned".to_string()))
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            commitments: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
            blocks: Mutex::new(BTreeMap::new()),
            trees: Mutex::new(BTreeMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail with a backend error (or stop doing so).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitmentStore for NullStore {
    fn put_commitment(&self, record: &CommitmentRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        lock(&self.commitments)?.insert(record.hash, record.clone());
        Ok(())
    }

    fn get_commitment(&self, hash: &CommitmentHash) -> Result<Option<CommitmentRecord>, StoreError> {
        Ok(lock(&self.commitments)?.get(hash).cloned())
    }

    fn delete_commitments(&self, hashes: &[CommitmentHash]) -> Result<usize, StoreError> {
        self.check_writable()?;
        let mut commitments = lock(&self.commitments)?;
        Ok(hashes.iter().filter(|h| commitments.remove(h).is_some()).count())
    }

    fn iter_commitments(&self) -> Result<Vec<CommitmentRecord>, StoreError> {
        Ok(lock(&self.commitments)?.values().cloned().collect())
    }

    fn commitment_by_nullifier(
        &self,
        nullifier: &NullifierHash,
    ) -> Result<Option<CommitmentHash>, StoreError> {
        Ok(lock(&self.commitments)?
            .values()
            .find(|c| &c.nullifier == nullifier)
            .map(|c| c.hash))
    }

    fn owned_commitments(
        &self,
        owner: &ZkpPublicKey,
        erc_address: &EthAddress,
        token_id: &TokenId,
    ) -> Result<Vec<CommitmentRecord>, StoreError> {
        Ok(lock(&self.commitments)?
            .values()
            .filter(|c| c.owner() == owner && c.erc_address() == erc_address && c.token_id() == token_id)
            .cloned()
            .collect())
    }

    fn commitments_on_chain_from(
        &self,
        block_number_l2: u64,
    ) -> Result<Vec<CommitmentRecord>, StoreError> {
        Ok(lock(&self.commitments)?
            .values()
            .filter(|c| c.on_chain.is_some_and(|n| n >= block_number_l2))
            .cloned()
            .collect())
    }

    fn commitments_nullified_on_chain_from(
        &self,
        block_number_l2: u64,
    ) -> Result<Vec<CommitmentRecord>, StoreError> {
        Ok(lock(&self.commitments)?
            .values()
            .filter(|c| c.nullified_on_chain.is_some_and(|n| n >= block_number_l2))
            .cloned()
            .collect())
    }

    fn update_commitments(
        &self,
        hashes: &[CommitmentHash],
        update: &mut dyn FnMut(&mut CommitmentRecord) -> bool,
    ) -> Result<usize, StoreError> {
        self.check_writable()?;
        let mut commitments = lock(&self.commitments)?;
        let mut changed = 0;
        for hash in hashes {
            if let Some(record) = commitments.get_mut(hash) {
                let mut next = record.clone();
                if update(&mut next) {
                    *record = next;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}

impl TransactionStore for NullStore {
    fn put_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        lock(&self.transactions)?.insert(record.transaction_hash, record.clone());
        Ok(())
    }

    fn get_transaction(&self, hash: &TxHash) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(lock(&self.transactions)?.get(hash).cloned())
    }

    fn delete_transactions(&self, hashes: &[TxHash]) -> Result<usize, StoreError> {
        self.check_writable()?;
        let mut transactions = lock(&self.transactions)?;
        Ok(hashes.iter().filter(|h| transactions.remove(h).is_some()).count())
    }

    fn iter_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(lock(&self.transactions)?.values().cloned().collect())
    }
}

impl BlockStore for NullStore {
    fn put_block(&self, record: &BlockRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        lock(&self.blocks)?.insert(record.number(), record.clone());
        Ok(())
    }

    fn get_block(&self, block_number_l2: u64) -> Result<Option<BlockRecord>, StoreError> {
        Ok(lock(&self.blocks)?.get(&block_number_l2).cloned())
    }

    fn blocks_from(&self, block_number_l2: u64) -> Result<Vec<BlockRecord>, StoreError> {
        Ok(lock(&self.blocks)?
            .range(block_number_l2..)
            .map(|(_, b)| b.clone())
            .collect())
    }

    fn delete_blocks_from(&self, block_number_l2: u64) -> Result<usize, StoreError> {
        self.check_writable()?;
        let mut blocks = lock(&self.blocks)?;
        let removed = blocks.split_off(&block_number_l2);
        Ok(removed.len())
    }
}

impl TreeStore for NullStore {
    fn put_tree(&self, record: &TreeRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        lock(&self.trees)?.insert(record.block_number_l2, record.clone());
        Ok(())
    }

    fn get_tree(&self, block_number_l2: u64) -> Result<Option<TreeRecord>, StoreError> {
        Ok(lock(&self.trees)?.get(&block_number_l2).cloned())
    }

    fn latest_tree_before(&self, block_number_l2: u64) -> Result<Option<TreeRecord>, StoreError> {
        Ok(lock(&self.trees)?
            .range(..block_number_l2)
            .next_back()
            .map(|(_, t)| t.clone()))
    }

    fn iter_trees(&self) -> Result<Vec<TreeRecord>, StoreError> {
        Ok(lock(&self.trees)?.values().cloned().collect())
    }

    fn delete_tree(&self, block_number_l2: u64) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(lock(&self.trees)?.remove(&block_number_l2).is_some())
    }

    fn delete_trees_from(&self, block_number_l2: u64) -> Result<usize, StoreError> {
        self.check_writable()?;
        let mut trees = lock(&self.trees)?;
        let removed = trees.split_off(&block_number_l2);
        Ok(removed.len())
    }
}
