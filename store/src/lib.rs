//! Abstract storage traits for the shroud wallet.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! Writes are upserts keyed by primary key: re-delivering the same block or
//! transaction replaces the stored record instead of failing.

pub mod balance;
pub mod block;
pub mod commitment;
pub mod error;
pub mod meta;
pub mod transaction;
pub mod tree;

pub use balance::Balances;
pub use block::BlockStore;
pub use commitment::{ChainPosition, CommitmentStore};
pub use error::StoreError;
pub use meta::MetaStore;
pub use transaction::TransactionStore;
pub use tree::TreeStore;

/// Everything the sync engine and the wallet need from one backend.
pub trait LedgerStore:
    CommitmentStore + TransactionStore + BlockStore + TreeStore + Send + Sync
{
}

impl<T> LedgerStore for T where
    T: CommitmentStore + TransactionStore + BlockStore + TreeStore + Send + Sync
{
}
