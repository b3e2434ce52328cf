//! Fundamental types for the shroud wallet.
//!
//! This crate defines the types shared by every other crate in the workspace:
//! fixed-width identifiers, key material, commitment and transaction records,
//! block and tree-snapshot records, and the chain events the sync engine consumes.

#[macro_use]
mod macros;

pub mod address;
pub mod block;
pub mod commitment;
pub mod error;
pub mod event;
pub mod hash;
pub mod keys;
pub mod time;
pub mod transaction;
pub mod tree;

pub use address::{EthAddress, TokenId};
pub use block::{BlockRecord, L2Block};
pub use commitment::{CommitmentRecord, Preimage};
pub use error::TypesError;
pub use event::{BlockProposed, ChainEvent, EventPayload, Rollback};
pub use hash::{CommitmentHash, Hash32, L1TxHash, NullifierHash, TxHash};
pub use keys::{NullifierKey, Salt, ZkpPrivateKey, ZkpPublicKey};
pub use time::{Clock, SystemClock, Timestamp};
pub use transaction::{EncryptedNote, L2Transaction, TransactionRecord, TransactionType};
pub use tree::{MerkleWitness, TreeRecord, TreeSnapshot};
