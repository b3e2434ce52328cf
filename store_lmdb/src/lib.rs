//! LMDB storage backend for the shroud wallet.
//!
//! Implements every storage trait from `shroud-store` on one `heed`
//! environment. Records are bincode-encoded; block-keyed tables use
//! big-endian block numbers so key order is numeric order.

pub mod block;
pub mod commitment;
pub mod environment;
pub mod error;
pub mod keys;
pub mod meta;
pub mod transaction;
pub mod tree;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
