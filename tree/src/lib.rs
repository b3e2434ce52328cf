//! Append-only binary Merkle trees.
//!
//! The commitment tree is never held in memory: each L2 block appends its
//! commitments to the previous block's [`TreeSnapshot`] (root, frontier, leaf
//! count), and the sibling paths of the appended leaves are computed from the
//! snapshot and the new leaves alone. The per-block transaction-hash tree is
//! small and built in full with [`MerkleTree`].
//!
//! Interior nodes hash a domain tag and both children with Blake2b-256. Empty
//! leaves are the zero hash, the same sentinel padded transactions use.

pub mod error;
pub mod hasher;
pub mod merkle;
pub mod stateless;

pub use error::TreeError;
pub use hasher::{hash_node, zero_ladder};
pub use merkle::MerkleTree;
pub use stateless::{
    compute_root, empty_snapshot, stateless_sibling_path, stateless_update, AppendBatch,
    MAX_HEIGHT,
};
