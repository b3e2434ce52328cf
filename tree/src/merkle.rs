//! Fully materialized tree over a short list of leaves.

use shroud_types::{Hash32, TreeSnapshot};

use crate::error::TreeError;
use crate::stateless::{compute_root, empty_snapshot, AppendBatch};

/// A tree built from scratch over `leaves`, for proofs against a per-block root.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    height: u8,
    leaves: Vec<Hash32>,
    empty: TreeSnapshot,
    snapshot: TreeSnapshot,
}

impl MerkleTree {
    pub fn new(leaves: Vec<Hash32>, height: u8) -> Result<Self, TreeError> {
        let empty = empty_snapshot(height);
        let snapshot = AppendBatch::new(&empty, &leaves, height)?.snapshot();
        Ok(Self {
            height,
            leaves,
            empty,
            snapshot,
        })
    }

    /// Smallest height `h >= 1` with `2^h >= leaf_count`.
    pub fn height_for(leaf_count: usize) -> u8 {
        let mut height = 1u8;
        while (1usize << height) < leaf_count {
            height += 1;
        }
        height
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn root(&self) -> Hash32 {
        self.snapshot.root
    }

    pub fn leaf_index(&self, leaf: &Hash32) -> Option<usize> {
        self.leaves.iter().position(|l| l == leaf)
    }

    /// Sibling path of the first occurrence of `leaf`.
    pub fn sibling_path(&self, leaf: &Hash32) -> Result<Option<Vec<Hash32>>, TreeError> {
        let Some(index) = self.leaf_index(leaf) else {
            return Ok(None);
        };
        let batch = AppendBatch::new(&self.empty, &self.leaves, self.height)?;
        batch.sibling_path(index).map(Some)
    }

    pub fn verify(&self, leaf: &Hash32, index: u64, path: &[Hash32]) -> bool {
        compute_root(leaf, index, path) == self.root()
    }
}
