//! Snapshot-based append and sibling-path computation.
//!
//! A snapshot's frontier stores, for every level, the most recent node with an
//! even index (a left child). When new leaves are appended, every node whose
//! left child lies before the appended region is exactly that frontier entry,
//! and every right child past the region is an empty subtree. That is enough
//! to recompute the nodes above the new leaves and to read off their paths.

use shroud_types::{Hash32, TreeSnapshot};

use crate::error::TreeError;
use crate::hasher::{hash_node, zero_ladder};

pub const MAX_HEIGHT: u8 = 63;

pub fn empty_snapshot(height: u8) -> TreeSnapshot {
    let ladder = zero_ladder(height);
    TreeSnapshot {
        root: ladder[height as usize],
        frontier: vec![Hash32::ZERO; height as usize],
        leaf_count: 0,
    }
}

/// One level of recomputed nodes: the index of the first node and the nodes.
struct Level {
    first: u64,
    nodes: Vec<Hash32>,
}

impl Level {
    fn last(&self) -> u64 {
        self.first + self.nodes.len() as u64 - 1
    }

    fn get(&self, index: u64) -> Option<Hash32> {
        if index >= self.first && index <= self.last() {
            Some(self.nodes[(index - self.first) as usize])
        } else {
            None
        }
    }
}

/// Every node touched by appending a batch of leaves to a snapshot.
pub struct AppendBatch<'a> {
    base: &'a TreeSnapshot,
    height: u8,
    ladder: Vec<Hash32>,
    levels: Vec<Level>,
}

impl<'a> AppendBatch<'a> {
    pub fn new(base: &'a TreeSnapshot, leaves: &[Hash32], height: u8) -> Result<Self, TreeError> {
        if height == 0 || height > MAX_HEIGHT {
            return Err(TreeError::UnsupportedHeight(height));
        }
        if base.frontier.len() != height as usize {
            return Err(TreeError::HeightMismatch {
                expected: height as usize,
                actual: base.frontier.len(),
            });
        }
        let requested = base.leaf_count + leaves.len() as u64;
        if requested > 1u64 << height {
            return Err(TreeError::Full { height, requested });
        }

        let ladder = zero_ladder(height);
        let mut levels = Vec::with_capacity(height as usize + 1);
        if !leaves.is_empty() {
            levels.push(Level {
                first: base.leaf_count,
                nodes: leaves.to_vec(),
            });
            for h in 0..height as usize {
                let below = &levels[h];
                let first = below.first >> 1;
                let last = below.last() >> 1;
                let nodes = (first..=last)
                    .map(|i| {
                        let left = below.get(2 * i).unwrap_or(base.frontier[h]);
                        let right = below.get(2 * i + 1).unwrap_or(ladder[h]);
                        hash_node(&left, &right)
                    })
                    .collect();
                levels.push(Level { first, nodes });
            }
        }

        Ok(Self {
            base,
            height,
            ladder,
            levels,
        })
    }

    pub fn len(&self) -> usize {
        self.levels.first().map_or(0, |l| l.nodes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Global leaf index of the `index`-th appended leaf.
    pub fn leaf_index(&self, index: usize) -> u64 {
        self.base.leaf_count + index as u64
    }

    /// The snapshot after the append.
    pub fn snapshot(&self) -> TreeSnapshot {
        if self.levels.is_empty() {
            return self.base.clone();
        }
        let mut frontier = self.base.frontier.clone();
        for (h, slot) in frontier.iter_mut().enumerate() {
            let level = &self.levels[h];
            let last_left = level.last() & !1;
            if let Some(node) = level.get(last_left) {
                *slot = node;
            }
        }
        TreeSnapshot {
            root: self.levels[self.height as usize].nodes[0],
            frontier,
            leaf_count: self.base.leaf_count + self.len() as u64,
        }
    }

    /// Sibling path (leaf level first) of the `index`-th appended leaf.
    pub fn sibling_path(&self, index: usize) -> Result<Vec<Hash32>, TreeError> {
        if index >= self.len() {
            return Err(TreeError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        let position = self.leaf_index(index);
        let path = (0..self.height as usize)
            .map(|h| {
                let level = &self.levels[h];
                let sibling = (position >> h) ^ 1;
                level.get(sibling).unwrap_or_else(|| {
                    if sibling < level.first {
                        self.base.frontier[h]
                    } else {
                        self.ladder[h]
                    }
                })
            })
            .collect();
        Ok(path)
    }
}

/// Append `leaves` to `snapshot` and return the new snapshot.
pub fn stateless_update(
    snapshot: &TreeSnapshot,
    leaves: &[Hash32],
    height: u8,
) -> Result<TreeSnapshot, TreeError> {
    Ok(AppendBatch::new(snapshot, leaves, height)?.snapshot())
}

/// Sibling path of `leaves[index]` in the tree obtained by appending `leaves`
/// to `snapshot`.
pub fn stateless_sibling_path(
    snapshot: &TreeSnapshot,
    leaves: &[Hash32],
    index: usize,
    height: u8,
) -> Result<Vec<Hash32>, TreeError> {
    AppendBatch::new(snapshot, leaves, height)?.sibling_path(index)
}

/// Root implied by a leaf, its index and its sibling path.
pub fn compute_root(leaf: &Hash32, index: u64, path: &[Hash32]) -> Hash32 {
    path.iter().enumerate().fold(*leaf, |node, (h, sibling)| {
        if (index >> h) & 1 == 0 {
            hash_node(&node, sibling)
        } else {
            hash_node(sibling, &node)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> Hash32 {
        Hash32::new([n; 32])
    }

    #[test]
    fn empty_append_keeps_snapshot() {
        let base = empty_snapshot(4);
        assert_eq!(stateless_update(&base, &[], 4).unwrap(), base);
    }

    #[test]
    fn single_leaf_root() {
        let ladder = zero_ladder(2);
        let snap = stateless_update(&empty_snapshot(2), &[leaf(1)], 2).unwrap();
        let expected = hash_node(&hash_node(&leaf(1), &ladder[0]), &ladder[1]);
        assert_eq!(snap.root, expected);
        assert_eq!(snap.leaf_count, 1);
    }

    #[test]
    fn split_appends_match_one_append() {
        let leaves: Vec<Hash32> = (1..=7).map(leaf).collect();
        let whole = stateless_update(&empty_snapshot(4), &leaves, 4).unwrap();

        let first = stateless_update(&empty_snapshot(4), &leaves[..3], 4).unwrap();
        let second = stateless_update(&first, &leaves[3..5], 4).unwrap();
        let third = stateless_update(&second, &leaves[5..], 4).unwrap();
        assert_eq!(third.root, whole.root);
        assert_eq!(third.leaf_count, 7);
    }

    #[test]
    fn paths_of_appended_leaves_verify() {
        let leaves: Vec<Hash32> = (1..=5).map(leaf).collect();
        let base = stateless_update(&empty_snapshot(3), &leaves[..3], 3).unwrap();
        let batch = AppendBatch::new(&base, &leaves[3..], 3).unwrap();
        let updated = batch.snapshot();
        for i in 0..2 {
            let path = batch.sibling_path(i).unwrap();
            assert_eq!(path.len(), 3);
            assert_eq!(
                compute_root(&leaves[3 + i], batch.leaf_index(i), &path),
                updated.root
            );
        }
    }

    #[test]
    fn full_tree_rejects_more_leaves() {
        let leaves: Vec<Hash32> = (1..=4).map(leaf).collect();
        let full = stateless_update(&empty_snapshot(2), &leaves, 2).unwrap();
        assert_eq!(
            stateless_update(&full, &[leaf(9)], 2),
            Err(TreeError::Full {
                height: 2,
                requested: 5
            })
        );
    }

    #[test]
    fn height_must_match_frontier() {
        let err = stateless_update(&empty_snapshot(3), &[leaf(1)], 4).unwrap_err();
        assert_eq!(
            err,
            TreeError::HeightMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn index_past_batch_is_rejected() {
        let base = empty_snapshot(3);
        assert!(matches!(
            stateless_sibling_path(&base, &[leaf(1)], 1, 3),
            Err(TreeError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }
}
