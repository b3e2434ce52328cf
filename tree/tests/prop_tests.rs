use proptest::prelude::*;

use shroud_tree::{compute_root, empty_snapshot, stateless_update, AppendBatch};
use shroud_types::Hash32;

const HEIGHT: u8 = 6;

fn leaves(max: usize) -> impl Strategy<Value = Vec<Hash32>> {
    prop::collection::vec(prop::array::uniform32(1u8..), 0..max)
        .prop_map(|v| v.into_iter().map(Hash32::new).collect())
}

proptest! {
    /// Appending in two batches gives the same snapshot as one batch.
    #[test]
    fn split_point_does_not_matter(all in leaves(40), split in 0usize..40) {
        let split = split.min(all.len());
        let once = stateless_update(&empty_snapshot(HEIGHT), &all, HEIGHT).unwrap();
        let first = stateless_update(&empty_snapshot(HEIGHT), &all[..split], HEIGHT).unwrap();
        let twice = stateless_update(&first, &all[split..], HEIGHT).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Every appended leaf's path recomputes the updated root.
    #[test]
    fn appended_paths_verify(old in leaves(30), new in leaves(30)) {
        let base = stateless_update(&empty_snapshot(HEIGHT), &old, HEIGHT).unwrap();
        let batch = AppendBatch::new(&base, &new, HEIGHT).unwrap();
        let root = batch.snapshot().root;
        for (i, leaf) in new.iter().enumerate() {
            let path = batch.sibling_path(i).unwrap();
            prop_assert_eq!(compute_root(leaf, batch.leaf_index(i), &path), root);
        }
    }
}
