//! Node hashing and the empty-subtree ladder.

use shroud_crypto::blake2b_256_multi;
use shroud_types::Hash32;

const NODE_DOMAIN: &[u8] = b"shroud-merkle-node-v1";

pub fn hash_node(left: &Hash32, right: &Hash32) -> Hash32 {
    Hash32::new(blake2b_256_multi(&[NODE_DOMAIN, left.as_bytes(), right.as_bytes()]))
}

/// `ladder[h]` is the root of an empty subtree of height `h`, for `h` in `0..=height`.
pub fn zero_ladder(height: u8) -> Vec<Hash32> {
    let mut ladder = Vec::with_capacity(height as usize + 1);
    ladder.push(Hash32::ZERO);
    for h in 0..height as usize {
        let below = ladder[h];
        ladder.push(hash_node(&below, &below));
    }
    ladder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_starts_at_zero_leaf() {
        let ladder = zero_ladder(3);
        assert_eq!(ladder.len(), 4);
        assert_eq!(ladder[0], Hash32::ZERO);
        assert_eq!(ladder[1], hash_node(&Hash32::ZERO, &Hash32::ZERO));
    }

    #[test]
    fn node_hash_is_order_sensitive() {
        let a = Hash32::new([1; 32]);
        let b = Hash32::new([2; 32]);
        assert_ne!(hash_node(&a, &b), hash_node(&b, &a));
    }
}
