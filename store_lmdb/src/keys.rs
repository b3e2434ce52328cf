//! Binary key layouts.
//!
//! | table | key | value |
//! |---|---|---|
//! | commitments | hash | record |
//! | commitment_owner | owner ++ erc ++ token_id ++ hash | empty |
//! | commitment_nullifier | nullifier | hash |
//! | commitment_on_chain | block_be ++ hash | empty |
//! | commitment_nullified | block_be ++ hash | empty |
//! | transactions | hash | record |
//! | blocks, trees | block_be | record |

use shroud_types::{CommitmentHash, EthAddress, TokenId, ZkpPublicKey};

use crate::LmdbError;

pub fn block_key(block_number: u64) -> [u8; 8] {
    block_number.to_be_bytes()
}

pub fn parse_block_key(key: &[u8]) -> Result<u64, LmdbError> {
    let arr: [u8; 8] = key
        .get(..8)
        .and_then(|k| k.try_into().ok())
        .ok_or_else(|| LmdbError::Corruption(format!("block key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(arr))
}

pub fn owner_prefix(owner: &ZkpPublicKey, erc_address: &EthAddress, token_id: &TokenId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32 + 20 + 32 + 32);
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(erc_address.as_bytes());
    key.extend_from_slice(token_id.as_bytes());
    key
}

pub fn owner_key(
    owner: &ZkpPublicKey,
    erc_address: &EthAddress,
    token_id: &TokenId,
    hash: &CommitmentHash,
) -> Vec<u8> {
    let mut key = owner_prefix(owner, erc_address, token_id);
    key.extend_from_slice(hash.as_bytes());
    key
}

pub fn block_hash_key(block_number: u64, hash: &CommitmentHash) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..8].copy_from_slice(&block_key(block_number));
    key[8..].copy_from_slice(hash.as_bytes());
    key
}

/// The commitment hash stored in the last 32 bytes of an index key.
pub fn trailing_hash(key: &[u8]) -> Result<CommitmentHash, LmdbError> {
    let start = key
        .len()
        .checked_sub(32)
        .ok_or_else(|| LmdbError::Corruption(format!("index key of {} bytes", key.len())))?;
    CommitmentHash::from_slice(&key[start..]).map_err(|e| LmdbError::Corruption(e.to_string()))
}

/// Smallest key greater than every key starting with `prefix`, or `None`
/// when the prefix is all `0xff`.
pub fn increment_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_keys_sort_numerically() {
        assert!(block_key(2) < block_key(10));
        assert!(block_key(255) < block_key(256));
        assert_eq!(parse_block_key(&block_key(77)).unwrap(), 77);
    }

    #[test]
    fn increment_prefix_carries() {
        assert_eq!(increment_prefix(&[1, 2]), Some(vec![1, 3]));
        assert_eq!(increment_prefix(&[1, 0xff]), Some(vec![2]));
        assert_eq!(increment_prefix(&[0xff, 0xff]), None);
    }

    #[test]
    fn trailing_hash_reads_suffix() {
        let hash = CommitmentHash::new([9; 32]);
        assert_eq!(trailing_hash(&block_hash_key(4, &hash)).unwrap(), hash);
        assert!(trailing_hash(&[1, 2, 3]).is_err());
    }
}
