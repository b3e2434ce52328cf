//! Commitment and nullifier derivation.

use shroud_types::{CommitmentHash, CommitmentRecord, NullifierHash, NullifierKey, Preimage};

use crate::hash::blake2b_256_multi;

const COMMITMENT_DOMAIN: &[u8] = b"shroud-commitment-v1";
const NULLIFIER_DOMAIN: &[u8] = b"shroud-nullifier-v1";

/// Digest of every preimage field. Changing any field changes the hash.
pub fn commitment_hash(preimage: &Preimage) -> CommitmentHash {
    let value = preimage.value.to_be_bytes();
    CommitmentHash::new(blake2b_256_multi(&[
        COMMITMENT_DOMAIN,
        preimage.erc_address.as_bytes(),
        preimage.token_id.as_bytes(),
        &value,
        preimage.owner.as_bytes(),
        preimage.salt.as_bytes(),
    ]))
}

pub fn nullifier_hash(key: &NullifierKey, commitment: &CommitmentHash) -> NullifierHash {
    NullifierHash::new(blake2b_256_multi(&[
        NULLIFIER_DOMAIN,
        &key.0,
        commitment.as_bytes(),
    ]))
}

/// An unconfirmed record for a commitment owned by the holder of `nullifier_key`.
pub fn new_commitment_record(preimage: Preimage, nullifier_key: &NullifierKey) -> CommitmentRecord {
    let hash = commitment_hash(&preimage);
    let nullifier = nullifier_hash(nullifier_key, &hash);
    CommitmentRecord::new(hash, preimage, nullifier)
}
