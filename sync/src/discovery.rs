//! Recognizing commitments addressed to local keys.
//!
//! A note is ours only if it decrypts under one of our keys *and* the
//! decrypted fields hash to the commitment published on-chain. Anything else
//! is noise: other recipients' notes are expected and never reported as errors.

use shroud_crypto::{commitment_hash, decrypt_note, new_commitment_record, ZkpKeys};
use shroud_types::{CommitmentHash, CommitmentRecord, EncryptedNote};
use tracing::trace;

/// Try every key on `note`; return the commitment record on a verified match
/// against the first live output commitment.
pub fn recover_commitment(
    keys: &[ZkpKeys],
    commitments: &[CommitmentHash],
    note: &EncryptedNote,
) -> Option<CommitmentRecord> {
    let expected = commitments.iter().find(|c| !c.is_zero())?;
    for key in keys {
        let secrets = match decrypt_note(&key.zkp_private_key, note) {
            Ok(secrets) => secrets,
            Err(_) => continue,
        };
        let preimage = secrets.into_preimage(key.zkp_public_key);
        if &commitment_hash(&preimage) != expected {
            trace!(commitment = %expected, "decrypted note does not match commitment");
            continue;
        }
        return Some(new_commitment_record(preimage, &key.nullifier_key));
    }
    None
}
