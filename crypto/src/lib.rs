//! Cryptographic primitives for the shroud wallet.
//!
//! - **Blake2b** for commitment hashes, nullifiers and key derivation
//! - **X25519** for the key agreement half of note encryption
//! - **ChaCha20-Poly1305** for the data half of note encryption

pub mod commitment;
pub mod encryption;
pub mod error;
pub mod hash;
pub mod keys;

pub use commitment::{commitment_hash, new_commitment_record, nullifier_hash};
pub use encryption::{decrypt, decrypt_note, encrypt_note, encrypt_note_with, NoteSecrets};
pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{random_salt, ZkpKeys};
