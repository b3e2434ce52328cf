//! Wallet key material.

use rand::rngs::OsRng;
use rand::RngCore;
use shroud_types::{NullifierKey, Salt, ZkpPrivateKey, ZkpPublicKey};
use std::fmt;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroize;

use crate::hash::blake2b_256_multi;

/// The keys one wallet identity needs to receive, recognize and spend commitments.
#[derive(Clone)]
pub struct ZkpKeys {
    pub zkp_private_key: ZkpPrivateKey,
    pub nullifier_key: NullifierKey,
    pub zkp_public_key: ZkpPublicKey,
}

impl ZkpKeys {
    /// Deterministically derive every key from a 32-byte root key.
    pub fn from_root_key(root_key: &[u8; 32]) -> Self {
        let private = blake2b_256_multi(&[b"shroud-zkp-private-key", root_key]);
        let nullifier = blake2b_256_multi(&[b"shroud-nullifier-key", root_key]);
        let zkp_private_key = ZkpPrivateKey(private);
        let zkp_public_key = public_key_of(&zkp_private_key);
        Self {
            zkp_private_key,
            nullifier_key: NullifierKey(nullifier),
            zkp_public_key,
        }
    }

    /// Fresh keys from the operating system's RNG.
    pub fn generate() -> Self {
        let mut root = [0u8; 32];
        OsRng.fill_bytes(&mut root);
        let keys = Self::from_root_key(&root);
        root.zeroize();
        keys
    }
}

impl fmt::Debug for ZkpKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZkpKeys")
            .field("zkp_public_key", &self.zkp_public_key)
            .finish_non_exhaustive()
    }
}

pub fn public_key_of(private_key: &ZkpPrivateKey) -> ZkpPublicKey {
    let secret = StaticSecret::from(private_key.0);
    ZkpPublicKey::new(X25519Public::from(&secret).to_bytes())
}

pub fn random_salt() -> Salt {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Salt::new(bytes)
}
