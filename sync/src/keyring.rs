//! The set of local keys the sync engine decrypts with.

use shroud_crypto::ZkpKeys;
use shroud_types::ZkpPublicKey;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared, growable list of wallet keys. Clones share the same list.
#[derive(Clone, Default)]
pub struct KeyRing {
    keys: Arc<RwLock<Vec<ZkpKeys>>>,
}

impl KeyRing {
    pub fn new(keys: Vec<ZkpKeys>) -> Self {
        Self {
            keys: Arc::new(RwLock::new(keys)),
        }
    }

    /// Add `keys` unless a key with the same public key is already present.
    pub fn add(&self, keys: ZkpKeys) -> bool {
        let mut guard = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if guard.iter().any(|k| k.zkp_public_key == keys.zkp_public_key) {
            return false;
        }
        guard.push(keys);
        true
    }

    /// A copy of the current keys, so callers never hold the lock across work.
    pub fn snapshot(&self) -> Vec<ZkpKeys> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn public_keys(&self) -> Vec<ZkpPublicKey> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|k| k.zkp_public_key)
            .collect()
    }

    pub fn owns(&self, owner: &ZkpPublicKey) -> bool {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|k| &k.zkp_public_key == owner)
    }

    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("public_keys", &self.public_keys())
            .finish()
    }
}
