//! Metadata storage trait.

use crate::StoreError;

const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Key-value bookkeeping that doesn't belong in any domain collection.
pub trait MetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] when the key is absent.
    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Schema version of the database; 0 for a database that never recorded one.
    fn get_schema_version(&self) -> Result<u32, StoreError> {
        match self.get_meta(SCHEMA_VERSION_KEY) {
            Ok(bytes) => {
                let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Corruption(format!("schema version has {} bytes", bytes.len()))
                })?;
                Ok(u32::from_be_bytes(arr))
            }
            Err(StoreError::NotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put_meta(SCHEMA_VERSION_KEY, &version.to_be_bytes())
    }
}
