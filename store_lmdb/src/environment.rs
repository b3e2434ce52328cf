//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use shroud_store::MetaStore;

use crate::LmdbError;

pub const SCHEMA_VERSION: u32 = 1;
const MAX_DBS: u32 = 16;

/// The LMDB environment and every database handle the wallet uses.
#[derive(Clone)]
pub struct LmdbEnvironment {
    pub(crate) env: Env,
    pub(crate) commitments_db: Database<Bytes, Bytes>,
    pub(crate) owner_index_db: Database<Bytes, Bytes>,
    pub(crate) nullifier_index_db: Database<Bytes, Bytes>,
    pub(crate) on_chain_index_db: Database<Bytes, Bytes>,
    pub(crate) nullified_index_db: Database<Bytes, Bytes>,
    pub(crate) transactions_db: Database<Bytes, Bytes>,
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    pub(crate) trees_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an environment in `path` with a map of `map_size` bytes.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per path by this process and
        // the files are not modified by anything else while it is open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let commitments_db = env.create_database(&mut wtxn, Some("commitments"))?;
        let owner_index_db = env.create_database(&mut wtxn, Some("commitment_owner"))?;
        let nullifier_index_db = env.create_database(&mut wtxn, Some("commitment_nullifier"))?;
        let on_chain_index_db = env.create_database(&mut wtxn, Some("commitment_on_chain"))?;
        let nullified_index_db = env.create_database(&mut wtxn, Some("commitment_nullified"))?;
        let transactions_db = env.create_database(&mut wtxn, Some("transactions"))?;
        let blocks_db = env.create_database(&mut wtxn, Some("blocks"))?;
        let trees_db = env.create_database(&mut wtxn, Some("trees"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let store = Self {
            env,
            commitments_db,
            owner_index_db,
            nullifier_index_db,
            on_chain_index_db,
            nullified_index_db,
            transactions_db,
            blocks_db,
            trees_db,
            meta_db,
        };

        let version = store
            .get_schema_version()
            .map_err(|e| LmdbError::Heed(e.to_string()))?;
        if version == 0 {
            store
                .set_schema_version(SCHEMA_VERSION)
                .map_err(|e| LmdbError::Heed(e.to_string()))?;
            tracing::info!(path = %path.display(), version = SCHEMA_VERSION, "initialized wallet database");
        } else if version != SCHEMA_VERSION {
            return Err(LmdbError::Corruption(format!(
                "database schema {version}, expected {SCHEMA_VERSION}"
            )));
        }
        Ok(store)
    }

    /// Number of stored commitments.
    pub fn commitment_count(&self) -> Result<u64, LmdbError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.commitments_db.len(&rtxn)?)
    }
}
