//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tracing::info;

use crate::LmdbError;

/// Default map size: 64 GiB of address space, grown lazily by the OS.
pub const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024 * 1024;

/// Names of every database in the environment.
pub const DATABASES: &[&str] = &["blocks", "block_heights", "transactions", "tx_full_hash", "meta"];

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    pub(crate) env: Arc<Env>,
    /// block id → bincode `StoredBlock`
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    /// height (BE) → block id
    pub(crate) block_heights_db: Database<Bytes, Bytes>,
    /// transaction id → bincode `StoredTransaction`
    pub(crate) transactions_db: Database<Bytes, Bytes>,
    /// full hash → transaction id
    pub(crate) tx_full_hash_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the node opens each environment once per process and never
        // mutates the memory map outside of heed.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(DATABASES.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let blocks_db = env.create_database(&mut wtxn, Some("blocks"))?;
        let block_heights_db = env.create_database(&mut wtxn, Some("block_heights"))?;
        let transactions_db = env.create_database(&mut wtxn, Some("transactions"))?;
        let tx_full_hash_db = env.create_database(&mut wtxn, Some("tx_full_hash"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        info!(path = %path.display(), "opened LMDB environment");
        Ok(Self {
            env: Arc::new(env),
            blocks_db,
            block_heights_db,
            transactions_db,
            tx_full_hash_db,
            meta_db,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }
}
