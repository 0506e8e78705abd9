//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the node begins
//! processing blocks.

use std::path::Path;

use xel_store::{BlockStore, StoredBlock};

use crate::environment::{LmdbEnvironment, DATABASES};
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub chain_height: Option<u32>,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Count entries in every database and walk the height index checking
/// that each block links to the block one height below it.
pub fn check_integrity(store: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    {
        let rtxn = store.env.read_txn()?;
        for &db_name in DATABASES {
            match store
                .env
                .open_database::<heed::types::Bytes, heed::types::Bytes>(&rtxn, Some(db_name))
            {
                Ok(Some(db)) => {
                    report.databases_checked += 1;
                    match db.len(&rtxn) {
                        Ok(count) => report.total_entries += count,
                        Err(e) => report
                            .errors
                            .push(format!("failed to read database '{db_name}': {e}")),
                    }
                }
                Ok(None) => report.errors.push(format!("database '{db_name}' is missing")),
                Err(e) => report
                    .errors
                    .push(format!("failed to open database '{db_name}': {e}")),
            }
        }
    }

    let mut previous: Option<StoredBlock> = None;
    let mut height = 0u32;
    loop {
        let block = match store.block_at_height(height) {
            Ok(Some(block)) => block,
            Ok(None) => break,
            Err(e) => {
                report.errors.push(format!("failed to read block at height {height}: {e}"));
                break;
            }
        };
        if block.height != height {
            report.errors.push(format!(
                "block {} indexed at height {height} claims height {}",
                block.id, block.height
            ));
        }
        if let Some(prev) = &previous {
            if block.previous_block_id != prev.id {
                report.errors.push(format!(
                    "block {} at height {height} does not link to {}",
                    block.id, prev.id
                ));
            }
            if block.cumulative_difficulty < prev.cumulative_difficulty {
                report
                    .errors
                    .push(format!("cumulative difficulty decreases at height {height}"));
            }
        }
        report.chain_height = Some(height);
        previous = Some(block);
        height += 1;
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// A missing or empty directory is fresh. A directory holding other files
/// but no `data.mdb` points at corruption or the wrong path.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let mut entries = std::fs::read_dir(path)
        .map_err(|e| format!("cannot read LMDB directory {}: {e}", path.display()))?;
    if entries.next().is_none() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
