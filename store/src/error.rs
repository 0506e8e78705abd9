//! Failures of the chain stores.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Blocks are stored one per height.
    #[error("height {0} already holds a block")]
    HeightTaken(u32),

    #[error("record codec failure: {0}")]
    Codec(String),

    /// An index points at a record that is missing or does not match.
    #[error("store is inconsistent: {0}")]
    Corruption(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}
