use thiserror::Error;
use xel_store::StoreError;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB: {0}")]
    Heed(#[from] heed::Error),

    #[error("data directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),

    /// A key whose length does not fit its database.
    #[error("malformed key in {db}: {len} bytes")]
    Key { db: &'static str, len: usize },
}

impl From<LmdbError> for StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::Bincode(e) => StoreError::Codec(e.to_string()),
            LmdbError::Key { .. } => StoreError::Corruption(e.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
