//! LMDB storage backend for the XEL node.
//!
//! Implements the storage traits from `xel-store` using the `heed` LMDB
//! bindings. All chain tables live in named databases within a single
//! environment so that a block and its transactions commit in one write
//! transaction.

pub mod block;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod meta;
pub mod transaction;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;

/// Big-endian keys keep LMDB's byte order equal to numeric order.
pub(crate) fn height_key(height: u32) -> [u8; 4] {
    height.to_be_bytes()
}

pub(crate) fn id_key(raw: u64) -> [u8; 8] {
    raw.to_be_bytes()
}

/// Block id stored as a `block_heights` value.
pub(crate) fn read_id_key(bytes: &[u8]) -> Result<u64, LmdbError> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| LmdbError::Key {
        db: "block_heights",
        len: bytes.len(),
    })?;
    Ok(u64::from_be_bytes(arr))
}
