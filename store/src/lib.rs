//! Abstract storage traits for the XEL node.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! Blocks and transactions are durable and stored as canonical bytes plus
//! the chain metadata that is not part of the signed encoding. Account and
//! audit state is *derived*: it is rebuilt from the blocks and kept in
//! [`DerivedTable`]s that follow the chain head through rollback and trim.

pub mod block;
pub mod derived;
pub mod error;
pub mod meta;
pub mod transaction;

pub use block::{BlockStore, StoredBlock};
pub use derived::DerivedTable;
pub use error::StoreError;
pub use meta::{MetaStore, ScanSchedule};
pub use transaction::{StoredTransaction, TransactionStore};

/// Everything the consensus engine needs from durable storage.
pub trait ChainStore: BlockStore + TransactionStore + MetaStore + Send + Sync {}

impl<T: BlockStore + TransactionStore + MetaStore + Send + Sync> ChainStore for T {}
