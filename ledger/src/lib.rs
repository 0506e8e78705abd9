//! Chain state of an XEL node.
//!
//! Blocks carry the transactions; the account state is derived from them.
//! Every derived row is versioned by the height that wrote it, so popping
//! blocks off is a rollback of the versioned tables rather than a replay.

pub mod account;
pub mod accounts;
mod apply;
pub mod audit;
pub mod block;
pub mod error;
pub mod forging;
pub mod genesis;
pub mod snapshot;
pub mod versioned;

pub use account::{Account, AccountInfo, AccountLease, LeaseTerm, SupernodeDeposit};
pub use accounts::AccountStore;
pub use audit::{BlockContext, LedgerAuditLog, LedgerConfig, LedgerEntry};
pub use block::{payload_hash, Block, BLOCK_VERSION, GENESIS_BLOCK_VERSION, HEADER_SIZE};
pub use error::LedgerError;
pub use genesis::{create_genesis_block, genesis_block_id, GenesisAllocation, GenesisConfig};
pub use snapshot::{AccountSnapshot, LedgerSnapshot};
pub use versioned::VersionedTable;
