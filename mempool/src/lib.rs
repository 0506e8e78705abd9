//! The unconfirmed transaction pool.
//!
//! Admitted transactions have their amount and fee reserved from the
//! sender's unconfirmed balance, so two pending spends can never together
//! exceed what the sender owns. Transactions that cannot be admitted yet
//! (unknown sender, broken EC anchor, not enough balance after a rollback)
//! wait in a separate queue and are retried after every block.

pub mod chain;
pub mod error;
pub mod pool;
pub mod unconfirmed;

pub use chain::{has_all_referenced_transactions, ChainReader, LedgerContext, PoolAccess};
pub use error::AdmissionFault;
pub use pool::{Mempool, MempoolConfig, PeerBatch, PoolCheckpoint, PoolEvent};
pub use unconfirmed::{PoolKey, UnconfirmedTransaction};
