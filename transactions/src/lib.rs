//! XEL transactions and their validation.
//!
//! Transaction types:
//! - **OrdinaryPayment**: move NQT from sender to recipient
//! - **SupernodeAnnouncement**: lock a deposit and publish supernode uris, or
//!   (from a guard node) forfeit another supernode's deposit
//! - **AccountInfo**: set the sender's name and description
//! - **EffectiveBalanceLeasing**: lend forging power to another account
//! - **ProofOfWork**: submit a solution to an external work package
//!
//! Everything here is stateless or reads chain state through
//! [`ValidationContext`]; balance effects live in the ledger.

pub mod attachment;
pub mod duplicates;
pub mod error;
pub mod fee;
pub mod transaction;
pub mod types;
pub mod validation;

pub use attachment::{
    AccountInfo, Attachment, EffectiveBalanceLeasing, ProofOfWork, SupernodeAnnouncement,
};
pub use duplicates::{is_block_duplicate, is_unconfirmed_duplicate, DuplicateKey, DuplicateTracker};
pub use error::TransactionError;
pub use fee::{minimum_fee, Fee};
pub use transaction::{Transaction, TransactionBuilder, BASE_SIZE, TRANSACTION_VERSION};
pub use types::TransactionType;
pub use validation::{validate, AccountView, NoWork, ValidationContext, WorkRegistry};
