use thiserror::Error;
use xel_types::{AccountId, Amount};

/// Failures of the account state. Every variant except `UnknownAccount`
/// means the derived state can no longer be trusted for the current unit.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(
        "double spending: account {account} would have balance {balance} and unconfirmed balance {unconfirmed}"
    )]
    DoubleSpending {
        account: AccountId,
        balance: Amount,
        unconfirmed: Amount,
    },

    #[error("public key mismatch for account {0}")]
    PublicKeyMismatch(AccountId),

    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    #[error("storage error: {0}")]
    Storage(#[from] xel_store::StoreError),
}
