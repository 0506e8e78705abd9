use thiserror::Error;
use xel_ledger::LedgerError;
use xel_store::StoreError;
use xel_transactions::TransactionError;

/// Why a transaction was not admitted to the pool.
#[derive(Debug, Error)]
pub enum AdmissionFault {
    #[error("transaction already processed")]
    AlreadyProcessed,

    #[error("duplicate unconfirmed transaction")]
    Duplicate,

    #[error("insufficient unconfirmed balance")]
    InsufficientBalance,

    #[error("transaction not currently valid: {0}")]
    NotCurrentlyValid(String),

    #[error("transaction not valid: {0}")]
    NotValid(String),

    /// Reserving the balance broke a ledger invariant. Never recoverable.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The chain could not be read to check the transaction.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl AdmissionFault {
    /// The transaction may become admissible later and is worth keeping in
    /// the waiting queue.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotCurrentlyValid(_) | Self::Duplicate | Self::InsufficientBalance
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Ledger(_) | Self::Storage(_))
    }
}

impl From<TransactionError> for AdmissionFault {
    fn from(e: TransactionError) -> Self {
        match e {
            TransactionError::NotValid(reason) => Self::NotValid(reason),
            TransactionError::NotCurrentlyValid(reason) => Self::NotCurrentlyValid(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xel_types::AccountId;

    #[test]
    fn classification() {
        assert!(AdmissionFault::InsufficientBalance.is_transient());
        assert!(AdmissionFault::NotCurrentlyValid("anchor".into()).is_transient());
        assert!(!AdmissionFault::AlreadyProcessed.is_transient());
        assert!(!AdmissionFault::NotValid("sig".into()).is_transient());
        let fatal = AdmissionFault::from(LedgerError::PublicKeyMismatch(AccountId::new(1)));
        assert!(fatal.is_fatal() && !fatal.is_transient());
        let unreadable = AdmissionFault::from(StoreError::Backend("disk".into()));
        assert!(unreadable.is_fatal() && !unreadable.is_transient());
    }

    #[test]
    fn transaction_errors_keep_their_kind() {
        let e = AdmissionFault::from(TransactionError::not_currently_valid("later"));
        assert!(matches!(e, AdmissionFault::NotCurrentlyValid(ref r) if r == "later"));
        let e = AdmissionFault::from(TransactionError::not_valid("never"));
        assert!(matches!(e, AdmissionFault::NotValid(_)));
    }
}
