use thiserror::Error;
use xel_types::CodecError;

/// Rejection of a single transaction.
///
/// The split matters to the mempool: a `NotCurrentlyValid` transaction may
/// become valid later (unknown sender, work not yet announced, anchored on a
/// block we have not seen) and is kept for retry, a `NotValid` one never will.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("not valid: {0}")]
    NotValid(String),

    #[error("not currently valid: {0}")]
    NotCurrentlyValid(String),
}

impl TransactionError {
    pub fn not_valid(reason: impl Into<String>) -> Self {
        Self::NotValid(reason.into())
    }

    pub fn not_currently_valid(reason: impl Into<String>) -> Self {
        Self::NotCurrentlyValid(reason.into())
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::NotValid(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::NotValid(r) | Self::NotCurrentlyValid(r) => r,
        }
    }
}

impl From<CodecError> for TransactionError {
    fn from(e: CodecError) -> Self {
        Self::NotValid(format!("malformed transaction bytes: {e}"))
    }
}
