use thiserror::Error;
use xel_ledger::LedgerError;
use xel_store::StoreError;
use xel_types::TransactionId;

/// Why a block was not pushed.
#[derive(Debug, Error)]
pub enum BlockFault {
    /// Does not follow the current head, or is from the future. May succeed
    /// later.
    #[error("block out of order: {0}")]
    OutOfOrder(String),

    #[error("block not accepted: {0}")]
    NotAccepted(String),

    #[error("transaction {id} not accepted: {reason}")]
    TransactionNotAccepted { id: TransactionId, reason: String },

    /// The account state broke while applying the block.
    #[error("consensus invariant violated: {0}")]
    Invariant(#[from] LedgerError),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl BlockFault {
    pub fn not_accepted(reason: impl Into<String>) -> Self {
        Self::NotAccepted(reason.into())
    }

    pub fn out_of_order(reason: impl Into<String>) -> Self {
        Self::OutOfOrder(reason.into())
    }

    pub fn transaction(id: TransactionId, reason: impl Into<String>) -> Self {
        Self::TransactionNotAccepted {
            id,
            reason: reason.into(),
        }
    }

    /// Only invariant and storage faults mean the node itself is broken;
    /// everything else is a bad block.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_) | Self::Storage(_))
    }
}

/// Failure talking to one peer.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer {0} is unreachable")]
    Unreachable(String),

    #[error("peer {peer} timed out after {millis} ms")]
    Timeout { peer: String, millis: u64 },

    #[error("malformed response from {peer}: {reason}")]
    Malformed { peer: String, reason: String },
}

impl PeerError {
    pub fn malformed(peer: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            peer: peer.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Block(#[from] BlockFault),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("peer error: {0}")]
    Peer(#[from] PeerError),

    #[error("config error: {0}")]
    Config(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
