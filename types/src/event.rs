//! Causes and holdings of balance changes, as recorded in the audit log.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an account balance changed. Codes are persisted and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LedgerEvent {
    BlockGenerated,
    OrdinaryPayment,
    AccountInfo,
    SupernodeAnnouncement,
    EffectiveBalanceLeasing,
    TransactionFee,
    WorkPow,
    SupernodeDeposit,
    SupernodeForfeit,
}

impl LedgerEvent {
    pub fn code(&self) -> u16 {
        match self {
            Self::BlockGenerated => 1,
            Self::OrdinaryPayment => 3,
            Self::AccountInfo => 4,
            Self::SupernodeAnnouncement => 10,
            Self::EffectiveBalanceLeasing => 32,
            Self::TransactionFee => 50,
            Self::WorkPow => 105,
            Self::SupernodeDeposit => 108,
            Self::SupernodeForfeit => 109,
        }
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Which balance of an account an entry refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LedgerHolding {
    UnconfirmedBalance,
    Balance,
}

impl LedgerHolding {
    pub fn code(&self) -> u8 {
        match self {
            Self::UnconfirmedBalance => 1,
            Self::Balance => 2,
        }
    }

    pub fn is_unconfirmed(&self) -> bool {
        matches!(self, Self::UnconfirmedBalance)
    }
}
