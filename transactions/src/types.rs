//! Transaction type registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use xel_types::LedgerEvent;

pub const TYPE_PAYMENT: u8 = 0;
pub const TYPE_MESSAGING: u8 = 1;
pub const TYPE_ACCOUNT_CONTROL: u8 = 2;
pub const TYPE_WORK_CONTROL: u8 = 3;

pub const SUBTYPE_PAYMENT_ORDINARY: u8 = 0;
pub const SUBTYPE_MESSAGING_SUPERNODE_ANNOUNCEMENT: u8 = 1;
pub const SUBTYPE_MESSAGING_ACCOUNT_INFO: u8 = 2;
pub const SUBTYPE_ACCOUNT_CONTROL_LEASING: u8 = 0;
pub const SUBTYPE_WORK_CONTROL_PROOF_OF_WORK: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    OrdinaryPayment,
    SupernodeAnnouncement,
    AccountInfo,
    EffectiveBalanceLeasing,
    ProofOfWork,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        Self::OrdinaryPayment,
        Self::SupernodeAnnouncement,
        Self::AccountInfo,
        Self::EffectiveBalanceLeasing,
        Self::ProofOfWork,
    ];

    pub fn from_bytes(type_byte: u8, subtype: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.type_byte() == type_byte && t.subtype() == subtype)
    }

    pub fn type_byte(&self) -> u8 {
        match self {
            Self::OrdinaryPayment => TYPE_PAYMENT,
            Self::SupernodeAnnouncement | Self::AccountInfo => TYPE_MESSAGING,
            Self::EffectiveBalanceLeasing => TYPE_ACCOUNT_CONTROL,
            Self::ProofOfWork => TYPE_WORK_CONTROL,
        }
    }

    pub fn subtype(&self) -> u8 {
        match self {
            Self::OrdinaryPayment => SUBTYPE_PAYMENT_ORDINARY,
            Self::SupernodeAnnouncement => SUBTYPE_MESSAGING_SUPERNODE_ANNOUNCEMENT,
            Self::AccountInfo => SUBTYPE_MESSAGING_ACCOUNT_INFO,
            Self::EffectiveBalanceLeasing => SUBTYPE_ACCOUNT_CONTROL_LEASING,
            Self::ProofOfWork => SUBTYPE_WORK_CONTROL_PROOF_OF_WORK,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OrdinaryPayment => "OrdinaryPayment",
            Self::SupernodeAnnouncement => "SupernodeAnnouncement",
            Self::AccountInfo => "AccountInfo",
            Self::EffectiveBalanceLeasing => "EffectiveBalanceLeasing",
            Self::ProofOfWork => "ProofOfWork",
        }
    }

    pub fn can_have_recipient(&self) -> bool {
        matches!(self, Self::OrdinaryPayment | Self::EffectiveBalanceLeasing)
    }

    pub fn must_have_recipient(&self) -> bool {
        self.can_have_recipient()
    }

    /// Zero-fee types must carry a fee of exactly zero.
    pub fn is_zero_fee(&self) -> bool {
        matches!(self, Self::SupernodeAnnouncement | Self::ProofOfWork)
    }

    pub fn ledger_event(&self) -> LedgerEvent {
        match self {
            Self::OrdinaryPayment => LedgerEvent::OrdinaryPayment,
            Self::SupernodeAnnouncement => LedgerEvent::SupernodeAnnouncement,
            Self::AccountInfo => LedgerEvent::AccountInfo,
            Self::EffectiveBalanceLeasing => LedgerEvent::EffectiveBalanceLeasing,
            Self::ProofOfWork => LedgerEvent::WorkPow,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_bytes_round_trip() {
        for ty in TransactionType::ALL {
            assert_eq!(
                TransactionType::from_bytes(ty.type_byte(), ty.subtype()),
                Some(ty)
            );
        }
    }

    #[test]
    fn unknown_subtype_is_rejected() {
        assert_eq!(TransactionType::from_bytes(TYPE_MESSAGING, 0), None);
        assert_eq!(TransactionType::from_bytes(9, 0), None);
    }

    #[test]
    fn zero_fee_types_take_no_recipient() {
        for ty in TransactionType::ALL.into_iter().filter(|t| t.is_zero_fee()) {
            assert!(!ty.can_have_recipient(), "{ty}");
        }
    }
}
