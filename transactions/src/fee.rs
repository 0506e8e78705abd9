//! Minimum fee schedule.

use crate::attachment::Attachment;
use crate::transaction::Transaction;
use crate::types::TransactionType;
use xel_types::{Amount, FeeRule, RuleTable, ONE_XEL};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fee {
    Constant(Amount),
    /// `constant + ((size - 1) / unit_size) * per_unit`, or just `constant`
    /// for an empty payload.
    SizeBased {
        constant: Amount,
        per_unit: Amount,
        unit_size: usize,
    },
}

impl Fee {
    pub const DEFAULT: Fee = Fee::Constant(Amount::from_nqt(ONE_XEL));
    pub const NONE: Fee = Fee::Constant(Amount::ZERO);

    pub fn amount(&self, size: usize) -> Amount {
        match *self {
            Fee::Constant(a) => a,
            Fee::SizeBased {
                constant,
                per_unit,
                unit_size,
            } => {
                if size == 0 {
                    return constant;
                }
                let units = ((size - 1) / unit_size) as i64;
                constant + Amount::from_nqt(per_unit.nqt().saturating_mul(units))
            }
        }
    }
}

/// The fee schedule entry for a transaction type.
pub fn baseline_fee(ty: TransactionType) -> Fee {
    match ty {
        TransactionType::SupernodeAnnouncement | TransactionType::ProofOfWork => Fee::NONE,
        TransactionType::AccountInfo => Fee::SizeBased {
            constant: Amount::from_xel(1),
            per_unit: Amount::from_xel(2),
            unit_size: 32,
        },
        TransactionType::OrdinaryPayment | TransactionType::EffectiveBalanceLeasing => Fee::DEFAULT,
    }
}

/// Size the schedule charges for; only account info is size-priced.
fn fee_size(tx: &Transaction) -> usize {
    match tx.attachment() {
        Attachment::AccountInfo(info) => info.name.chars().count() + info.description.chars().count(),
        _ => 0,
    }
}

/// Minimum fee at `height`, including the surcharge for referencing
/// another transaction.
pub fn minimum_fee(tx: &Transaction, height: u32, rules: &RuleTable) -> Amount {
    let schedule = match rules.fee_rule(height) {
        FeeRule::Exempt => Amount::ZERO,
        FeeRule::Baseline | FeeRule::Next => baseline_fee(tx.transaction_type()).amount(fee_size(tx)),
    };
    if tx.referenced_full_hash().is_some() {
        schedule + Amount::from_nqt(ONE_XEL)
    } else {
        schedule
    }
}
