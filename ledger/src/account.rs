//! Account rows and the records hanging off them.

use serde::{Deserialize, Serialize};
use xel_types::{AccountId, Amount};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Amount,
    pub unconfirmed_balance: Amount,
    pub forged_balance: Amount,
    pub active_lessee: Option<AccountId>,
    /// Set while the account's supernode deposit is locked.
    pub supernode_deposit_blocked: bool,
}

impl Account {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: Amount::ZERO,
            unconfirmed_balance: Amount::ZERO,
            forged_balance: Amount::ZERO,
            active_lessee: None,
            supernode_deposit_blocked: false,
        }
    }

    pub fn is_supernode(&self) -> bool {
        self.supernode_deposit_blocked
    }

    /// True when the row carries nothing worth keeping.
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero()
            && self.unconfirmed_balance.is_zero()
            && self.forged_balance.is_zero()
            && self.active_lessee.is_none()
            && !self.supernode_deposit_blocked
    }
}

/// Leasing state of one lessor: the lease in force (or scheduled) and at
/// most one queued successor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLease {
    pub lessor: AccountId,
    pub current: LeaseTerm,
    pub next: Option<LeaseTerm>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseTerm {
    pub lessee: AccountId,
    pub from_height: u32,
    pub to_height: u32,
}

/// A supernode's locked deposit and the addresses it announced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupernodeDeposit {
    pub account: AccountId,
    pub from_height: u32,
    pub to_height: u32,
    pub uris: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub name: String,
    pub description: String,
}
