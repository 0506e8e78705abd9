//! Ledger snapshots: the account state at one height in a comparable form.
//!
//! Two nodes (or one node before and after a reorganisation) hold the same
//! state at a height exactly when their snapshot hashes match.

use serde::{Deserialize, Serialize};
use xel_crypto::sha256;
use xel_types::{AccountId, Amount, Hash256, PublicKey};

use crate::accounts::AccountStore;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// sha256 over the account entries and the height.
    pub hash: Hash256,
    pub height: u32,
    pub accounts: Vec<AccountSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub balance: Amount,
    pub unconfirmed_balance: Amount,
    pub forged_balance: Amount,
    pub active_lessee: Option<AccountId>,
    pub supernode_deposit_blocked: bool,
    pub public_key: Option<PublicKey>,
}

impl LedgerSnapshot {
    pub fn create(mut accounts: Vec<AccountSnapshot>, height: u32) -> Self {
        accounts.sort_by_key(|a| a.id);
        let mut snapshot = Self {
            hash: Hash256::ZERO,
            height,
            accounts,
        };
        snapshot.hash = snapshot.compute_hash();
        snapshot
    }

    fn compute_hash(&self) -> Hash256 {
        let mut buffer = Vec::with_capacity(self.accounts.len() * 96 + 4);
        for account in &self.accounts {
            buffer.extend_from_slice(&account.id.raw().to_le_bytes());
            buffer.extend_from_slice(&account.balance.nqt().to_le_bytes());
            buffer.extend_from_slice(&account.unconfirmed_balance.nqt().to_le_bytes());
            buffer.extend_from_slice(&account.forged_balance.nqt().to_le_bytes());
            buffer.extend_from_slice(&account.active_lessee.map_or(0, |id| id.raw()).to_le_bytes());
            buffer.push(u8::from(account.supernode_deposit_blocked));
            buffer.extend_from_slice(account.public_key.as_ref().map_or(&[0u8; 32], |k| k.as_bytes()));
        }
        buffer.extend_from_slice(&self.height.to_le_bytes());
        sha256(&buffer)
    }

    pub fn verify(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn account(&self, id: AccountId) -> Option<&AccountSnapshot> {
        self.accounts
            .binary_search_by_key(&id, |a| a.id)
            .ok()
            .map(|i| &self.accounts[i])
    }
}

impl AccountStore {
    /// Account rows as they stood at `height`.
    pub fn snapshot_at(&self, height: u32) -> LedgerSnapshot {
        let accounts = self
            .accounts_at(height)
            .map(|account| AccountSnapshot {
                id: account.id,
                balance: account.balance,
                unconfirmed_balance: account.unconfirmed_balance,
                forged_balance: account.forged_balance,
                active_lessee: account.active_lessee,
                supernode_deposit_blocked: account.supernode_deposit_blocked,
                public_key: self.public_key_at(account.id, height),
            })
            .collect();
        LedgerSnapshot::create(accounts, height)
    }
}
