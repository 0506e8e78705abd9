//! The account state: balances, public keys, leases, supernode deposits and
//! account info, all versioned by block height.
//!
//! The store writes at the height set by `set_height`. The engine moves it to
//! the height of the block being applied before applying it, and back to the
//! head height for mempool bookkeeping.

use std::cmp::max;
use std::fmt;

use tracing::{debug, error, warn};
use xel_store::{DerivedTable, StoreError};
use xel_types::{
    AccountId, Amount, ChainParams, EffectiveBalanceRule, LedgerEvent, LedgerHolding, PublicKey,
};

use crate::account::{Account, AccountInfo, AccountLease, LeaseTerm, SupernodeDeposit};
use crate::audit::{LedgerAuditLog, LedgerConfig};
use crate::error::LedgerError;
use crate::versioned::VersionedTable;

pub struct AccountStore {
    params: ChainParams,
    genesis_creator: AccountId,
    height: u32,
    accounts: VersionedTable<AccountId, Account>,
    public_keys: VersionedTable<AccountId, PublicKey>,
    /// Positive confirmed-balance changes, keyed by the height they happened at.
    guaranteed: VersionedTable<(AccountId, u32), Amount>,
    leases: VersionedTable<AccountId, AccountLease>,
    deposits: VersionedTable<AccountId, SupernodeDeposit>,
    info: VersionedTable<AccountId, AccountInfo>,
    audit: LedgerAuditLog,
}

impl fmt::Debug for AccountStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountStore")
            .field("height", &self.height)
            .field("accounts", &self.accounts.len())
            .finish_non_exhaustive()
    }
}

impl AccountStore {
    pub fn new(params: ChainParams, genesis_creator: AccountId, ledger: &LedgerConfig) -> Self {
        Self {
            params,
            genesis_creator,
            height: 0,
            accounts: VersionedTable::new("account"),
            public_keys: VersionedTable::new("public_key"),
            guaranteed: VersionedTable::new("account_guaranteed_balance"),
            leases: VersionedTable::new("account_lease"),
            deposits: VersionedTable::new("account_supernode_deposit"),
            info: VersionedTable::new("account_info"),
            audit: LedgerAuditLog::new(ledger),
        }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn genesis_creator(&self) -> AccountId {
        self.genesis_creator
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_height(&mut self, height: u32) {
        self.height = height;
        self.accounts.set_height(height);
        self.public_keys.set_height(height);
        self.guaranteed.set_height(height);
        self.leases.set_height(height);
        self.deposits.set_height(height);
        self.info.set_height(height);
    }

    pub fn audit(&self) -> &LedgerAuditLog {
        &self.audit
    }

    pub fn audit_mut(&mut self) -> &mut LedgerAuditLog {
        &mut self.audit
    }

    // ── Lookups ──────────────────────────────────────────────────────────

    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn get_at(&self, id: AccountId, height: u32) -> Option<&Account> {
        self.accounts.get_at(&id, height)
    }

    /// The stored row, or a fresh empty one. Nothing is written until the
    /// account is changed.
    pub fn get_or_create(&self, id: AccountId) -> Account {
        self.get(id).cloned().unwrap_or_else(|| Account::new(id))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter().map(|(_, account)| account)
    }

    pub fn accounts_at(&self, height: u32) -> impl Iterator<Item = &Account> {
        self.accounts.iter_at(height).map(|(_, account)| account)
    }

    pub fn public_key(&self, id: AccountId) -> Option<PublicKey> {
        self.public_keys.get(&id).copied()
    }

    pub fn public_key_at(&self, id: AccountId, height: u32) -> Option<PublicKey> {
        self.public_keys.get_at(&id, height).copied()
    }

    pub fn lease(&self, lessor: AccountId) -> Option<&AccountLease> {
        self.leases.get(&lessor)
    }

    pub fn supernode_deposit(&self, id: AccountId) -> Option<&SupernodeDeposit> {
        self.deposits.get(&id)
    }

    pub fn account_info(&self, id: AccountId) -> Option<&AccountInfo> {
        self.info.get(&id)
    }

    /// Accounts that must exist even with empty balances.
    pub fn is_system_account(&self, id: AccountId) -> bool {
        self.params.is_guard_node(id)
            || id == self.params.deposits_account
            || id == self.params.forfeited_deposits_account
    }

    // ── Public keys ──────────────────────────────────────────────────────

    /// True when `key` is the key bound to `id` or no key is bound yet.
    /// Binding itself happens in [`AccountStore::apply_public_key`].
    pub fn set_or_verify(&self, id: AccountId, key: &PublicKey) -> bool {
        match self.public_keys.get(&id) {
            Some(bound) => bound == key,
            None => true,
        }
    }

    pub fn apply_public_key(&mut self, id: AccountId, key: &PublicKey) -> Result<(), LedgerError> {
        match self.public_keys.get(&id) {
            Some(bound) if bound == key => Ok(()),
            Some(_) => {
                error!(account = %id, "public key mismatch");
                Err(LedgerError::PublicKeyMismatch(id))
            }
            None => {
                self.public_keys.insert(id, *key);
                Ok(())
            }
        }
    }

    // ── Balance changes ──────────────────────────────────────────────────

    /// Change both holdings of `id` in one step. The balance invariant is
    /// checked before anything is written.
    pub fn apply_delta(
        &mut self,
        id: AccountId,
        event: LedgerEvent,
        event_id: u64,
        confirmed_delta: Amount,
        unconfirmed_delta: Amount,
    ) -> Result<(), LedgerError> {
        let confirmed = (!confirmed_delta.is_zero()).then_some((confirmed_delta, Amount::ZERO));
        let unconfirmed =
            (!unconfirmed_delta.is_zero()).then_some((unconfirmed_delta, Amount::ZERO));
        self.change(id, event, event_id, confirmed, unconfirmed)
    }

    pub fn add_to_balance(
        &mut self,
        id: AccountId,
        event: LedgerEvent,
        event_id: u64,
        amount: Amount,
        fee: Amount,
    ) -> Result<(), LedgerError> {
        self.change(id, event, event_id, Some((amount, fee)), None)
    }

    pub fn add_to_unconfirmed(
        &mut self,
        id: AccountId,
        event: LedgerEvent,
        event_id: u64,
        amount: Amount,
        fee: Amount,
    ) -> Result<(), LedgerError> {
        self.change(id, event, event_id, None, Some((amount, fee)))
    }

    pub fn add_to_balance_and_unconfirmed(
        &mut self,
        id: AccountId,
        event: LedgerEvent,
        event_id: u64,
        amount: Amount,
        fee: Amount,
    ) -> Result<(), LedgerError> {
        self.change(id, event, event_id, Some((amount, fee)), Some((amount, fee)))
    }

    pub fn add_to_forged(&mut self, id: AccountId, amount: Amount) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        let mut account = self.get_or_create(id);
        account.forged_balance = account
            .forged_balance
            .checked_add(amount)
            .ok_or_else(|| double_spending(&account))?;
        self.save(account);
        Ok(())
    }

    fn change(
        &mut self,
        id: AccountId,
        event: LedgerEvent,
        event_id: u64,
        confirmed: Option<(Amount, Amount)>,
        unconfirmed: Option<(Amount, Amount)>,
    ) -> Result<(), LedgerError> {
        let mut account = self.get_or_create(id);
        if let Some((amount, fee)) = confirmed {
            account.balance = amount
                .checked_add(fee)
                .and_then(|total| account.balance.checked_add(total))
                .ok_or_else(|| double_spending(&account))?;
        }
        if let Some((amount, fee)) = unconfirmed {
            account.unconfirmed_balance = amount
                .checked_add(fee)
                .and_then(|total| account.unconfirmed_balance.checked_add(total))
                .ok_or_else(|| double_spending(&account))?;
        }
        self.check_balance(&account)?;

        if let Some((amount, fee)) = confirmed {
            let total = amount + fee;
            if total > Amount::ZERO {
                let key = (id, self.height);
                let recent = self.guaranteed.get(&key).copied().unwrap_or_default();
                self.guaranteed.insert(key, recent + total);
            }
        }
        let (balance, unconfirmed_balance) = (account.balance, account.unconfirmed_balance);
        self.save(account);

        if let Some((amount, fee)) = unconfirmed {
            self.log_change(id, event, event_id, LedgerHolding::UnconfirmedBalance, amount, fee, unconfirmed_balance);
        }
        if let Some((amount, fee)) = confirmed {
            self.log_change(id, event, event_id, LedgerHolding::Balance, amount, fee, balance);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn log_change(
        &mut self,
        id: AccountId,
        event: LedgerEvent,
        event_id: u64,
        holding: LedgerHolding,
        amount: Amount,
        fee: Amount,
        balance: Amount,
    ) {
        self.audit
            .log(id, LedgerEvent::TransactionFee, event_id, holding, fee, balance - amount);
        self.audit.log(id, event, event_id, holding, amount, balance);
    }

    fn check_balance(&self, account: &Account) -> Result<(), LedgerError> {
        if account.id == self.genesis_creator {
            return Ok(());
        }
        if account.balance.is_negative()
            || account.unconfirmed_balance.is_negative()
            || account.unconfirmed_balance > account.balance
        {
            error!(
                account = %account.id,
                balance = %account.balance,
                unconfirmed = %account.unconfirmed_balance,
                "balance invariant violated"
            );
            return Err(double_spending(account));
        }
        Ok(())
    }

    fn save(&mut self, account: Account) {
        if account.is_empty() && !self.is_system_account(account.id) {
            self.accounts.delete(&account.id);
        } else {
            self.accounts.insert(account.id, account);
        }
    }

    // ── Stake ────────────────────────────────────────────────────────────

    /// Confirmed balance at `height` minus everything credited during the
    /// last `confirmations` blocks, never below zero.
    pub fn guaranteed_balance(&self, id: AccountId, confirmations: u32, height: u32) -> Amount {
        let Some(account) = self.get_at(id, height) else {
            return Amount::ZERO;
        };
        let first = if height >= confirmations {
            height - confirmations + 1
        } else {
            0
        };
        let recent: Amount = self
            .guaranteed
            .range((id, first)..=(id, height))
            .map(|(_, amount)| *amount)
            .sum();
        max(account.balance - recent, Amount::ZERO)
    }

    /// Forging weight in whole XEL. Zero below the minimum forging balance.
    pub fn effective_balance(&self, id: AccountId, height: u32) -> i64 {
        let confirmations = self.params.guaranteed_balance_confirmations;
        let own = match self.get_at(id, height) {
            Some(account) if account.active_lessee.is_none() => {
                match self.params.rules.effective_balance_rule(height) {
                    EffectiveBalanceRule::Pseudo => account.balance,
                    EffectiveBalanceRule::Guaranteed => {
                        self.guaranteed_balance(id, confirmations, height)
                    }
                }
            }
            _ => Amount::ZERO,
        };
        let leased: Amount = self
            .accounts
            .iter_at(height)
            .filter(|(_, lessor)| lessor.active_lessee == Some(id))
            .map(|(lessor, _)| self.guaranteed_balance(*lessor, confirmations, height))
            .sum();
        let total = (own + leased).whole_xel();
        if total < self.params.min_forging_balance.whole_xel() {
            0
        } else {
            total
        }
    }

    // ── Leasing ──────────────────────────────────────────────────────────

    /// Schedule a lease of `lessor`'s guaranteed balance to `lessee`. A
    /// lease already in force is followed by the new one.
    pub fn schedule_lease(&mut self, lessor: AccountId, lessee: AccountId, period: u32) {
        let start = self.height + self.params.leasing_delay;
        let lease = match self.leases.get(&lessor).cloned() {
            None => AccountLease {
                lessor,
                current: LeaseTerm {
                    lessee,
                    from_height: start,
                    to_height: start + period,
                },
                next: None,
            },
            Some(mut lease) => {
                let from_height = max(start, lease.current.to_height);
                lease.next = Some(LeaseTerm {
                    lessee,
                    from_height,
                    to_height: from_height + period,
                });
                lease
            }
        };
        debug!(%lessor, %lessee, period, "lease scheduled");
        self.leases.insert(lessor, lease);
    }

    // ── Supernodes ───────────────────────────────────────────────────────

    /// Announce or extend a supernode. A new or lapsed deposit moves the
    /// deposit amount into the deposits account; guard nodes pay nothing.
    pub fn refresh_supernode_deposit(
        &mut self,
        id: AccountId,
        uris: Vec<String>,
    ) -> Result<(), LedgerError> {
        let account = self.get_or_create(id);
        let amount = self.params.supernode_deposit;
        if !account.is_supernode() && account.unconfirmed_balance < amount {
            return Ok(());
        }
        let height = self.height;
        let binding = self.params.supernode_deposit_binding_period;
        let is_guard = self.params.is_guard_node(id);

        let deposit = match self.deposits.get(&id).cloned() {
            None => {
                if !is_guard {
                    self.lock_deposit(id, amount)?;
                }
                SupernodeDeposit {
                    account: id,
                    from_height: height,
                    to_height: height + binding,
                    uris,
                }
            }
            Some(mut deposit) => {
                if deposit.to_height < height {
                    if !is_guard {
                        self.lock_deposit(id, amount)?;
                    }
                    deposit.from_height = height;
                    deposit.uris = uris;
                }
                deposit.to_height = height + binding;
                deposit
            }
        };
        debug!(account = %id, from = deposit.from_height, to = deposit.to_height, "supernode deposit refreshed");
        self.deposits.insert(id, deposit);
        Ok(())
    }

    fn lock_deposit(&mut self, id: AccountId, amount: Amount) -> Result<(), LedgerError> {
        let event = LedgerEvent::SupernodeDeposit;
        let deposits = self.params.deposits_account;
        self.add_to_balance_and_unconfirmed(id, event, id.raw(), -amount, Amount::ZERO)?;
        self.add_to_balance_and_unconfirmed(deposits, event, id.raw(), amount, Amount::ZERO)
    }

    /// Guard decision: the target's deposit goes to the forfeited-deposits
    /// account. Ignored for unknown accounts, non-supernodes and guards.
    pub fn forfeit_supernode_deposit(&mut self, target: AccountId) -> Result<(), LedgerError> {
        let Some(mut account) = self.get(target).cloned() else {
            return Ok(());
        };
        if !account.is_supernode() || self.params.is_guard_node(target) {
            return Ok(());
        }
        if self.deposits.get(&target).is_none() {
            return Ok(());
        }
        account.supernode_deposit_blocked = false;
        self.save(account);

        let event = LedgerEvent::SupernodeForfeit;
        let amount = self.params.supernode_deposit;
        let deposits = self.params.deposits_account;
        let forfeited = self.params.forfeited_deposits_account;
        self.add_to_balance_and_unconfirmed(deposits, event, target.raw(), -amount, Amount::ZERO)?;
        self.add_to_balance_and_unconfirmed(forfeited, event, target.raw(), amount, Amount::ZERO)?;
        self.deposits.delete(&target);
        warn!(account = %target, "supernode deposit forfeited");
        Ok(())
    }

    // ── Account info ─────────────────────────────────────────────────────

    pub fn set_account_info(&mut self, id: AccountId, name: String, description: String) {
        if name.is_empty() && description.is_empty() {
            self.info.delete(&id);
        } else {
            self.info.insert(id, AccountInfo { name, description });
        }
    }

    // ── Block hooks ──────────────────────────────────────────────────────

    /// Start and end leases and deposit bindings that fall on `height`.
    pub fn after_block_apply(&mut self, height: u32) -> Result<(), LedgerError> {
        let leases: Vec<AccountLease> = self
            .leases
            .iter()
            .map(|(_, lease)| lease)
            .filter(|l| l.current.from_height == height || l.current.to_height == height)
            .cloned()
            .collect();
        for mut lease in leases {
            let mut lessor = self.get_or_create(lease.lessor);
            if height == lease.current.from_height {
                lessor.active_lessee = Some(lease.current.lessee);
                debug!(lessor = %lease.lessor, lessee = %lease.current.lessee, "lease started");
            } else {
                lessor.active_lessee = None;
                debug!(lessor = %lease.lessor, lessee = %lease.current.lessee, "lease ended");
                match lease.next.take() {
                    None => self.leases.delete(&lease.lessor),
                    Some(next) => {
                        lease.current = next;
                        if height == next.from_height {
                            lessor.active_lessee = Some(next.lessee);
                        }
                        self.leases.insert(lease.lessor, lease);
                    }
                }
            }
            self.save(lessor);
        }

        let deposits: Vec<SupernodeDeposit> = self
            .deposits
            .iter()
            .map(|(_, deposit)| deposit)
            .filter(|d| d.from_height == height || d.to_height == height)
            .cloned()
            .collect();
        for deposit in deposits {
            let mut account = self.get_or_create(deposit.account);
            if height == deposit.from_height {
                account.supernode_deposit_blocked = true;
                self.save(account);
                continue;
            }
            account.supernode_deposit_blocked = false;
            self.save(account);
            if self.params.is_guard_node(deposit.account) {
                continue;
            }
            let amount = self.params.supernode_deposit;
            let deposits_account = self.params.deposits_account;
            let held = self.get_or_create(deposits_account).unconfirmed_balance;
            if held < amount {
                warn!(account = %deposit.account, %held, "deposits account cannot return supernode deposit");
                continue;
            }
            let event = LedgerEvent::SupernodeDeposit;
            let owner = deposit.account;
            self.add_to_balance_and_unconfirmed(owner, event, owner.raw(), amount, Amount::ZERO)?;
            self.add_to_balance_and_unconfirmed(deposits_account, event, owner.raw(), -amount, Amount::ZERO)?;
        }
        Ok(())
    }

    /// Materialize the guard nodes and the deposit accounts.
    pub fn ensure_system_accounts(&mut self) -> Result<(), LedgerError> {
        let mut ids = self.params.guard_nodes.clone();
        ids.push(self.params.deposits_account);
        ids.push(self.params.forfeited_deposits_account);
        for id in ids {
            if self.get(id).is_none() {
                self.accounts.insert(id, Account::new(id));
            }
            if self.get(id).is_none() {
                return Err(LedgerError::UnknownAccount(id));
            }
        }
        Ok(())
    }

    /// Forget every version written above `height`.
    pub fn rollback_to(&mut self, height: u32) -> Result<(), LedgerError> {
        DerivedTable::rollback(self, height)?;
        Ok(())
    }

    fn tables(&mut self) -> [&mut dyn DerivedTable; 7] {
        [
            &mut self.accounts,
            &mut self.public_keys,
            &mut self.guaranteed,
            &mut self.leases,
            &mut self.deposits,
            &mut self.info,
            &mut self.audit,
        ]
    }
}

fn double_spending(account: &Account) -> LedgerError {
    LedgerError::DoubleSpending {
        account: account.id,
        balance: account.balance,
        unconfirmed: account.unconfirmed_balance,
    }
}

impl DerivedTable for AccountStore {
    fn name(&self) -> &'static str {
        "accounts"
    }

    fn begin(&mut self) {
        for table in self.tables() {
            table.begin();
        }
    }

    fn commit(&mut self) {
        for table in self.tables() {
            table.commit();
        }
    }

    fn abort(&mut self) {
        for table in self.tables() {
            table.abort();
        }
    }

    fn rollback(&mut self, height: u32) -> Result<(), StoreError> {
        for table in self.tables() {
            table.rollback(height)?;
        }
        Ok(())
    }

    fn truncate(&mut self) -> Result<(), StoreError> {
        for table in self.tables() {
            table.truncate()?;
        }
        Ok(())
    }

    fn trim(&mut self, height: u32) -> Result<(), StoreError> {
        // Credits older than the guaranteed-balance window of the oldest
        // reachable height no longer matter.
        let confirmations = self.params.guaranteed_balance_confirmations;
        if height > confirmations {
            let horizon = height - confirmations;
            self.guaranteed.purge(|(_, h)| *h <= horizon);
        }
        for table in self.tables() {
            table.trim(height)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATOR: AccountId = AccountId::new(1);
    const ALICE: AccountId = AccountId::new(100);
    const BOB: AccountId = AccountId::new(200);
    const EVENT: LedgerEvent = LedgerEvent::OrdinaryPayment;

    fn xel(n: i64) -> Amount {
        Amount::from_xel(n)
    }

    fn store() -> AccountStore {
        AccountStore::new(ChainParams::testnet(), CREATOR, &LedgerConfig::default())
    }

    fn funded(amount: Amount) -> AccountStore {
        let mut s = store();
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 1, amount, Amount::ZERO)
            .unwrap();
        s
    }

    #[test]
    fn unconfirmed_debit_cannot_exceed_balance() {
        let mut s = funded(xel(100));
        s.add_to_unconfirmed(ALICE, EVENT, 2, xel(-60), xel(-1)).unwrap();
        let a = s.get(ALICE).unwrap();
        assert_eq!(a.unconfirmed_balance, xel(39));
        assert_eq!(a.balance, xel(100));

        let err = s.add_to_unconfirmed(ALICE, EVENT, 3, xel(-40), Amount::ZERO);
        assert!(matches!(err, Err(LedgerError::DoubleSpending { .. })));
        // Nothing was written.
        assert_eq!(s.get(ALICE).unwrap().unconfirmed_balance, xel(39));
    }

    #[test]
    fn delta_moves_both_holdings_or_neither() {
        let mut s = funded(xel(50));
        s.apply_delta(ALICE, EVENT, 2, xel(-20), xel(-20)).unwrap();
        let a = s.get(ALICE).unwrap();
        assert_eq!((a.balance, a.unconfirmed_balance), (xel(30), xel(30)));

        // Confirmed would drop below unconfirmed.
        let err = s.apply_delta(ALICE, EVENT, 3, xel(-10), Amount::ZERO);
        assert!(matches!(err, Err(LedgerError::DoubleSpending { .. })));
        let a = s.get(ALICE).unwrap();
        assert_eq!((a.balance, a.unconfirmed_balance), (xel(30), xel(30)));
    }

    #[test]
    fn unconfirmed_above_confirmed_is_rejected() {
        let mut s = funded(xel(10));
        let err = s.add_to_unconfirmed(ALICE, EVENT, 2, xel(1), Amount::ZERO);
        assert!(matches!(err, Err(LedgerError::DoubleSpending { .. })));
    }

    #[test]
    fn genesis_creator_is_exempt() {
        let mut s = store();
        s.add_to_balance_and_unconfirmed(CREATOR, EVENT, 1, xel(-500), Amount::ZERO)
            .unwrap();
        assert_eq!(s.get(CREATOR).unwrap().balance, xel(-500));
    }

    #[test]
    fn empty_accounts_are_pruned_but_system_accounts_stay() {
        let mut s = funded(xel(5));
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 2, xel(-5), Amount::ZERO)
            .unwrap();
        assert!(s.get(ALICE).is_none());

        s.ensure_system_accounts().unwrap();
        let deposits = s.params().deposits_account;
        assert!(s.get(deposits).is_some());
        for guard in s.params().guard_nodes.clone() {
            assert!(s.get(guard).is_some());
        }
    }

    #[test]
    fn public_key_binds_once() {
        let mut s = store();
        let k1 = PublicKey([1; 32]);
        let k2 = PublicKey([2; 32]);
        assert!(s.set_or_verify(ALICE, &k2));
        s.apply_public_key(ALICE, &k1).unwrap();
        s.apply_public_key(ALICE, &k1).unwrap();
        assert!(!s.set_or_verify(ALICE, &k2));
        assert!(matches!(
            s.apply_public_key(ALICE, &k2),
            Err(LedgerError::PublicKeyMismatch(id)) if id == ALICE
        ));
    }

    #[test]
    fn guaranteed_balance_ignores_recent_credits() {
        let mut s = store();
        s.set_height(10);
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 1, xel(100), Amount::ZERO)
            .unwrap();
        s.set_height(20);
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 2, xel(50), Amount::ZERO)
            .unwrap();

        assert_eq!(s.guaranteed_balance(ALICE, 5, 20), xel(100));
        assert_eq!(s.guaranteed_balance(ALICE, 10, 20), xel(100));
        assert_eq!(s.guaranteed_balance(ALICE, 11, 20), Amount::ZERO);
        assert_eq!(s.guaranteed_balance(ALICE, 5, 26), xel(150));
        assert_eq!(s.guaranteed_balance(ALICE, 5, 12), Amount::ZERO);
        assert_eq!(s.guaranteed_balance(ALICE, 5, 15), xel(100));
        assert_eq!(s.guaranteed_balance(ALICE, 5, 9), Amount::ZERO);
    }

    #[test]
    fn effective_balance_follows_rule_table() {
        let mut s = store();
        s.set_height(1);
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 1, xel(2000), Amount::ZERO)
            .unwrap();
        // Pseudo rule: the confirmed balance counts at once.
        assert_eq!(s.effective_balance(ALICE, 1), 2000);

        s.set_height(6000);
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 2, xel(500), Amount::ZERO)
            .unwrap();
        assert_eq!(s.effective_balance(ALICE, 6000), 2000);
        assert_eq!(s.effective_balance(ALICE, 6000 + 1440), 2500);
    }

    #[test]
    fn effective_balance_below_minimum_is_zero() {
        let mut s = funded(xel(999));
        assert_eq!(s.effective_balance(ALICE, 0), 0);
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 2, xel(1), Amount::ZERO)
            .unwrap();
        assert_eq!(s.effective_balance(ALICE, 0), 1000);
    }

    #[test]
    fn lease_moves_stake_to_lessee() {
        let mut s = funded(xel(5000));
        s.set_height(10);
        s.schedule_lease(ALICE, BOB, 1440);
        let lease = s.lease(ALICE).unwrap().clone();
        assert_eq!(lease.current.from_height, 1450);
        assert_eq!(lease.current.to_height, 2890);

        s.set_height(1450);
        s.after_block_apply(1450).unwrap();
        assert_eq!(s.get(ALICE).unwrap().active_lessee, Some(BOB));
        assert_eq!(s.effective_balance(ALICE, 1450), 0);
        assert_eq!(s.effective_balance(BOB, 1450), 5000);

        s.set_height(2890);
        s.after_block_apply(2890).unwrap();
        assert_eq!(s.get(ALICE).unwrap().active_lessee, None);
        assert!(s.lease(ALICE).is_none());
    }

    #[test]
    fn second_lease_queues_behind_current() {
        let mut s = funded(xel(5000));
        s.set_height(10);
        s.schedule_lease(ALICE, BOB, 1440);
        s.set_height(20);
        let carol = AccountId::new(300);
        s.schedule_lease(ALICE, carol, 2000);

        let next = s.lease(ALICE).unwrap().next.unwrap();
        assert_eq!(next.from_height, 2890);
        assert_eq!(next.to_height, 4890);

        s.set_height(1450);
        s.after_block_apply(1450).unwrap();
        s.set_height(2890);
        s.after_block_apply(2890).unwrap();
        assert_eq!(s.get(ALICE).unwrap().active_lessee, Some(carol));
        assert_eq!(s.lease(ALICE).unwrap().current.lessee, carol);
        assert!(s.lease(ALICE).unwrap().next.is_none());
    }

    #[test]
    fn supernode_deposit_lifecycle() {
        let deposit = ChainParams::testnet().supernode_deposit;
        let binding = ChainParams::testnet().supernode_deposit_binding_period;
        let mut s = funded(deposit + xel(10));
        s.ensure_system_accounts().unwrap();
        let deposits = s.params().deposits_account;

        s.set_height(5);
        s.refresh_supernode_deposit(ALICE, vec!["10.0.0.1".into()]).unwrap();
        assert_eq!(s.get(ALICE).unwrap().balance, xel(10));
        assert_eq!(s.get(deposits).unwrap().balance, deposit);
        s.after_block_apply(5).unwrap();
        assert!(s.get(ALICE).unwrap().is_supernode());

        // Refreshing while bound only extends the binding.
        s.set_height(8);
        s.refresh_supernode_deposit(ALICE, vec![]).unwrap();
        let record = s.supernode_deposit(ALICE).unwrap().clone();
        assert_eq!((record.from_height, record.to_height), (5, 8 + binding));
        assert_eq!(record.uris, vec!["10.0.0.1".to_string()]);

        let end = 8 + binding;
        s.set_height(end);
        s.after_block_apply(end).unwrap();
        let alice = s.get(ALICE).unwrap();
        assert!(!alice.is_supernode());
        assert_eq!(alice.balance, deposit + xel(10));
        assert!(s.get(deposits).unwrap().balance.is_zero());
        assert!(s.supernode_deposit(ALICE).is_some());
    }

    #[test]
    fn refresh_without_funds_is_ignored() {
        let mut s = funded(xel(10));
        s.refresh_supernode_deposit(ALICE, vec!["10.0.0.1".into()]).unwrap();
        assert!(s.supernode_deposit(ALICE).is_none());
    }

    #[test]
    fn guard_forfeits_deposit() {
        let deposit = ChainParams::testnet().supernode_deposit;
        let mut s = funded(deposit);
        s.ensure_system_accounts().unwrap();
        s.set_height(3);
        s.refresh_supernode_deposit(ALICE, vec!["10.0.0.1".into()]).unwrap();
        s.after_block_apply(3).unwrap();

        s.set_height(4);
        s.forfeit_supernode_deposit(ALICE).unwrap();
        let forfeited = s.params().forfeited_deposits_account;
        let deposits = s.params().deposits_account;
        assert_eq!(s.get(forfeited).unwrap().balance, deposit);
        assert!(s.get(deposits).unwrap().balance.is_zero());
        assert!(s.supernode_deposit(ALICE).is_none());
        assert!(s.get(ALICE).is_none());
    }

    #[test]
    fn rollback_restores_earlier_height() {
        let mut s = store();
        s.set_height(1);
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 1, xel(10), Amount::ZERO)
            .unwrap();
        s.set_height(2);
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 2, xel(5), Amount::ZERO)
            .unwrap();
        s.set_account_info(ALICE, "alice".into(), String::new());
        s.apply_public_key(ALICE, &PublicKey([7; 32])).unwrap();

        s.rollback_to(1).unwrap();
        assert_eq!(s.get(ALICE).unwrap().balance, xel(10));
        assert!(s.account_info(ALICE).is_none());
        assert!(s.public_key(ALICE).is_none());
    }

    #[test]
    fn abort_discards_unit() {
        let mut s = funded(xel(10));
        s.begin();
        s.set_height(1);
        s.add_to_balance_and_unconfirmed(BOB, EVENT, 2, xel(3), Amount::ZERO)
            .unwrap();
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 2, xel(-3), Amount::ZERO)
            .unwrap();
        s.abort();
        assert!(s.get(BOB).is_none());
        assert_eq!(s.get(ALICE).unwrap().balance, xel(10));
    }

    #[test]
    fn fee_and_amount_are_audited_separately() {
        let config = LedgerConfig {
            accounts: vec!["*".into()],
            ..LedgerConfig::default()
        };
        let mut s = AccountStore::new(ChainParams::testnet(), CREATOR, &config);
        s.add_to_balance_and_unconfirmed(ALICE, EVENT, 1, xel(10), Amount::ZERO)
            .unwrap();
        // Reserved in the pool before the block confirms it.
        s.add_to_unconfirmed(ALICE, EVENT, 7, xel(-4), xel(-1)).unwrap();
        s.audit_mut().set_block_context(Some(crate::audit::BlockContext {
            block_id: xel_types::BlockId::new(1),
            height: 1,
            timestamp: xel_types::Timestamp::new(1),
        }));
        s.add_to_balance(ALICE, EVENT, 7, xel(-4), xel(-1)).unwrap();
        let pending = s.audit().pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].event, LedgerEvent::TransactionFee);
        assert_eq!(pending[0].balance, xel(9));
        assert_eq!(pending[1].change, xel(-4));
        assert_eq!(pending[1].balance, xel(5));
        let alice = s.get(ALICE).unwrap();
        assert_eq!((alice.balance, alice.unconfirmed_balance), (xel(5), xel(5)));
    }

    #[test]
    fn debug_names_height_and_size() {
        let mut s = funded(xel(10));
        s.set_height(3);
        let shown = format!("{s:?}");
        assert!(shown.contains("height: 3"), "{shown}");
        assert!(shown.contains("accounts: 1"), "{shown}");
    }
}
