//! Per-account audit trail of balance changes.
//!
//! Entries are staged while a block is applied and coalesced on
//! `(account, event, event id, holding)`: a fee and a payment from the same
//! transaction stay separate, two credits from the same block to the same
//! generator become one. `commit_pending` moves the staged entries into the
//! log once the block is accepted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;
use xel_store::{DerivedTable, StoreError};
use xel_types::{AccountId, Amount, BlockId, LedgerEvent, LedgerHolding, Timestamp};

/// Which accounts are audited and how.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// `"*"` for every account, otherwise account ids as decimal strings.
    #[serde(default)]
    pub accounts: Vec<String>,
    /// 0: confirmed changes only, 1: both, 2: unconfirmed changes only.
    #[serde(default = "default_log_unconfirmed")]
    pub log_unconfirmed: u8,
    /// Blocks of history kept when trimming.
    #[serde(default = "default_trim_keep")]
    pub trim_keep: u32,
}

fn default_log_unconfirmed() -> u8 {
    1
}

fn default_trim_keep() -> u32 {
    30_000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            log_unconfirmed: default_log_unconfirmed(),
            trim_keep: default_trim_keep(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub account: AccountId,
    pub event: LedgerEvent,
    pub event_id: u64,
    pub holding: LedgerHolding,
    pub change: Amount,
    /// Holding balance after the change.
    pub balance: Amount,
    pub block_id: BlockId,
    pub height: u32,
    pub timestamp: Timestamp,
}

impl LedgerEntry {
    fn same_event(&self, other: &LedgerEntry) -> bool {
        self.account == other.account
            && self.event == other.event
            && self.event_id == other.event_id
            && self.holding == other.holding
    }
}

/// The block currently being applied; entries are only produced inside one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockContext {
    pub block_id: BlockId,
    pub height: u32,
    pub timestamp: Timestamp,
}

enum Watch {
    Nobody,
    Everyone,
    Accounts(BTreeSet<AccountId>),
}

struct Mark {
    len: usize,
    saved: Option<Vec<LedgerEntry>>,
}

pub struct LedgerAuditLog {
    watch: Watch,
    log_unconfirmed: u8,
    trim_keep: u32,
    context: Option<BlockContext>,
    pending: Vec<LedgerEntry>,
    entries: Vec<LedgerEntry>,
    mark: Option<Mark>,
}

impl LedgerAuditLog {
    pub fn new(config: &LedgerConfig) -> Self {
        let watch = if config.accounts.iter().any(|a| a == "*") {
            Watch::Everyone
        } else {
            let ids: BTreeSet<AccountId> = config
                .accounts
                .iter()
                .filter_map(|raw| match raw.parse() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        warn!(account = %raw, "ignoring unparsable ledger account");
                        None
                    }
                })
                .collect();
            if ids.is_empty() {
                Watch::Nobody
            } else {
                Watch::Accounts(ids)
            }
        };
        let log_unconfirmed = if config.log_unconfirmed <= 2 {
            config.log_unconfirmed
        } else {
            1
        };
        Self {
            watch,
            log_unconfirmed,
            trim_keep: config.trim_keep,
            context: None,
            pending: Vec::new(),
            entries: Vec::new(),
            mark: None,
        }
    }

    pub fn disabled() -> Self {
        Self::new(&LedgerConfig::default())
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.watch, Watch::Nobody)
    }

    pub fn set_block_context(&mut self, context: Option<BlockContext>) {
        self.context = context;
    }

    pub fn must_log(&self, account: AccountId, holding: LedgerHolding) -> bool {
        let watched = match &self.watch {
            Watch::Nobody => false,
            Watch::Everyone => true,
            Watch::Accounts(ids) => ids.contains(&account),
        };
        if !watched || self.context.is_none() {
            return false;
        }
        match (holding.is_unconfirmed(), self.log_unconfirmed) {
            (true, 0) => false,
            (false, 2) => false,
            _ => true,
        }
    }

    /// Stage one change; merges with an earlier staged entry for the same
    /// event and fixes up the running balances recorded after it.
    pub fn log(
        &mut self,
        account: AccountId,
        event: LedgerEvent,
        event_id: u64,
        holding: LedgerHolding,
        change: Amount,
        balance: Amount,
    ) {
        if change.is_zero() || !self.must_log(account, holding) {
            return;
        }
        let Some(context) = self.context else {
            return;
        };
        let mut entry = LedgerEntry {
            account,
            event,
            event_id,
            holding,
            change,
            balance,
            block_id: context.block_id,
            height: context.height,
            timestamp: context.timestamp,
        };
        if let Some(index) = self.pending.iter().position(|e| e.same_event(&entry)) {
            let existing = self.pending.remove(index);
            entry.change += existing.change;
            let mut adjusted = existing.balance - existing.change;
            for later in self.pending[index..]
                .iter_mut()
                .filter(|e| e.account == account && e.holding == holding)
            {
                adjusted += later.change;
                later.balance = adjusted;
            }
        }
        self.pending.push(entry);
    }

    pub fn pending(&self) -> &[LedgerEntry] {
        &self.pending
    }

    pub fn commit_pending(&mut self) {
        self.entries.append(&mut self.pending);
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn entries_for(&self, account: AccountId) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(move |e| e.account == account)
    }

    fn save_for_abort(&mut self) {
        if let Some(mark) = self.mark.as_mut() {
            if mark.saved.is_none() {
                mark.saved = Some(self.entries.clone());
            }
        }
    }
}

impl DerivedTable for LedgerAuditLog {
    fn name(&self) -> &'static str {
        "account_ledger"
    }

    fn begin(&mut self) {
        self.mark = Some(Mark {
            len: self.entries.len(),
            saved: None,
        });
    }

    fn commit(&mut self) {
        self.mark = None;
    }

    fn abort(&mut self) {
        self.pending.clear();
        self.context = None;
        if let Some(mark) = self.mark.take() {
            match mark.saved {
                Some(saved) => self.entries = saved,
                None => self.entries.truncate(mark.len),
            }
        }
    }

    fn rollback(&mut self, height: u32) -> Result<(), StoreError> {
        if self.entries.iter().any(|e| e.height > height) {
            self.save_for_abort();
            self.entries.retain(|e| e.height <= height);
        }
        self.pending.clear();
        Ok(())
    }

    fn truncate(&mut self) -> Result<(), StoreError> {
        self.save_for_abort();
        self.entries.clear();
        self.pending.clear();
        Ok(())
    }

    fn trim(&mut self, height: u32) -> Result<(), StoreError> {
        let horizon = height.saturating_sub(self.trim_keep);
        if self.entries.iter().any(|e| e.height < horizon) {
            self.save_for_abort();
            self.entries.retain(|e| e.height >= horizon);
        }
        Ok(())
    }
}
