//! The pool itself: pending entries, the waiting queue and block assembly.
//!
//! Both the pending set and the waiting queue keep entries in a hash map by
//! id and a `BTreeSet` of [`PoolKey`]s, so iteration is always in selection
//! priority order.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, trace};
use xel_ledger::{AccountStore, LedgerError};
use xel_transactions::{
    is_block_duplicate, is_unconfirmed_duplicate, validate, DuplicateTracker, Transaction,
    ValidationContext, TRANSACTION_VERSION,
};
use xel_types::{Timestamp, TransactionId};

use crate::chain::{has_all_referenced_transactions, ChainReader, LedgerContext, PoolAccess};
use crate::error::AdmissionFault;
use crate::unconfirmed::{PoolKey, UnconfirmedTransaction};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MempoolConfig {
    /// Bound on the waiting queue; the lowest-priority entry is dropped
    /// first.
    pub max_unconfirmed_transactions: usize,
    pub enable_transaction_rebroadcasting: bool,
    /// A waiting transaction older than this is dropped instead of retried.
    pub max_waiting_secs: u32,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_unconfirmed_transactions: 2000,
            enable_transaction_rebroadcasting: true,
            max_waiting_secs: 3600,
        }
    }
}

/// Notifications collected while the pool changes, drained by the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolEvent {
    AddedUnconfirmed(Vec<Transaction>),
    RemovedUnconfirmed(Vec<Transaction>),
}

/// Outcome of a batch of transactions received from a peer.
#[derive(Clone, Debug, Default)]
pub struct PeerBatch {
    pub added: Vec<Transaction>,
    /// Newly admitted transactions that did not originate here.
    pub to_forward: Vec<Transaction>,
    /// Permanently invalid transactions; the sender deserves a blacklist.
    pub invalid: Vec<(TransactionId, String)>,
}

impl PeerBatch {
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
struct Entries {
    by_id: HashMap<TransactionId, UnconfirmedTransaction>,
    by_priority: BTreeSet<PoolKey>,
}

impl Entries {
    fn insert(&mut self, entry: UnconfirmedTransaction) {
        self.remove(entry.id());
        self.by_priority.insert(entry.key());
        self.by_id.insert(entry.id(), entry);
    }

    fn remove(&mut self, id: TransactionId) -> Option<UnconfirmedTransaction> {
        let entry = self.by_id.remove(&id)?;
        self.by_priority.remove(&entry.key());
        Some(entry)
    }

    fn get(&self, id: TransactionId) -> Option<&UnconfirmedTransaction> {
        self.by_id.get(&id)
    }

    fn contains(&self, id: TransactionId) -> bool {
        self.by_id.contains_key(&id)
    }

    fn len(&self) -> usize {
        self.by_id.len()
    }

    fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &UnconfirmedTransaction> {
        self.by_priority.iter().filter_map(|key| self.by_id.get(&key.id))
    }

    fn pop_last(&mut self) -> Option<UnconfirmedTransaction> {
        let key = self.by_priority.pop_last()?;
        self.by_id.remove(&key.id)
    }

    /// Empty the set, returning the entries in priority order.
    fn drain(&mut self) -> Vec<UnconfirmedTransaction> {
        let order = std::mem::take(&mut self.by_priority);
        let mut entries = std::mem::take(&mut self.by_id);
        order.into_iter().filter_map(|key| entries.remove(&key.id)).collect()
    }
}

/// Pool state saved before a block push so a failed push leaves the pool as
/// it found it.
#[derive(Clone, Debug)]
pub struct PoolCheckpoint {
    pending: Entries,
    waiting: Entries,
    duplicates: DuplicateTracker,
    broadcasted: BTreeMap<TransactionId, Transaction>,
    events: usize,
}

#[derive(Debug)]
pub struct Mempool {
    config: MempoolConfig,
    pending: Entries,
    waiting: Entries,
    duplicates: DuplicateTracker,
    /// Locally submitted transactions, rebroadcast until confirmed.
    broadcasted: BTreeMap<TransactionId, Transaction>,
    events: Vec<PoolEvent>,
}

impl Mempool {
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            config,
            pending: Entries::default(),
            waiting: Entries::default(),
            duplicates: DuplicateTracker::new(),
            broadcasted: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    /// Number of admitted transactions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn get(&self, id: TransactionId) -> Option<&UnconfirmedTransaction> {
        self.pending.get(id)
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.pending.contains(id)
    }

    pub fn is_waiting(&self, id: TransactionId) -> bool {
        self.waiting.contains(id)
    }

    /// Admitted entries in selection order.
    pub fn unconfirmed(&self) -> impl Iterator<Item = &UnconfirmedTransaction> {
        self.pending.iter()
    }

    pub fn waiting(&self) -> impl Iterator<Item = &UnconfirmedTransaction> {
        self.waiting.iter()
    }

    pub fn pending_ids(&self) -> BTreeSet<TransactionId> {
        self.pending.by_id.keys().copied().collect()
    }

    pub fn take_events(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }

    /// Admit a locally created transaction and remember it for rebroadcast.
    pub fn submit(
        &mut self,
        tx: Transaction,
        access: &mut PoolAccess<'_>,
        now: Timestamp,
    ) -> Result<(), AdmissionFault> {
        let id = tx.id();
        if self.pending.contains(id) {
            if self.config.enable_transaction_rebroadcasting {
                self.broadcasted.insert(id, tx);
            }
            return Err(AdmissionFault::AlreadyProcessed);
        }
        let entry = UnconfirmedTransaction::new(tx, now, access.chain.height());
        let tx = self.process(entry, access, now)?;
        debug!(tx = %id, sender = %tx.sender_id(), fee = %tx.fee(), "transaction admitted");
        if self.config.enable_transaction_rebroadcasting {
            self.broadcasted.insert(id, tx.clone());
        }
        self.events.push(PoolEvent::AddedUnconfirmed(vec![tx]));
        Ok(())
    }

    /// Admit transactions received from a peer. Transactions that are not
    /// valid yet are ignored; permanently invalid ones are reported.
    pub fn process_peer_transactions(
        &mut self,
        transactions: Vec<Transaction>,
        access: &mut PoolAccess<'_>,
        now: Timestamp,
    ) -> Result<PeerBatch, LedgerError> {
        let mut batch = PeerBatch::default();
        let height = access.chain.height();
        for tx in transactions {
            let id = tx.id();
            let ours = self.broadcasted.remove(&id).is_some();
            if self.pending.contains(id) || access.chain.has_transaction(id) {
                continue;
            }
            match self.process(UnconfirmedTransaction::new(tx, now, height), access, now) {
                Ok(tx) => {
                    if ours {
                        debug!(tx = %id, "received back a transaction we broadcast");
                    } else {
                        batch.to_forward.push(tx.clone());
                    }
                    batch.added.push(tx);
                }
                Err(AdmissionFault::Ledger(e)) => return Err(e),
                Err(fault) if fault.is_transient() => {
                    trace!(tx = %id, %fault, "peer transaction not admitted yet");
                }
                Err(AdmissionFault::AlreadyProcessed) => {}
                Err(fault) => {
                    debug!(tx = %id, %fault, "invalid transaction from peer");
                    batch.invalid.push((id, fault.to_string()));
                }
            }
        }
        if !batch.added.is_empty() {
            self.events.push(PoolEvent::AddedUnconfirmed(batch.added.clone()));
        }
        Ok(batch)
    }

    /// Queue transactions from popped or rejected blocks for re-admission.
    pub fn process_later(
        &mut self,
        transactions: impl IntoIterator<Item = Transaction>,
        height: u32,
        now: Timestamp,
    ) {
        for tx in transactions {
            let arrival = now.min(tx.timestamp());
            self.enqueue_waiting(UnconfirmedTransaction::new(tx, arrival, height));
        }
    }

    /// Retry every waiting transaction. Returns the ones admitted.
    pub fn process_waiting(
        &mut self,
        access: &mut PoolAccess<'_>,
        now: Timestamp,
    ) -> Result<Vec<Transaction>, LedgerError> {
        if self.waiting.is_empty() {
            return Ok(Vec::new());
        }
        let max_wait = i64::from(self.config.max_waiting_secs);
        let mut added = Vec::new();
        let mut queue = self.waiting.drain().into_iter();
        while let Some(entry) = queue.next() {
            let stale = entry.tx.expiration() < now || now.diff(entry.arrival) > max_wait;
            let retry = entry.clone();
            match self.process(entry, access, now) {
                Ok(tx) => added.push(tx),
                Err(AdmissionFault::Ledger(e)) => {
                    self.waiting.insert(retry);
                    queue.by_ref().for_each(|rest| self.waiting.insert(rest));
                    return Err(e);
                }
                Err(fault) if fault.is_transient() && !stale => {
                    trace!(tx = %retry.id(), %fault, "transaction keeps waiting");
                    self.waiting.insert(retry);
                }
                Err(fault) => {
                    trace!(tx = %retry.id(), %fault, "waiting transaction dropped");
                }
            }
        }
        if !added.is_empty() {
            debug!(count = added.len(), "waiting transactions admitted");
            self.events.push(PoolEvent::AddedUnconfirmed(added.clone()));
        }
        Ok(added)
    }

    /// Release every reservation and move all pending entries to the
    /// waiting queue, to be re-admitted against the state after the next
    /// block change.
    pub fn requeue_all(&mut self, accounts: &mut AccountStore) -> Result<(), LedgerError> {
        let entries = self.pending.drain();
        let mut removed = Vec::with_capacity(entries.len());
        for entry in entries {
            accounts.undo_unconfirmed(&entry.tx)?;
            removed.push(entry.tx.clone());
            self.enqueue_waiting(entry);
        }
        self.duplicates.clear();
        if !removed.is_empty() {
            trace!(count = removed.len(), "unconfirmed transactions requeued");
            self.events.push(PoolEvent::RemovedUnconfirmed(removed));
        }
        Ok(())
    }

    /// Drop a pending transaction and credit its reservation back.
    pub fn remove(
        &mut self,
        id: TransactionId,
        accounts: &mut AccountStore,
    ) -> Result<Option<Transaction>, LedgerError> {
        let Some(entry) = self.pending.remove(id) else {
            return Ok(None);
        };
        accounts.undo_unconfirmed(&entry.tx)?;
        self.events
            .push(PoolEvent::RemovedUnconfirmed(vec![entry.tx.clone()]));
        Ok(Some(entry.tx))
    }

    /// Remove pending transactions whose expiration has passed.
    pub fn sweep_expired(
        &mut self,
        accounts: &mut AccountStore,
        now: Timestamp,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let expired: Vec<TransactionId> = self
            .pending
            .iter()
            .filter(|e| e.tx.expiration() < now)
            .map(UnconfirmedTransaction::id)
            .collect();
        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(entry) = self.pending.remove(id) {
                accounts.undo_unconfirmed(&entry.tx)?;
                removed.push(entry.tx);
            }
        }
        if !removed.is_empty() {
            debug!(count = removed.len(), "expired transactions removed");
            self.events.push(PoolEvent::RemovedUnconfirmed(removed.clone()));
        }
        Ok(removed)
    }

    /// Candidates for a block at `block_timestamp`, in inclusion order.
    ///
    /// Entries are taken in priority order, in passes until a pass adds
    /// nothing. Each candidate is re-validated against `ctx` and must fit
    /// the remaining payload; the result never holds more than `max_count`
    /// transactions or more than `max_payload` bytes.
    pub fn select_for_block(
        &self,
        ctx: &LedgerContext<'_>,
        block_timestamp: Timestamp,
        max_payload: usize,
        max_count: usize,
    ) -> Vec<Transaction> {
        let params = ctx.params();
        let candidates: Vec<&UnconfirmedTransaction> = self
            .pending
            .iter()
            .filter(|e| {
                has_all_referenced_transactions(&e.tx, u32::MAX, block_timestamp, ctx.chain, params)
            })
            .collect();

        let mut selected: Vec<Transaction> = Vec::new();
        let mut chosen = HashSet::new();
        let mut tracker = DuplicateTracker::new();
        let mut payload = 0usize;
        loop {
            let before = selected.len();
            for entry in &candidates {
                if selected.len() >= max_count {
                    break;
                }
                let tx = &entry.tx;
                if chosen.contains(&tx.id()) || payload + tx.size() > max_payload {
                    continue;
                }
                if tx.version() != TRANSACTION_VERSION
                    || tx.timestamp() > block_timestamp.plus(params.max_timedrift_secs)
                    || tx.expiration() < block_timestamp
                {
                    continue;
                }
                if let Err(e) = validate(tx, ctx) {
                    trace!(tx = %tx.id(), error = %e, "candidate skipped");
                    continue;
                }
                if is_block_duplicate(tx, &mut tracker, params.max_pows_per_block) {
                    continue;
                }
                payload += tx.size();
                chosen.insert(tx.id());
                selected.push(tx.clone());
            }
            if selected.len() == before {
                break;
            }
        }
        selected
    }

    /// Locally submitted transactions still unconfirmed; confirmed ones are
    /// forgotten.
    pub fn rebroadcast_candidates(&mut self, chain: &dyn ChainReader) -> Vec<Transaction> {
        self.broadcasted.retain(|id, _| !chain.has_transaction(*id));
        self.broadcasted.values().cloned().collect()
    }

    pub fn checkpoint(&self) -> PoolCheckpoint {
        PoolCheckpoint {
            pending: self.pending.clone(),
            waiting: self.waiting.clone(),
            duplicates: self.duplicates.clone(),
            broadcasted: self.broadcasted.clone(),
            events: self.events.len(),
        }
    }

    pub fn restore(&mut self, checkpoint: PoolCheckpoint) {
        self.pending = checkpoint.pending;
        self.waiting = checkpoint.waiting;
        self.duplicates = checkpoint.duplicates;
        self.broadcasted = checkpoint.broadcasted;
        self.events.truncate(checkpoint.events);
    }

    /// Admission proper: on success the sender's balance is reserved and
    /// the entry is pending.
    fn process(
        &mut self,
        entry: UnconfirmedTransaction,
        access: &mut PoolAccess<'_>,
        now: Timestamp,
    ) -> Result<Transaction, AdmissionFault> {
        let params = access.accounts.params();
        let (max_timedrift, max_pows) = (params.max_timedrift_secs, params.max_pows_per_block);
        let tx = &entry.tx;
        if tx.timestamp() > now.plus(max_timedrift) || tx.expiration() < now {
            return Err(AdmissionFault::NotCurrentlyValid(format!(
                "timestamp {} or expiration {} out of range at {now}",
                tx.timestamp(),
                tx.expiration()
            )));
        }
        if tx.version() < 1 {
            return Err(AdmissionFault::NotValid("invalid transaction version".into()));
        }
        if tx.id().is_zero() {
            return Err(AdmissionFault::NotValid("invalid transaction id 0".into()));
        }
        if self.pending.contains(tx.id()) || access.chain.has_transaction(tx.id()) {
            return Err(AdmissionFault::AlreadyProcessed);
        }
        validate(tx, &access.context())?;

        let sender = tx.sender_id();
        if !(tx.verify_signature() && access.accounts.set_or_verify(sender, tx.sender_public_key())) {
            return Err(if access.accounts.get(sender).is_some() {
                AdmissionFault::NotValid("transaction signature verification failed".into())
            } else {
                AdmissionFault::NotCurrentlyValid("unknown transaction sender".into())
            });
        }
        if !access.accounts.apply_unconfirmed(tx)? {
            return Err(AdmissionFault::InsufficientBalance);
        }
        let work = access.work;
        if is_unconfirmed_duplicate(
            tx,
            &mut self.duplicates,
            |work_id| work.remaining_submissions(work_id),
            max_pows,
        ) {
            access.accounts.undo_unconfirmed(tx)?;
            return Err(AdmissionFault::Duplicate);
        }

        let tx = entry.tx.clone();
        self.pending.insert(entry);
        Ok(tx)
    }

    fn enqueue_waiting(&mut self, entry: UnconfirmedTransaction) {
        if self.waiting.contains(entry.id()) {
            return;
        }
        self.waiting.insert(entry);
        if self.waiting.len() > self.config.max_unconfirmed_transactions {
            if let Some(dropped) = self.waiting.pop_last() {
                trace!(tx = %dropped.id(), "waiting queue full, dropping lowest priority");
            }
        }
    }
}
