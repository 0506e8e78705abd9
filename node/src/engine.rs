//! The consensus engine: the only writer of the chain.
//!
//! Every block change is one unit over the derived tables. The tables are
//! journaled from `begin`, the block is validated and applied in memory,
//! then written to the store. Any failure before `commit` aborts the
//! journal, restores the mempool checkpoint and leaves the head where it
//! was.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};
use xel_crypto::{account_id, keypair_from_secret_phrase, sha256};
use xel_ledger::{
    create_genesis_block, forging, payload_hash, AccountStore, Block, BlockContext, GenesisConfig,
    LedgerConfig, LedgerSnapshot, BLOCK_VERSION,
};
use xel_mempool::{
    has_all_referenced_transactions, AdmissionFault, ChainReader, LedgerContext, Mempool,
    MempoolConfig, PeerBatch, PoolAccess, PoolEvent,
};
use xel_store::{ChainStore, DerivedTable, StoreError, StoredBlock};
use xel_transactions::{
    is_block_duplicate, validate, Attachment, DuplicateTracker, Transaction, WorkRegistry,
    TRANSACTION_VERSION,
};
use xel_types::{Amount, BlockId, ChainParams, Clock, PublicKey, Timestamp};

use crate::chain::{ChainLock, ChainState, StoreChain};
use crate::chain_event::{ChainEvent, EventBus};
use crate::config::NodeConfig;
use crate::error::{BlockFault, NodeError};
use crate::peer::PeerSet;
use crate::tracing_spans;

/// Blocks older than this when pushed are not relayed.
const BROADCAST_MAX_AGE_SECS: u32 = 600;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub allow_fake_forging: bool,
    pub trim_derived_tables: bool,
    pub trim_frequency: u32,
    pub mempool: MempoolConfig,
    pub ledger: LedgerConfig,
    pub genesis: GenesisConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&NodeConfig::default())
    }
}

impl From<&NodeConfig> for EngineConfig {
    fn from(config: &NodeConfig) -> Self {
        Self {
            allow_fake_forging: config.allow_fake_forging,
            trim_derived_tables: config.trim_derived_tables,
            trim_frequency: config.trim_frequency.max(1),
            mempool: config.mempool(),
            ledger: config.ledger.clone(),
            genesis: config.genesis.clone(),
        }
    }
}

/// What the engine is wired to.
pub struct EngineContext {
    pub store: Arc<dyn ChainStore>,
    pub peers: Arc<PeerSet>,
    pub clock: Arc<dyn Clock>,
    pub work: Arc<dyn WorkRegistry>,
    pub events: Arc<EventBus>,
}

pub struct ConsensusEngine {
    pub(crate) params: ChainParams,
    pub(crate) config: EngineConfig,
    pub(crate) genesis: Block,
    pub(crate) store: Arc<dyn ChainStore>,
    pub(crate) chain: ChainLock,
    pub(crate) peers: Arc<PeerSet>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) work: Arc<dyn WorkRegistry>,
    pub(crate) events: Arc<EventBus>,
}

impl ConsensusEngine {
    /// Open the chain in `ctx.store`, creating the genesis block on an empty
    /// store, and rebuild the derived state by scanning the stored blocks.
    /// A rescan interrupted earlier is resumed with its validation setting.
    pub fn open(
        params: ChainParams,
        config: EngineConfig,
        ctx: EngineContext,
    ) -> Result<Self, NodeError> {
        let genesis = create_genesis_block(&config.genesis, &params);
        let creator = account_id(genesis.generator_public_key());
        let state = ChainState {
            last: genesis.clone(),
            accounts: AccountStore::new(params.clone(), creator, &config.ledger),
            mempool: Mempool::new(config.mempool.clone()),
            last_trim_height: 0,
            pending_trim: None,
        };
        let engine = Self {
            params,
            config,
            genesis,
            store: ctx.store,
            chain: ChainLock::new(state),
            peers: ctx.peers,
            clock: ctx.clock,
            work: ctx.work,
            events: ctx.events,
        };
        engine.startup()?;
        Ok(engine)
    }

    fn startup(&self) -> Result<(), NodeError> {
        let _update = self.chain.update();
        let mut state = self.chain.write();
        match self.store.block_at_height(0)? {
            None => {
                info!(genesis = %self.genesis.id(), "empty store, adding genesis block");
                self.add_genesis()?;
                self.scan_locked(&mut state, 0, false)?;
            }
            Some(stored) if stored.id != self.genesis.id() => {
                return Err(NodeError::Config(format!(
                    "stored genesis block {} does not match configured genesis {}",
                    stored.id,
                    self.genesis.id()
                )));
            }
            Some(_) => {
                let validate = self
                    .store
                    .scan_schedule()?
                    .map(|s| s.validate)
                    .unwrap_or(false);
                if validate {
                    info!("resuming scheduled validating rescan");
                }
                self.scan_locked(&mut state, 0, validate)?;
            }
        }
        info!(
            height = state.last.height(),
            block = %state.last.id(),
            "chain loaded"
        );
        Ok(())
    }

    pub(crate) fn add_genesis(&self) -> Result<(), StoreError> {
        let (stored, transactions) = self.genesis.to_stored();
        self.store.put_block(&stored, &transactions)
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn peers(&self) -> &Arc<PeerSet> {
        &self.peers
    }

    pub fn genesis_id(&self) -> BlockId {
        self.genesis.id()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn height(&self) -> u32 {
        self.chain.read().last.height()
    }

    pub fn last_block(&self) -> Block {
        self.chain.read().last.clone()
    }

    pub fn cumulative_difficulty(&self) -> u128 {
        self.chain.read().last.cumulative_difficulty()
    }

    /// Run `f` against the state under the read lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&ChainState) -> R) -> R {
        f(&self.chain.read())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.chain.read();
        state.accounts.snapshot_at(state.last.height())
    }

    pub fn block_id_at_height(&self, height: u32) -> Result<Option<BlockId>, StoreError> {
        if height > self.height() {
            return Ok(None);
        }
        self.store.block_id_at_height(height)
    }

    /// Whether `id` is a block of the current chain.
    pub fn has_block(&self, id: BlockId) -> Result<bool, StoreError> {
        let height = self.height();
        Ok(self.store.get_block(id)?.is_some_and(|b| b.height <= height))
    }

    pub fn block(&self, id: BlockId) -> Result<Option<Block>, BlockFault> {
        match self.store.get_block(id)? {
            Some(stored) => self.load_stored(&stored).map(Some),
            None => Ok(None),
        }
    }

    pub fn block_at_height(&self, height: u32) -> Result<Block, BlockFault> {
        self.load_block_at(height)
    }

    /// Ids of up to `limit` blocks following `after`, for serving peers.
    pub fn next_block_ids(&self, after: BlockId, limit: usize) -> Result<Vec<BlockId>, StoreError> {
        let height = self.height();
        match self.store.get_block(after)? {
            Some(stored) if stored.height <= height => {
                let ids = self.store.block_ids_from_height(stored.height + 1, limit)?;
                Ok(ids.into_iter().take((height - stored.height) as usize).collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    pub fn min_rollback_height(&self) -> u32 {
        self.min_rollback_height_of(&self.chain.read())
    }

    pub(crate) fn min_rollback_height_of(&self, state: &ChainState) -> u32 {
        if !self.config.trim_derived_tables {
            return 0;
        }
        if state.last_trim_height > 0 {
            state.last_trim_height
        } else {
            state.last.height().saturating_sub(self.params.max_rollback)
        }
    }

    pub(crate) fn update_lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.chain.update()
    }

    // ── Block push ───────────────────────────────────────────────────────

    /// Append `block` to the head. Returns the block with its height and
    /// difficulty assigned.
    pub fn push_block(&self, block: Block) -> Result<Block, BlockFault> {
        let mut state = self.chain.write();
        self.push_block_locked(&mut state, block)
    }

    pub(crate) fn push_block_locked(
        &self,
        state: &mut ChainState,
        mut block: Block,
    ) -> Result<Block, BlockFault> {
        let now = self.clock.now();
        let previous = state.last.clone();
        let _span = tracing_spans::push_block_span(block.id(), previous.height() + 1).entered();
        let checkpoint = state.mempool.checkpoint();
        state.accounts.begin();
        if let Err(fault) = self.push_unit(state, &mut block, &previous, now) {
            state.accounts.abort();
            state.accounts.set_height(previous.height());
            state.mempool.restore(checkpoint);
            state.last = previous;
            if fault.is_fatal() {
                error!(block = %block.id(), %fault, "block push failed on a state fault");
            } else {
                debug!(block = %block.id(), %fault, "block rejected");
            }
            self.events.emit(ChainEvent::BlockRejected {
                block: &block,
                fault: &fault,
            });
            return Err(fault);
        }
        state.accounts.commit();
        state.last = block.clone();
        debug!(
            block = %block.id(),
            height = block.height(),
            transactions = block.transactions().len(),
            "block pushed"
        );

        self.events.emit(ChainEvent::AfterBlockAccept(&block));
        if block.timestamp() >= now.minus(BROADCAST_MAX_AGE_SECS) {
            self.peers.broadcast_block(&block);
        }
        self.events.emit(ChainEvent::BlockPushed(&block));
        self.schedule_trim(state, block.height());
        // The block is committed; a waiting queue failure must not undo that.
        if let Err(fault) = self.process_waiting_locked(state, now) {
            error!(height = block.height(), %fault, "waiting transactions not processed after push");
        }
        Ok(block)
    }

    fn push_unit(
        &self,
        state: &mut ChainState,
        block: &mut Block,
        previous: &Block,
        now: Timestamp,
    ) -> Result<(), BlockFault> {
        self.validate(state, block, previous, now)?;
        self.validate_transactions(state, block, previous, now)?;
        let three_back = self.timestamp_at(previous.height().saturating_sub(2))?;
        block.attach(previous, three_back, &self.params);

        self.events.emit(ChainEvent::BeforeBlockAccept(block));
        state.mempool.requeue_all(&mut state.accounts)?;
        state.accounts.set_height(block.height());
        self.accept(state, block)?;
        let (stored, transactions) = block.to_stored();
        self.store.put_block(&stored, &transactions)?;
        Ok(())
    }

    /// Header checks against the parent.
    pub(crate) fn validate(
        &self,
        state: &ChainState,
        block: &Block,
        previous: &Block,
        now: Timestamp,
    ) -> Result<(), BlockFault> {
        if block.previous_block_id() != previous.id() {
            return Err(BlockFault::out_of_order(format!(
                "previous block id {} does not match head {}",
                block.previous_block_id(),
                previous.id()
            )));
        }
        if block.version() != BLOCK_VERSION {
            return Err(BlockFault::not_accepted(format!(
                "invalid block version {}",
                block.version()
            )));
        }
        if block.timestamp() > now.plus(self.params.max_timedrift_secs) {
            return Err(BlockFault::out_of_order(format!(
                "invalid timestamp {}, current time is {now}",
                block.timestamp()
            )));
        }
        if block.timestamp() <= previous.timestamp() {
            return Err(BlockFault::not_accepted(format!(
                "timestamp {} is not after previous block timestamp {}",
                block.timestamp(),
                previous.timestamp()
            )));
        }
        if sha256(&previous.bytes()) != *block.previous_block_hash() {
            return Err(BlockFault::not_accepted("previous block hash does not match"));
        }
        if block.id().is_zero() || self.block_in_chain(block.id(), previous.height())? {
            return Err(BlockFault::not_accepted(format!(
                "duplicate block or invalid id {}",
                block.id()
            )));
        }
        if !self.config.allow_fake_forging {
            let effective = state
                .accounts
                .effective_balance(block.generator_id(), previous.height());
            if !block.verify_generation_signature(previous, effective) {
                return Err(BlockFault::not_accepted(format!(
                    "generation signature verification failed, effective balance {effective}"
                )));
            }
        }
        if !block.verify_block_signature()
            || !state
                .accounts
                .set_or_verify(block.generator_id(), block.generator_public_key())
        {
            return Err(BlockFault::not_accepted("block signature verification failed"));
        }
        if block.transactions().len() > self.params.max_number_of_transactions {
            return Err(BlockFault::not_accepted(format!(
                "too many transactions: {}",
                block.transactions().len()
            )));
        }
        if block.payload_length() as usize > self.params.max_payload_length() {
            return Err(BlockFault::not_accepted(format!(
                "invalid payload length {}",
                block.payload_length()
            )));
        }
        Ok(())
    }

    /// Per-transaction checks, then the block's declared totals.
    pub(crate) fn validate_transactions(
        &self,
        state: &ChainState,
        block: &Block,
        previous: &Block,
        now: Timestamp,
    ) -> Result<(), BlockFault> {
        let chain = StoreChain::new(&*self.store, previous.height());
        let checked = self.check_transactions(state, block, previous, now, &chain);
        // A verdict reached on a failed lookup means nothing.
        chain.check()?;
        checked
    }

    fn check_transactions(
        &self,
        state: &ChainState,
        block: &Block,
        previous: &Block,
        now: Timestamp,
        chain: &StoreChain<'_>,
    ) -> Result<(), BlockFault> {
        let params = &self.params;
        let ctx = LedgerContext {
            accounts: &state.accounts,
            chain,
            work: &*self.work,
        };
        let mut tracker = DuplicateTracker::new();
        let mut pows: HashMap<u64, u32> = HashMap::new();
        let (mut amount, mut fee, mut payload) = (Amount::ZERO, Amount::ZERO, 0usize);

        for tx in block.transactions() {
            let id = tx.id();
            if let Attachment::ProofOfWork(pow) = tx.attachment() {
                let count = pows.entry(pow.work_id).or_default();
                *count += 1;
                if *count > params.max_pows_per_block {
                    return Err(BlockFault::transaction(
                        id,
                        format!("too many proof of work submissions for work {}", pow.work_id),
                    ));
                }
            }
            if tx.timestamp() > now.plus(params.max_timedrift_secs) {
                return Err(BlockFault::out_of_order(format!(
                    "invalid transaction timestamp {}, current time is {now}",
                    tx.timestamp()
                )));
            }
            if !tx.verify_signature()
                || !state
                    .accounts
                    .set_or_verify(tx.sender_id(), tx.sender_public_key())
            {
                return Err(BlockFault::not_accepted(format!(
                    "transaction {id} signature verification failed at height {}",
                    previous.height()
                )));
            }
            if tx.timestamp() > block.timestamp().plus(params.max_timedrift_secs)
                || tx.expiration() < block.timestamp()
            {
                return Err(BlockFault::transaction(
                    id,
                    format!(
                        "invalid transaction timestamp {} for block timestamp {}",
                        tx.timestamp(),
                        block.timestamp()
                    ),
                ));
            }
            if chain.has_transaction(id) {
                return Err(BlockFault::transaction(id, "transaction is already in the blockchain"));
            }
            if !has_all_referenced_transactions(
                tx,
                previous.height() + 1,
                block.timestamp(),
                chain,
                params,
            ) {
                return Err(BlockFault::transaction(id, "missing or invalid referenced transaction"));
            }
            if tx.version() != TRANSACTION_VERSION {
                return Err(BlockFault::transaction(
                    id,
                    format!("invalid transaction version {}", tx.version()),
                ));
            }
            if id.is_zero() {
                return Err(BlockFault::transaction(id, "invalid transaction id 0"));
            }
            validate(tx, &ctx).map_err(|e| BlockFault::transaction(id, e.to_string()))?;
            if is_block_duplicate(tx, &mut tracker, params.max_pows_per_block) {
                return Err(BlockFault::transaction(id, "duplicate transaction in block"));
            }
            amount += tx.amount();
            fee += tx.fee();
            payload += tx.size();
        }

        if amount != block.total_amount() || fee != block.total_fee() {
            return Err(BlockFault::not_accepted(format!(
                "total amount {amount} or fee {fee} do not match block totals {} and {}",
                block.total_amount(),
                block.total_fee()
            )));
        }
        if payload_hash(block.transactions()) != *block.payload_hash() {
            return Err(BlockFault::not_accepted("payload hash does not match"));
        }
        if payload != block.payload_length() as usize {
            return Err(BlockFault::not_accepted(format!(
                "transaction payload length {payload} does not match block payload length {}",
                block.payload_length()
            )));
        }
        Ok(())
    }

    /// Apply `block` to the account state at `block.height()`.
    pub(crate) fn accept(&self, state: &mut ChainState, block: &Block) -> Result<(), BlockFault> {
        let accounts = &mut state.accounts;
        accounts.audit_mut().set_block_context(Some(BlockContext {
            block_id: block.id(),
            height: block.height(),
            timestamp: block.timestamp(),
        }));
        for tx in block.transactions() {
            if !accounts.apply_unconfirmed(tx)? {
                return Err(BlockFault::transaction(tx.id(), "double spending"));
            }
        }
        self.events.emit(ChainEvent::BeforeBlockApply(block));
        accounts.apply_block_reward(block)?;
        for tx in block.transactions() {
            accounts.apply_transaction(tx)?;
        }
        accounts.after_block_apply(block.height())?;
        self.events.emit(ChainEvent::AfterBlockApply {
            block,
            accounts: &*accounts,
        });
        accounts.audit_mut().set_block_context(None);
        accounts.audit_mut().commit_pending();
        if !block.transactions().is_empty() {
            self.events.emit(ChainEvent::AddedConfirmed(block.transactions()));
        }
        Ok(())
    }

    fn block_in_chain(&self, id: BlockId, max_height: u32) -> Result<bool, StoreError> {
        Ok(self.store.get_block(id)?.is_some_and(|b| b.height <= max_height))
    }

    fn timestamp_at(&self, height: u32) -> Result<Timestamp, StoreError> {
        self.store
            .block_at_height(height)?
            .map(|b| b.timestamp)
            .ok_or_else(|| StoreError::Corruption(format!("no block at height {height}")))
    }

    pub(crate) fn load_block_at(&self, height: u32) -> Result<Block, BlockFault> {
        let stored = self
            .store
            .block_at_height(height)?
            .ok_or_else(|| StoreError::Corruption(format!("no block at height {height}")))?;
        self.load_stored(&stored)
    }

    pub(crate) fn load_stored(&self, stored: &StoredBlock) -> Result<Block, BlockFault> {
        let transactions = self.store.block_transactions(stored)?;
        Block::from_stored(stored, &transactions).map_err(|e| {
            BlockFault::not_accepted(format!("stored block {} does not decode: {e}", stored.id))
        })
    }

    // ── Forging ──────────────────────────────────────────────────────────

    /// Forge a block on the current head with the best pending
    /// transactions and push it. A transaction the push refuses is dropped
    /// from the pool so the next attempt can go ahead without it.
    pub fn generate_block(&self, secret_phrase: &str, timestamp: Timestamp) -> Result<Block, BlockFault> {
        let keys = keypair_from_secret_phrase(secret_phrase);
        let generator = account_id(&keys.public);
        let _span = tracing_spans::generate_span(&generator.to_string()).entered();
        let now = self.clock.now();
        let mut guard = self.chain.write();
        let state = &mut *guard;
        self.process_waiting_locked(state, now)?;

        let previous = state.last.clone();
        let timestamp = if timestamp <= previous.timestamp() {
            previous.timestamp().plus(1)
        } else {
            timestamp
        };
        let transactions = {
            let chain = StoreChain::new(&*self.store, previous.height());
            let ctx = LedgerContext {
                accounts: &state.accounts,
                chain: &chain,
                work: &*self.work,
            };
            let selected = state.mempool.select_for_block(
                &ctx,
                timestamp,
                self.params.max_payload_length(),
                self.params.max_number_of_transactions,
            );
            chain.check()?;
            selected
        };
        let block = Block::forge(&previous, timestamp, transactions, &keys);

        match self.push_block_locked(state, block) {
            Ok(block) => {
                info!(
                    block = %block.id(),
                    height = block.height(),
                    %generator,
                    transactions = block.transactions().len(),
                    "generated block"
                );
                self.events.emit(ChainEvent::BlockGenerated(&block));
                Ok(block)
            }
            Err(BlockFault::TransactionNotAccepted { id, reason }) => {
                warn!(tx = %id, %reason, "dropping transaction that broke block generation");
                state.mempool.remove(id, &mut state.accounts)?;
                self.flush_pool_events(&mut state.mempool);
                Err(BlockFault::TransactionNotAccepted { id, reason })
            }
            Err(fault) => Err(fault),
        }
    }

    /// Earliest timestamp at which `public_key` may forge on the current
    /// head, or `None` without effective balance.
    pub fn forging_deadline(&self, public_key: &PublicKey) -> Option<Timestamp> {
        let state = self.chain.read();
        let previous = &state.last;
        let signature = forging::generation_signature(previous.generation_signature(), public_key);
        let effective = state
            .accounts
            .effective_balance(account_id(public_key), previous.height());
        let wait = forging::hit_time(forging::hit(&signature), effective, previous.base_target())?;
        let wait = u32::try_from(wait).ok()?.checked_add(1)?;
        Some(previous.timestamp().plus(wait))
    }

    // ── Mempool entry points ─────────────────────────────────────────────

    /// Admit a locally created transaction and relay it.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<(), AdmissionFault> {
        let now = self.clock.now();
        let mut guard = self.chain.write();
        let state = &mut *guard;
        let id = tx.id();
        let result = self
            .pool_unit(state, |pool, access| pool.submit(tx.clone(), access, now))
            .unwrap_or_else(|e| Err(e.into()));
        match &result {
            Ok(()) => self.peers.broadcast_transactions(std::slice::from_ref(&tx)),
            Err(fault) => {
                debug!(tx = %id, %fault, "transaction refused");
                self.events.emit(ChainEvent::TransactionRejected { id, fault });
            }
        }
        self.flush_pool_events(&mut state.mempool);
        result
    }

    /// Admit transactions relayed by `peer`. A peer that sends permanently
    /// invalid transactions is blacklisted; new ones are forwarded.
    pub fn process_peer_transactions(
        &self,
        peer: Option<&str>,
        transactions: Vec<Transaction>,
    ) -> Result<PeerBatch, NodeError> {
        let now = self.clock.now();
        let mut guard = self.chain.write();
        let state = &mut *guard;
        let batch = self.pool_unit(state, |pool, access| {
            pool.process_peer_transactions(transactions, access, now)
        })??;
        self.flush_pool_events(&mut state.mempool);
        drop(guard);

        if let (Some(peer), Some((id, reason))) = (peer, batch.invalid.first()) {
            self.peers
                .blacklist(peer, format!("invalid transaction {id}: {reason}"));
        }
        self.peers.broadcast_transactions(&batch.to_forward);
        Ok(batch)
    }

    pub fn process_waiting(&self) -> Result<Vec<Transaction>, BlockFault> {
        let now = self.clock.now();
        let mut state = self.chain.write();
        self.process_waiting_locked(&mut state, now)
    }

    pub(crate) fn process_waiting_locked(
        &self,
        state: &mut ChainState,
        now: Timestamp,
    ) -> Result<Vec<Transaction>, BlockFault> {
        let added = self.pool_unit(state, |pool, access| pool.process_waiting(access, now))??;
        self.flush_pool_events(&mut state.mempool);
        Ok(added)
    }

    /// Run a pool operation against the stored chain as one unit. If a chain
    /// lookup failed underneath it, every reservation it made is undone and
    /// the storage failure comes back instead.
    fn pool_unit<R>(
        &self,
        state: &mut ChainState,
        op: impl FnOnce(&mut Mempool, &mut PoolAccess<'_>) -> R,
    ) -> Result<R, StoreError> {
        let chain = StoreChain::new(&*self.store, state.last.height());
        let checkpoint = state.mempool.checkpoint();
        state.accounts.begin();
        let out = {
            let mut access = PoolAccess::new(&mut state.accounts, &chain, &*self.work);
            op(&mut state.mempool, &mut access)
        };
        match chain.check() {
            Ok(()) => {
                state.accounts.commit();
                Ok(out)
            }
            Err(e) => {
                state.accounts.abort();
                state.mempool.restore(checkpoint);
                Err(e)
            }
        }
    }

    /// Drop pending transactions past their expiration.
    pub fn sweep_expired(&self) -> Result<Vec<Transaction>, BlockFault> {
        let now = self.clock.now();
        let mut guard = self.chain.write();
        let state = &mut *guard;
        let expired = state.mempool.sweep_expired(&mut state.accounts, now)?;
        if !expired.is_empty() {
            self.events.emit(ChainEvent::ExpiredUnconfirmed(&expired));
        }
        self.flush_pool_events(&mut state.mempool);
        Ok(expired)
    }

    /// Relay locally submitted transactions that are still unconfirmed.
    pub fn rebroadcast(&self) -> usize {
        let candidates = {
            let mut guard = self.chain.write();
            let state = &mut *guard;
            if !state.mempool.config().enable_transaction_rebroadcasting {
                return 0;
            }
            let chain = StoreChain::new(&*self.store, state.last.height());
            let candidates = state.mempool.rebroadcast_candidates(&chain);
            if let Err(e) = chain.check() {
                warn!(error = %e, "rebroadcast skipped");
                return 0;
            }
            candidates
        };
        if !candidates.is_empty() {
            trace!(count = candidates.len(), "rebroadcasting transactions");
            self.peers.broadcast_transactions(&candidates);
        }
        candidates.len()
    }

    pub(crate) fn flush_pool_events(&self, mempool: &mut Mempool) {
        for event in mempool.take_events() {
            match &event {
                PoolEvent::AddedUnconfirmed(txs) => {
                    self.events.emit(ChainEvent::AddedUnconfirmed(txs))
                }
                PoolEvent::RemovedUnconfirmed(txs) => {
                    self.events.emit(ChainEvent::RemovedUnconfirmed(txs))
                }
            }
        }
    }

    // ── Trimming ─────────────────────────────────────────────────────────

    fn schedule_trim(&self, state: &mut ChainState, height: u32) {
        if self.config.trim_derived_tables
            && height % self.config.trim_frequency == 0
            && height > self.params.max_rollback
        {
            state.pending_trim = Some(height - self.params.max_rollback);
        }
    }

    /// Trim the derived tables if a pushed block made that due. Returns the
    /// height trimmed to.
    pub fn run_pending_trim(&self) -> Result<Option<u32>, StoreError> {
        let mut state = self.chain.write();
        let Some(height) = state.pending_trim.take() else {
            return Ok(None);
        };
        self.trim_locked(&mut state, height)?;
        Ok(Some(height))
    }

    pub(crate) fn trim_locked(&self, state: &mut ChainState, height: u32) -> Result<(), StoreError> {
        state.accounts.trim(height)?;
        state.last_trim_height = height;
        debug!(height, "derived tables trimmed");
        Ok(())
    }
}
