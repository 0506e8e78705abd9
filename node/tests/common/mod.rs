//! Shared fixtures: an engine on in-memory storage with a controllable
//! clock, plus helpers to forge blocks and sign payments.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use xel_crypto::{account_id, keypair_from_secret_phrase};
use xel_ledger::{Block, GenesisAllocation, GenesisConfig};
use xel_node::{ChainEvent, ConsensusEngine, EngineConfig, EngineContext, EventBus, PeerSet};
use xel_nullables::{NullBlockStore, NullClock};
use xel_transactions::{Attachment, NoWork, Transaction, TransactionBuilder};
use xel_types::{AccountId, Amount, ChainParams, Timestamp};

pub const ALICE: &str = "alice integration phrase";
pub const BOB: &str = "bob integration phrase";
pub const CAROL: &str = "carol integration phrase";
pub const FORGER: &str = "forger integration phrase";
pub const RIVAL: &str = "rival forger integration phrase";

/// Block `n` is stamped `BASE + n * SPACING`.
pub const BASE: u32 = 1_000_000;
pub const SPACING: u32 = 60;
/// Far enough ahead that every test chain fits before it.
pub const NOW: u32 = BASE + 1000 * SPACING;

pub fn xel(n: i64) -> Amount {
    Amount::from_xel(n)
}

pub fn id_of(phrase: &str) -> AccountId {
    account_id(&keypair_from_secret_phrase(phrase).public)
}

pub fn block_time(height: u32) -> Timestamp {
    Timestamp::new(BASE + height * SPACING)
}

pub fn engine_config() -> EngineConfig {
    EngineConfig {
        allow_fake_forging: true,
        genesis: GenesisConfig {
            creator_secret_phrase: "integration genesis creator".to_string(),
            allocations: vec![
                GenesisAllocation {
                    recipient: id_of(ALICE),
                    amount: xel(100),
                },
                GenesisAllocation {
                    recipient: id_of(BOB),
                    amount: xel(100),
                },
            ],
        },
        ..EngineConfig::default()
    }
}

pub struct Harness {
    pub engine: Arc<ConsensusEngine>,
    pub store: Arc<NullBlockStore>,
    pub clock: Arc<NullClock>,
    pub peers: Arc<PeerSet>,
    pub events: Arc<EventBus>,
}

pub fn harness() -> Harness {
    harness_with(engine_config())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    harness_on(config, Arc::new(NullBlockStore::new()))
}

/// Open an engine on an existing store, as a restart would.
pub fn harness_on(config: EngineConfig, store: Arc<NullBlockStore>) -> Harness {
    let clock = Arc::new(NullClock::new(NOW));
    let peers = Arc::new(PeerSet::new());
    let events = Arc::new(EventBus::new());
    let engine = ConsensusEngine::open(
        ChainParams::testnet(),
        config,
        EngineContext {
            store: store.clone(),
            peers: peers.clone(),
            clock: clock.clone(),
            work: Arc::new(NoWork),
            events: events.clone(),
        },
    )
    .expect("engine opens");
    Harness {
        engine: Arc::new(engine),
        store,
        clock,
        peers,
        events,
    }
}

impl Harness {
    /// Forge the next block with whatever the pool holds.
    pub fn forge(&self, phrase: &str) -> Block {
        let height = self.engine.height() + 1;
        self.engine
            .generate_block(phrase, block_time(height))
            .expect("block generated")
    }

    /// Forge the next block `offset` seconds after its regular slot.
    pub fn forge_late(&self, phrase: &str, offset: u32) -> Block {
        let height = self.engine.height() + 1;
        self.engine
            .generate_block(phrase, block_time(height).plus(offset))
            .expect("block generated")
    }

    pub fn extend(&self, blocks: u32) {
        for _ in 0..blocks {
            self.forge(FORGER);
        }
    }

    /// (confirmed, unconfirmed) balance of the account behind `phrase`.
    pub fn balances(&self, phrase: &str) -> (Amount, Amount) {
        let id = id_of(phrase);
        self.engine.with_state(|state| {
            state
                .accounts
                .get(id)
                .map(|a| (a.balance, a.unconfirmed_balance))
                .unwrap_or((Amount::ZERO, Amount::ZERO))
        })
    }

    pub fn pool_contains(&self, tx: &Transaction) -> bool {
        self.engine.with_state(|state| state.mempool.contains(tx.id()))
    }

    pub fn pool_len(&self) -> usize {
        self.engine.with_state(|state| state.mempool.len())
    }

    /// A payment stamped just before the next block's slot.
    pub fn pay(&self, from: &str, to: &str, amount: i64, fee: i64) -> Transaction {
        let ts = block_time(self.engine.height() + 1).minus(1);
        payment(from, to, amount, fee, ts)
    }

    /// Record the names of the events the bus fires.
    pub fn record_events(&self) -> Arc<Mutex<Vec<&'static str>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        self.events.subscribe(move |event: &ChainEvent<'_>| {
            sink.lock().unwrap().push(event_name(event));
        });
        seen
    }
}

pub fn payment(from: &str, to: &str, amount: i64, fee: i64, ts: Timestamp) -> Transaction {
    let keys = keypair_from_secret_phrase(from);
    TransactionBuilder::new(keys.public, ts, Attachment::OrdinaryPayment)
        .recipient(id_of(to))
        .amount(xel(amount))
        .fee(xel(fee))
        .sign(&keys.private)
}

pub fn event_name(event: &ChainEvent<'_>) -> &'static str {
    match event {
        ChainEvent::BeforeBlockAccept(_) => "before_accept",
        ChainEvent::BeforeBlockApply(_) => "before_apply",
        ChainEvent::AfterBlockApply { .. } => "after_apply",
        ChainEvent::AfterBlockAccept(_) => "after_accept",
        ChainEvent::BlockPushed(_) => "pushed",
        ChainEvent::BlockPopped(_) => "popped",
        ChainEvent::BlockScanned(_) => "scanned",
        ChainEvent::BlockGenerated(_) => "generated",
        ChainEvent::BlockRejected { .. } => "rejected",
        ChainEvent::ForkResolved { .. } => "fork_resolved",
        ChainEvent::RescanBegin { .. } => "rescan_begin",
        ChainEvent::RescanEnd { .. } => "rescan_end",
        ChainEvent::AddedUnconfirmed(_) => "added_unconfirmed",
        ChainEvent::RemovedUnconfirmed(_) => "removed_unconfirmed",
        ChainEvent::ExpiredUnconfirmed(_) => "expired_unconfirmed",
        ChainEvent::AddedConfirmed(_) => "added_confirmed",
        ChainEvent::TransactionRejected { .. } => "transaction_rejected",
    }
}
