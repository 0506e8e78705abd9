//! The chain's mutable state and the locks around it.
//!
//! Head block, account state and mempool change together, so they live
//! behind one reader-writer lock. Long sequences that must not interleave
//! with each other (a download, a fork switch) additionally hold the update
//! lock; readers are never blocked by it.

use std::cell::RefCell;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;
use xel_ledger::{AccountStore, Block};
use xel_mempool::{ChainReader, Mempool};
use xel_store::{ChainStore, StoreError};
use xel_transactions::Transaction;
use xel_types::{BlockId, Hash256, TransactionId};

pub struct ChainState {
    pub last: Block,
    pub accounts: AccountStore,
    pub mempool: Mempool,
    /// Height the derived tables were last trimmed to.
    pub last_trim_height: u32,
    /// Set when a pushed block makes a trim due; taken by the trim task.
    pub pending_trim: Option<u32>,
}

pub struct ChainLock {
    state: RwLock<ChainState>,
    update: Mutex<()>,
}

impl ChainLock {
    pub fn new(state: ChainState) -> Self {
        Self {
            state: RwLock::new(state),
            update: Mutex::new(()),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Announce an upcoming series of writes.
    pub fn update(&self) -> MutexGuard<'_, ()> {
        self.update.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stored chain as seen from a head at `height`. Blocks and transactions
/// stored above the head are invisible, which matters while a rescan walks
/// blocks that are still on disk.
///
/// Lookups cannot report storage failures through [`ChainReader`], so the
/// first one is kept and every later lookup answers `None`. Callers must
/// [`check`](StoreChain::check) before acting on anything they read.
pub struct StoreChain<'a> {
    store: &'a dyn ChainStore,
    height: u32,
    failure: RefCell<Option<StoreError>>,
}

impl<'a> StoreChain<'a> {
    pub fn new(store: &'a dyn ChainStore, height: u32) -> Self {
        Self {
            store,
            height,
            failure: RefCell::new(None),
        }
    }

    /// The first storage failure a lookup ran into, if any.
    pub fn check(&self) -> Result<(), StoreError> {
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn failed(&self) -> bool {
        self.failure.borrow().is_some()
    }

    fn record(&self, e: StoreError) {
        warn!(error = %e, "chain lookup failed");
        let mut failure = self.failure.borrow_mut();
        if failure.is_none() {
            *failure = Some(e);
        }
    }

    fn read<T>(&self, result: Result<Option<T>, StoreError>) -> Option<T> {
        result.unwrap_or_else(|e| {
            self.record(e);
            None
        })
    }
}

impl ChainReader for StoreChain<'_> {
    fn height(&self) -> u32 {
        self.height
    }

    fn block_id_at_height(&self, height: u32) -> Option<BlockId> {
        if height > self.height || self.failed() {
            return None;
        }
        self.read(self.store.block_id_at_height(height))
    }

    fn transaction_height(&self, id: TransactionId) -> Option<u32> {
        if self.failed() {
            return None;
        }
        self.read(self.store.get_transaction(id))
            .map(|t| t.height)
            .filter(|h| *h <= self.height)
    }

    fn transaction_by_full_hash(&self, full_hash: &Hash256) -> Option<(u32, Transaction)> {
        if self.failed() {
            return None;
        }
        let stored = self
            .read(self.store.transaction_by_full_hash(full_hash))
            .filter(|stored| stored.height <= self.height)?;
        match Transaction::parse(&stored.bytes) {
            Ok(tx) => Some((stored.height, tx)),
            Err(e) => {
                self.record(StoreError::Corruption(format!(
                    "stored transaction {} does not parse: {e}",
                    stored.id
                )));
                None
            }
        }
    }
}
