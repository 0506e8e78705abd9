//! Nullable store: thread-safe in-memory chain storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use xel_store::{
    BlockStore, MetaStore, StoreError, StoredBlock, StoredTransaction, TransactionStore,
};
use xel_types::{BlockId, Hash256, TransactionId};

#[derive(Clone, Debug, Default)]
pub struct StoreContents {
    pub blocks: HashMap<BlockId, StoredBlock>,
    pub heights: BTreeMap<u32, BlockId>,
    pub transactions: HashMap<TransactionId, StoredTransaction>,
    pub full_hashes: HashMap<Hash256, TransactionId>,
    pub meta: HashMap<String, Vec<u8>>,
}

/// Blocks, transactions and meta entries in memory, with the same
/// semantics as the LMDB backend: one block per height, deletes cascade to
/// the block's transactions.
#[derive(Debug, Default)]
pub struct NullBlockStore {
    inner: Mutex<StoreContents>,
    fail_writes: AtomicBool,
    fail_transaction_reads: AtomicBool,
}

impl NullBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following block write or delete fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every following transaction lookup fail with a backend error.
    pub fn fail_transaction_reads(&self, fail: bool) {
        self.fail_transaction_reads.store(fail, Ordering::SeqCst);
    }

    /// Copy of everything stored.
    pub fn contents(&self) -> StoreContents {
        self.lock().clone()
    }

    pub fn into_inner(self) -> StoreContents {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, StoreContents> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write failure injected".into()));
        }
        Ok(())
    }

    fn check_transaction_readable(&self) -> Result<(), StoreError> {
        if self.fail_transaction_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("read failure injected".into()));
        }
        Ok(())
    }
}

impl BlockStore for NullBlockStore {
    fn put_block(
        &self,
        block: &StoredBlock,
        transactions: &[StoredTransaction],
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut inner = self.lock();
        if inner.heights.contains_key(&block.height) {
            return Err(StoreError::HeightTaken(block.height));
        }
        inner.blocks.insert(block.id, block.clone());
        inner.heights.insert(block.height, block.id);
        for tx in transactions {
            inner.full_hashes.insert(tx.full_hash, tx.id);
            inner.transactions.insert(tx.id, tx.clone());
        }
        Ok(())
    }

    fn get_block(&self, id: BlockId) -> Result<Option<StoredBlock>, StoreError> {
        Ok(self.lock().blocks.get(&id).cloned())
    }

    fn block_id_at_height(&self, height: u32) -> Result<Option<BlockId>, StoreError> {
        Ok(self.lock().heights.get(&height).copied())
    }

    fn last_block(&self) -> Result<Option<StoredBlock>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .heights
            .values()
            .next_back()
            .and_then(|id| inner.blocks.get(id))
            .cloned())
    }

    fn block_ids_from_height(&self, from: u32, limit: usize) -> Result<Vec<BlockId>, StoreError> {
        Ok(self
            .lock()
            .heights
            .range(from..)
            .take(limit)
            .map(|(_, id)| *id)
            .collect())
    }

    fn delete_blocks_from(&self, height: u32) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let doomed = inner.heights.split_off(&height);
        for id in doomed.values() {
            let Some(block) = inner.blocks.remove(id) else {
                return Err(StoreError::Corruption(
                    "height index points at a missing block".into(),
                ));
            };
            for tx_id in &block.transaction_ids {
                if let Some(tx) = inner.transactions.remove(tx_id) {
                    inner.full_hashes.remove(&tx.full_hash);
                }
            }
        }
        Ok(())
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock().blocks.len() as u64)
    }
}

impl TransactionStore for NullBlockStore {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<StoredTransaction>, StoreError> {
        self.check_transaction_readable()?;
        Ok(self.lock().transactions.get(&id).cloned())
    }

    fn transaction_by_full_hash(
        &self,
        full_hash: &Hash256,
    ) -> Result<Option<StoredTransaction>, StoreError> {
        self.check_transaction_readable()?;
        let inner = self.lock();
        Ok(inner
            .full_hashes
            .get(full_hash)
            .and_then(|id| inner.transactions.get(id))
            .cloned())
    }
}

impl MetaStore for NullBlockStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.lock().meta.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().meta.get(key).cloned())
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.lock().meta.remove(key);
        Ok(())
    }
}
