//! Block storage trait.

use crate::transaction::StoredTransaction;
use crate::StoreError;
use serde::{Deserialize, Serialize};
use xel_types::{BlockId, Timestamp, TransactionId};

/// A block as persisted: the signed header bytes plus the values computed
/// when it was attached to the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub id: BlockId,
    pub height: u32,
    pub previous_block_id: BlockId,
    pub timestamp: Timestamp,
    pub base_target: u64,
    pub cumulative_difficulty: u128,
    /// Signed header encoding.
    pub bytes: Vec<u8>,
    /// Ids of the block's transactions in block order.
    pub transaction_ids: Vec<TransactionId>,
}

/// Canonical chain storage. Heights are dense: the block at height `h` is
/// the child of the block at `h - 1`.
pub trait BlockStore {
    /// Append a block and its transactions atomically.
    fn put_block(
        &self,
        block: &StoredBlock,
        transactions: &[StoredTransaction],
    ) -> Result<(), StoreError>;

    fn get_block(&self, id: BlockId) -> Result<Option<StoredBlock>, StoreError>;

    fn has_block(&self, id: BlockId) -> Result<bool, StoreError> {
        Ok(self.get_block(id)?.is_some())
    }

    fn block_id_at_height(&self, height: u32) -> Result<Option<BlockId>, StoreError>;

    fn block_at_height(&self, height: u32) -> Result<Option<StoredBlock>, StoreError> {
        match self.block_id_at_height(height)? {
            Some(id) => self.get_block(id),
            None => Ok(None),
        }
    }

    /// Highest stored block.
    fn last_block(&self) -> Result<Option<StoredBlock>, StoreError>;

    /// Up to `limit` ids of the blocks at heights `from..`.
    fn block_ids_from_height(&self, from: u32, limit: usize) -> Result<Vec<BlockId>, StoreError>;

    /// Delete every block at `height` or above, with its transactions, in
    /// one unit.
    fn delete_blocks_from(&self, height: u32) -> Result<(), StoreError>;

    fn block_count(&self) -> Result<u64, StoreError>;
}
