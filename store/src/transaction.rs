//! Transaction storage trait.

use crate::block::StoredBlock;
use crate::StoreError;
use serde::{Deserialize, Serialize};
use xel_types::{BlockId, Hash256, Timestamp, TransactionId};

/// A confirmed transaction with its position in the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub id: TransactionId,
    pub full_hash: Hash256,
    pub block_id: BlockId,
    pub height: u32,
    pub index: u16,
    pub timestamp: Timestamp,
    /// Signed transaction encoding.
    pub bytes: Vec<u8>,
}

/// Index over confirmed transactions. Writes happen through
/// [`crate::BlockStore::put_block`].
pub trait TransactionStore {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<StoredTransaction>, StoreError>;

    fn has_transaction(&self, id: TransactionId) -> Result<bool, StoreError> {
        Ok(self.get_transaction(id)?.is_some())
    }

    fn transaction_by_full_hash(
        &self,
        full_hash: &Hash256,
    ) -> Result<Option<StoredTransaction>, StoreError>;

    /// The block's transactions in block order.
    fn block_transactions(&self, block: &StoredBlock) -> Result<Vec<StoredTransaction>, StoreError> {
        block
            .transaction_ids
            .iter()
            .map(|id| {
                self.get_transaction(*id)?.ok_or_else(|| {
                    StoreError::Corruption(format!(
                        "transaction {id} of block {} is missing",
                        block.id
                    ))
                })
            })
            .collect()
    }
}
