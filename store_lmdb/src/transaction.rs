//! LMDB implementation of TransactionStore.

use xel_store::{StoreError, StoredTransaction, TransactionStore};
use xel_types::{Hash256, TransactionId};

use crate::environment::LmdbEnvironment;
use crate::{id_key, LmdbError};

impl TransactionStore for LmdbEnvironment {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<StoredTransaction>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .transactions_db
            .get(&rtxn, &id_key(id.raw()))
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn transaction_by_full_hash(
        &self,
        full_hash: &Hash256,
    ) -> Result<Option<StoredTransaction>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let Some(id) = self
            .tx_full_hash_db
            .get(&rtxn, full_hash.as_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        match self.transactions_db.get(&rtxn, id).map_err(LmdbError::from)? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Err(StoreError::Corruption(format!(
                "full hash {full_hash} points at a missing transaction"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::tests::block;
    use crate::environment::tests::open_temp;
    use xel_store::BlockStore;

    #[test]
    fn lookup_by_id_and_full_hash() {
        let (_dir, env) = open_temp();
        let (b, t) = block(0, &[5]);
        env.put_block(&b, &t).unwrap();

        let by_id = env.get_transaction(TransactionId::new(5)).unwrap().unwrap();
        let by_hash = env
            .transaction_by_full_hash(&Hash256::new([5; 32]))
            .unwrap()
            .unwrap();
        assert_eq!(by_id, by_hash);
        assert_eq!(by_id.block_id, b.id);
        assert!(env.get_transaction(TransactionId::new(6)).unwrap().is_none());
    }
}
