//! LMDB implementation of BlockStore.

use std::ops::Bound;

use tracing::debug;
use xel_store::{BlockStore, StoreError, StoredBlock, StoredTransaction};
use xel_types::BlockId;

use crate::environment::LmdbEnvironment;
use crate::{height_key, id_key, read_id_key, LmdbError};

impl LmdbEnvironment {
    fn read_block(&self, rtxn: &heed::RoTxn, id: BlockId) -> Result<Option<StoredBlock>, LmdbError> {
        match self.blocks_db.get(rtxn, &id_key(id.raw()))? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }
}

impl BlockStore for LmdbEnvironment {
    fn put_block(
        &self,
        block: &StoredBlock,
        transactions: &[StoredTransaction],
    ) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let hk = height_key(block.height);
        if self
            .block_heights_db
            .get(&wtxn, &hk)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::HeightTaken(block.height));
        }

        let encoded = bincode::serialize(block).map_err(LmdbError::from)?;
        let ik = id_key(block.id.raw());
        self.blocks_db
            .put(&mut wtxn, &ik, &encoded)
            .map_err(LmdbError::from)?;
        self.block_heights_db
            .put(&mut wtxn, &hk, &ik)
            .map_err(LmdbError::from)?;

        for tx in transactions {
            let encoded = bincode::serialize(tx).map_err(LmdbError::from)?;
            let tk = id_key(tx.id.raw());
            self.transactions_db
                .put(&mut wtxn, &tk, &encoded)
                .map_err(LmdbError::from)?;
            self.tx_full_hash_db
                .put(&mut wtxn, tx.full_hash.as_bytes(), &tk)
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_block(&self, id: BlockId) -> Result<Option<StoredBlock>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_block(&rtxn, id)?)
    }

    fn block_id_at_height(&self, height: u32) -> Result<Option<BlockId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .block_heights_db
            .get(&rtxn, &height_key(height))
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(BlockId::new(read_id_key(bytes)?))),
            None => Ok(None),
        }
    }

    fn last_block(&self) -> Result<Option<StoredBlock>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let Some((_, id)) = self.block_heights_db.last(&rtxn).map_err(LmdbError::from)? else {
            return Ok(None);
        };
        let id = BlockId::new(read_id_key(id)?);
        Ok(self.read_block(&rtxn, id)?)
    }

    fn block_ids_from_height(&self, from: u32, limit: usize) -> Result<Vec<BlockId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let start = height_key(from);
        let range = (Bound::Included(&start[..]), Bound::Unbounded);
        let mut ids = Vec::new();
        for entry in self
            .block_heights_db
            .range(&rtxn, &range)
            .map_err(LmdbError::from)?
            .take(limit)
        {
            let (_, id) = entry.map_err(LmdbError::from)?;
            ids.push(BlockId::new(read_id_key(id)?));
        }
        Ok(ids)
    }

    fn delete_blocks_from(&self, height: u32) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let start = height_key(height);
        let range = (Bound::Included(&start[..]), Bound::Unbounded);
        let mut doomed = Vec::new();
        for entry in self
            .block_heights_db
            .range(&wtxn, &range)
            .map_err(LmdbError::from)?
        {
            let (hk, id) = entry.map_err(LmdbError::from)?;
            doomed.push((hk.to_vec(), id.to_vec()));
        }

        for (hk, ik) in &doomed {
            let bytes = self
                .blocks_db
                .get(&wtxn, ik)
                .map_err(LmdbError::from)?
                .ok_or_else(|| StoreError::Corruption("height index points at a missing block".into()))?;
            let block: StoredBlock = bincode::deserialize(bytes).map_err(LmdbError::from)?;
            for tx_id in &block.transaction_ids {
                let tk = id_key(tx_id.raw());
                if let Some(tx_bytes) = self.transactions_db.get(&wtxn, &tk).map_err(LmdbError::from)? {
                    let tx: StoredTransaction =
                        bincode::deserialize(tx_bytes).map_err(LmdbError::from)?;
                    self.tx_full_hash_db
                        .delete(&mut wtxn, tx.full_hash.as_bytes())
                        .map_err(LmdbError::from)?;
                }
                self.transactions_db
                    .delete(&mut wtxn, &tk)
                    .map_err(LmdbError::from)?;
            }
            self.blocks_db.delete(&mut wtxn, ik).map_err(LmdbError::from)?;
            self.block_heights_db
                .delete(&mut wtxn, hk)
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        debug!(from_height = height, deleted = doomed.len(), "deleted blocks");
        Ok(())
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.blocks_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
