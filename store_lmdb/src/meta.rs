//! LMDB implementation of MetaStore.

use xel_store::meta::MetaStore;
use xel_store::StoreError;

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

impl MetaStore for LmdbEnvironment {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.meta_db
            .put(&mut wtxn, key.as_bytes(), value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .meta_db
            .get(&rtxn, key.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.map(<[u8]>::to_vec))
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.meta_db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::tests::open_temp;
    use xel_store::ScanSchedule;

    #[test]
    fn scan_schedule_round_trip() {
        let (_dir, env) = open_temp();
        assert_eq!(env.scan_schedule().unwrap(), None);
        let schedule = ScanSchedule {
            height: 1234,
            validate: true,
        };
        env.schedule_scan(schedule).unwrap();
        assert_eq!(env.scan_schedule().unwrap(), Some(schedule));
        env.clear_scan_schedule().unwrap();
        assert_eq!(env.scan_schedule().unwrap(), None);
    }
}
