//! Metadata storage trait.

use crate::StoreError;
use serde::{Deserialize, Serialize};

/// Key of the pending rescan record.
pub const SCAN_SCHEDULE_KEY: &str = "scan_schedule";

/// A rescan that was requested but has not completed yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSchedule {
    pub height: u32,
    pub validate: bool,
}

/// Generic key-value store for internal bookkeeping that doesn't belong in
/// the chain tables.
pub trait MetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn delete_meta(&self, key: &str) -> Result<(), StoreError>;

    fn scan_schedule(&self) -> Result<Option<ScanSchedule>, StoreError> {
        match self.get_meta(SCAN_SCHEDULE_KEY)? {
            Some(bytes) => match bytes.as_slice() {
                [h0, h1, h2, h3, v] => Ok(Some(ScanSchedule {
                    height: u32::from_le_bytes([*h0, *h1, *h2, *h3]),
                    validate: *v != 0,
                })),
                _ => Err(StoreError::Corruption("malformed scan schedule".into())),
            },
            None => Ok(None),
        }
    }

    fn schedule_scan(&self, schedule: ScanSchedule) -> Result<(), StoreError> {
        let mut bytes = schedule.height.to_le_bytes().to_vec();
        bytes.push(u8::from(schedule.validate));
        self.put_meta(SCAN_SCHEDULE_KEY, &bytes)
    }

    fn clear_scan_schedule(&self) -> Result<(), StoreError> {
        self.delete_meta(SCAN_SCHEDULE_KEY)
    }
}
