use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use super::{ReadingStore, StorageError};
use crate::data::Reading;

/// In-process reading store, used for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryReadingStore {
    rows: RwLock<Vec<Reading>>,
    fail_writes: AtomicBool,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail with a write error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ReadingStore for MemoryReadingStore {
    fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn save(&self, reading: &Reading) -> Result<i64, StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write("writes disabled".to_string()));
        }

        let mut rows = self.rows.write();
        rows.push(*reading);
        Ok(rows.len() as i64)
    }

    fn latest(&self, limit: usize) -> Result<Vec<Reading>, StorageError> {
        if limit == 0 {
            return Err(StorageError::InvalidLimit(limit));
        }

        let rows = self.rows.read();
        let mut indexed: Vec<(usize, &Reading)> = rows.iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| {
            b.timestamp.cmp(&a.timestamp).then_with(|| ib.cmp(ia))
        });

        Ok(indexed
            .into_iter()
            .take(limit)
            .map(|(_, reading)| *reading)
            .collect())
    }

    fn count(&self) -> Result<u64, StorageError> {
        Ok(self.rows.read().len() as u64)
    }
}
