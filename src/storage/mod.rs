//! Reading store
//!
//! Append-only record of sampled readings. The monitoring loop is the only writer;
//! the dashboard reads concurrently through the same `latest` contract.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryReadingStore;
pub use sqlite::SqliteReadingStore;

use crate::data::Reading;

/// Durable, append-only storage for readings
pub trait ReadingStore: Send + Sync {
    /// Ensure the backing schema exists. Safe to call on every startup.
    fn init(&self) -> Result<(), StorageError>;

    /// Append one reading and return its store-generated identifier.
    ///
    /// The write is durable when this returns.
    fn save(&self, reading: &Reading) -> Result<i64, StorageError>;

    /// The `limit` most recent readings, newest first.
    ///
    /// Ties on timestamp are broken by insertion order (later insert first).
    /// `limit` must be at least 1.
    fn latest(&self, limit: usize) -> Result<Vec<Reading>, StorageError>;

    /// Total number of stored readings
    fn count(&self) -> Result<u64, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage write failed: {0}")]
    Write(String),

    #[error("Storage read failed: {0}")]
    Read(String),

    #[error("Invalid limit {0}: must be at least 1")]
    InvalidLimit(usize),
}
