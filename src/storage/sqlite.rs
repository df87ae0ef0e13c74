//! SQLite-backed reading store

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use super::{ReadingStore, StorageError};
use crate::data::Reading;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sensor_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    temperature REAL NOT NULL,
    humidity REAL NOT NULL,
    light REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp ON sensor_data(timestamp);
"#;

/// Reading store persisted in a SQLite database.
///
/// The database runs in WAL mode with full fsync, so each insert is durable once
/// `save` returns and readers in other connections only ever see committed rows.
pub struct SqliteReadingStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteReadingStore {
    /// Open (or create) a file-backed store
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|e| {
            StorageError::Unavailable(format!("{}: {}", path.display(), e))
        })?;
        Self::configure(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Open the store and create its schema, logging the failure if either step fails.
    ///
    /// This is the startup path: the monitoring loop never runs without a store.
    pub fn open_initialized(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        Self::open(path)
            .and_then(|store| store.init().map(|()| store))
            .inspect_err(|e| {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Reading store unavailable"
                )
            })
    }

    /// Open a private in-memory store
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Self::configure(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn configure(conn: &Connection) -> Result<(), StorageError> {
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "FULL")
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

impl ReadingStore for SqliteReadingStore {
    fn init(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }

    fn save(&self, reading: &Reading) -> Result<i64, StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sensor_data (timestamp, temperature, humidity, light)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                reading.timestamp_text(),
                reading.temperature,
                reading.humidity,
                reading.light
            ],
        )
        .map_err(|e| StorageError::Write(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn latest(&self, limit: usize) -> Result<Vec<Reading>, StorageError> {
        if limit == 0 {
            return Err(StorageError::InvalidLimit(limit));
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows: Vec<(String, f64, f64, f64)> = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare_cached(
                    "SELECT timestamp, temperature, humidity, light
                     FROM sensor_data
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?1",
                )
                .map_err(|e| StorageError::Read(e.to_string()))?;

            let mapped = stmt
                .query_map([limit], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })
                .map_err(|e| StorageError::Read(e.to_string()))?;

            let rows = mapped
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::Read(e.to_string()))?;
            rows
        };

        rows.into_iter()
            .map(|(timestamp, temperature, humidity, light)| {
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| {
                        StorageError::Read(format!("bad timestamp '{}': {}", timestamp, e))
                    })?
                    .with_timezone(&Utc);
                Ok(Reading {
                    timestamp,
                    temperature,
                    humidity,
                    light,
                })
            })
            .collect()
    }

    fn count(&self) -> Result<u64, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sensor_data", [], |row| row.get(0))
            .map_err(|e| StorageError::Read(e.to_string()))?;
        Ok(count as u64)
    }
}
