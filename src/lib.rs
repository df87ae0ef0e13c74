//! Control Tower: environmental monitoring with threshold alerts
//!
//! Periodically samples temperature, humidity and light, persists every reading,
//! evaluates it against configured safety thresholds and sends email/SMS alerts
//! when a threshold is violated. A read-only dashboard exposes the stored readings.
//!
//! # Features
//!
//! - **Monitoring loop**: sample, persist, evaluate, dispatch, sleep; continuous or
//!   single-cycle, with cancellation between phases and during the sleep
//! - **Durable store**: append-only SQLite table with a "most recent N" query
//! - **Threshold evaluation**: pure and deterministic, one finding per violated metric
//! - **Alert dispatch**: concurrent channel fan-out, per-channel results, and a
//!   cooldown that suppresses repeats of an alert covering the same metrics
//! - **Dashboard**: latest reading, history, CSV export
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use control_tower::alerts::{AlertDispatcher, AlertSettings, Thresholds};
//! use control_tower::monitor::{shutdown_channel, Monitor, RunMode};
//! use control_tower::sensor::FixtureSensor;
//! use control_tower::storage::{ReadingStore, SqliteReadingStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteReadingStore::open("sensor_data.db")?);
//! store.init()?;
//!
//! let monitor = Monitor::new(
//!     Arc::new(FixtureSensor::alert_test()),
//!     store,
//!     Thresholds::default(),
//!     AlertDispatcher::new(AlertSettings::default()),
//! )
//! .with_mode(RunMode::SingleCycle);
//!
//! let (_handle, signal) = shutdown_channel();
//! let summary = monitor.run(signal).await;
//! println!("ran {} cycle(s)", summary.cycles);
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod config;
pub mod data;
pub mod monitor;
pub mod sensor;
pub mod storage;

// Re-export commonly used types
pub use alerts::{evaluate, AlertDispatcher, DispatchOutcome, Finding, Metric, Thresholds};
pub use config::{AppConfig, ConfigError};
pub use data::{Reading, SensorValues};
pub use monitor::{Monitor, RunMode, RunSummary};
pub use storage::{ReadingStore, SqliteReadingStore, StorageError};
