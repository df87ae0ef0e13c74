//! Monitoring loop
//!
//! Runs the sample, persist, evaluate, dispatch cycle on a fixed cadence until it is
//! cancelled or, in single-cycle mode, after the first cycle.

pub mod runner;
pub mod shutdown;

pub use runner::{CyclePhase, CycleReport, Monitor, RunMode, RunSummary, ShutdownReason};
pub use shutdown::{shutdown_channel, ShutdownHandle, ShutdownSignal};
