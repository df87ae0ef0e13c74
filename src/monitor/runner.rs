use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::shutdown::ShutdownSignal;
use crate::alerts::{
    evaluate, AlertDispatcher, AlertEvent, CooldownState, DispatchOutcome, Finding, Thresholds,
};
use crate::data::Reading;
use crate::sensor::SensorSource;
use crate::storage::ReadingStore;

/// How long the loop keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Cycle until cancelled
    Continuous,
    /// Run exactly one cycle, then stop without sleeping
    SingleCycle,
}

/// Cycle state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Sampling,
    Persisting,
    Evaluating,
    Dispatching,
    Sleeping,
    Terminated,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Sampling => "sampling",
            CyclePhase::Persisting => "persisting",
            CyclePhase::Evaluating => "evaluating",
            CyclePhase::Dispatching => "dispatching",
            CyclePhase::Sleeping => "sleeping",
            CyclePhase::Terminated => "terminated",
        }
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    SingleCycleComplete,
    Cancelled,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::SingleCycleComplete => f.write_str("single cycle complete"),
            ShutdownReason::Cancelled => f.write_str("shutdown signal received"),
        }
    }
}

/// What happened during one cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// `None` when the sensor could not be read
    pub reading: Option<Reading>,
    pub persisted: bool,
    pub findings: Vec<Finding>,
    /// `None` when the cycle had nothing to dispatch or was cut short
    pub outcome: Option<DispatchOutcome>,
    /// Last phase that ran to completion
    pub last_phase: CyclePhase,
    /// Cancellation stopped the cycle before it finished
    pub cancelled: bool,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            reading: None,
            persisted: false,
            findings: Vec::new(),
            outcome: None,
            last_phase: CyclePhase::Idle,
            cancelled: false,
        }
    }

    pub fn dispatched(&self) -> bool {
        self.outcome
            .as_ref()
            .map(|o| o.is_dispatched())
            .unwrap_or(false)
    }
}

/// Totals reported when the loop terminates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub alerts_dispatched: u64,
    pub reason: ShutdownReason,
}

/// Single sequential worker driving the monitoring cycle
pub struct Monitor {
    sensor: Arc<dyn SensorSource>,
    store: Arc<dyn ReadingStore>,
    thresholds: Thresholds,
    dispatcher: AlertDispatcher,
    cooldown: CooldownState,
    interval: Duration,
    mode: RunMode,
}

impl Monitor {
    pub fn new(
        sensor: Arc<dyn SensorSource>,
        store: Arc<dyn ReadingStore>,
        thresholds: Thresholds,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            sensor,
            store,
            thresholds,
            dispatcher,
            cooldown: CooldownState::new(),
            interval: Duration::from_secs(5),
            mode: RunMode::Continuous,
        }
    }

    /// Set the sleep between cycles
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Run one sample, persist, evaluate, dispatch cycle.
    ///
    /// Cancellation is checked between phases: the phase in flight completes and no
    /// further phase starts.
    pub async fn run_cycle(&mut self, shutdown: &ShutdownSignal) -> CycleReport {
        let started_at = Utc::now();
        let mut report = CycleReport::new(started_at);

        // Sampling
        let values = match self.sensor.read() {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    timestamp = %started_at,
                    component = "sensor",
                    sensor = self.sensor.name(),
                    error = %e,
                    "Sensor read failed, skipping cycle"
                );
                return report;
            }
        };
        let reading = Reading::new(started_at, values);
        report.reading = Some(reading);
        report.last_phase = CyclePhase::Sampling;
        if Self::interrupted(shutdown, &mut report) {
            return report;
        }

        // Persisting
        match self.store.save(&reading) {
            Ok(id) => {
                report.persisted = true;
                tracing::debug!(id, timestamp = %started_at, "Reading saved");
            }
            Err(e) => {
                tracing::error!(
                    timestamp = %started_at,
                    component = "store",
                    error = %e,
                    "Failed to save reading, continuing"
                );
            }
        }
        report.last_phase = CyclePhase::Persisting;
        if Self::interrupted(shutdown, &mut report) {
            return report;
        }

        // Evaluating
        report.findings = evaluate(&reading, &self.thresholds);
        report.last_phase = CyclePhase::Evaluating;
        if report.findings.is_empty() {
            self.log_cycle(&report);
            return report;
        }
        if Self::interrupted(shutdown, &mut report) {
            return report;
        }

        // Dispatching
        let event = AlertEvent::new(started_at, report.findings.clone());
        let outcome = self.dispatcher.dispatch(&event, &mut self.cooldown).await;
        report.outcome = Some(outcome);
        report.last_phase = CyclePhase::Dispatching;

        self.log_cycle(&report);
        report
    }

    /// Drive cycles until cancelled, or once in single-cycle mode
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> RunSummary {
        let mut cycles = 0u64;
        let mut alerts_dispatched = 0u64;

        tracing::info!(
            mode = ?self.mode,
            interval_secs = self.interval.as_secs_f64(),
            sensor = self.sensor.name(),
            "Monitoring loop started"
        );

        let reason = loop {
            if shutdown.is_triggered() {
                break ShutdownReason::Cancelled;
            }

            let report = self.run_cycle(&shutdown).await;
            cycles += 1;
            if report.dispatched() {
                alerts_dispatched += 1;
            }

            if report.cancelled {
                break ShutdownReason::Cancelled;
            }
            if self.mode == RunMode::SingleCycle {
                break ShutdownReason::SingleCycleComplete;
            }

            tracing::trace!(phase = CyclePhase::Sleeping.as_str(), "Waiting for next cycle");
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.triggered() => break ShutdownReason::Cancelled,
            }
        };

        tracing::info!(
            reason = %reason,
            cycles,
            alerts_dispatched,
            phase = CyclePhase::Terminated.as_str(),
            "Monitoring loop stopped"
        );

        RunSummary {
            cycles,
            alerts_dispatched,
            reason,
        }
    }

    fn interrupted(shutdown: &ShutdownSignal, report: &mut CycleReport) -> bool {
        if shutdown.is_triggered() {
            tracing::info!(
                timestamp = %report.started_at,
                after = report.last_phase.as_str(),
                "Cycle interrupted by shutdown"
            );
            report.cancelled = true;
            return true;
        }
        false
    }

    fn log_cycle(&self, report: &CycleReport) {
        let Some(reading) = report.reading else {
            return;
        };
        let alert = report
            .outcome
            .as_ref()
            .map(|o| o.label())
            .unwrap_or("none");

        tracing::info!(
            timestamp = %reading.timestamp,
            temperature = reading.temperature,
            humidity = reading.humidity,
            light = reading.light,
            findings = report.findings.len(),
            persisted = report.persisted,
            alert,
            "Cycle complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{
        AlertSettings, ChannelError, Metric, Notification, NotificationChannel,
    };
    use crate::data::SensorValues;
    use crate::monitor::shutdown::{shutdown_channel, ShutdownHandle};
    use crate::sensor::{FixtureSensor, SensorError};
    use crate::storage::{MemoryReadingStore, StorageError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingChannel {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl NotificationChannel for CountingChannel {
        fn name(&self) -> &str {
            "counting"
        }

        fn render(&self, lines: &[String]) -> Notification {
            Notification {
                subject: "alert".to_string(),
                body: lines.join("\n"),
                recipient: "ops".to_string(),
            }
        }

        async fn send(&self, _notification: &Notification) -> Result<(), ChannelError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Requests shutdown from inside a phase, the way a signal would land mid-cycle
    struct ShutdownOnSend {
        handle: Arc<ShutdownHandle>,
        sent: AtomicUsize,
    }

    #[async_trait]
    impl NotificationChannel for ShutdownOnSend {
        fn name(&self) -> &str {
            "shutdown-on-send"
        }

        fn render(&self, lines: &[String]) -> Notification {
            Notification {
                subject: "alert".to_string(),
                body: lines.join("\n"),
                recipient: "ops".to_string(),
            }
        }

        async fn send(&self, _notification: &Notification) -> Result<(), ChannelError> {
            self.handle.trigger();
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ShutdownOnSave {
        inner: MemoryReadingStore,
        handle: Arc<ShutdownHandle>,
    }

    impl ReadingStore for ShutdownOnSave {
        fn init(&self) -> Result<(), StorageError> {
            self.inner.init()
        }

        fn save(&self, reading: &Reading) -> Result<i64, StorageError> {
            self.handle.trigger();
            self.inner.save(reading)
        }

        fn latest(&self, limit: usize) -> Result<Vec<Reading>, StorageError> {
            self.inner.latest(limit)
        }

        fn count(&self) -> Result<u64, StorageError> {
            self.inner.count()
        }
    }

    struct BrokenSensor;

    impl SensorSource for BrokenSensor {
        fn read(&self) -> Result<SensorValues, SensorError> {
            Err(SensorError::Unavailable("bus timeout".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    struct Harness {
        store: Arc<MemoryReadingStore>,
        channel: Arc<CountingChannel>,
    }

    fn monitor(sensor: Arc<dyn SensorSource>, settings: AlertSettings) -> (Monitor, Harness) {
        let store = Arc::new(MemoryReadingStore::new());
        let channel = Arc::new(CountingChannel::default());
        let dispatcher = AlertDispatcher::new(settings).with_channel(channel.clone());
        let monitor = Monitor::new(sensor, store.clone(), Thresholds::default(), dispatcher);
        (monitor, Harness { store, channel })
    }

    fn fixture(temperature: f64, humidity: f64, light: f64) -> Arc<dyn SensorSource> {
        Arc::new(FixtureSensor::new(SensorValues::new(temperature, humidity, light)))
    }

    #[tokio::test]
    async fn test_alert_scenario_dispatches() {
        let (mut monitor, harness) =
            monitor(Arc::new(FixtureSensor::alert_test()), AlertSettings::default());
        let (_handle, signal) = shutdown_channel();

        let report = monitor.run_cycle(&signal).await;

        assert!(report.persisted);
        assert_eq!(
            report.findings.iter().map(|f| f.metric).collect::<Vec<_>>(),
            vec![Metric::Temperature, Metric::Humidity, Metric::Light]
        );
        assert!(report.dispatched());
        assert_eq!(report.last_phase, CyclePhase::Dispatching);
        assert_eq!(harness.channel.sent.load(Ordering::SeqCst), 1);
        assert_eq!(harness.store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_normal_reading_no_dispatch() {
        let (mut monitor, harness) = monitor(fixture(25.0, 50.0, 80.0), AlertSettings::default());
        let (_handle, signal) = shutdown_channel();

        let report = monitor.run_cycle(&signal).await;

        assert!(report.findings.is_empty());
        assert!(report.outcome.is_none());
        assert_eq!(report.last_phase, CyclePhase::Evaluating);
        assert_eq!(harness.channel.sent.load(Ordering::SeqCst), 0);
        assert_eq!(harness.store.latest(1).unwrap()[0].temperature, 25.0);
    }

    #[tokio::test]
    async fn test_sensor_failure_skips_cycle() {
        let (mut monitor, harness) = monitor(Arc::new(BrokenSensor), AlertSettings::default());
        let (_handle, signal) = shutdown_channel();

        let report = monitor.run_cycle(&signal).await;

        assert!(report.reading.is_none());
        assert!(!report.persisted);
        assert_eq!(report.last_phase, CyclePhase::Idle);
        assert_eq!(harness.store.count().unwrap(), 0);
        assert_eq!(harness.channel.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_failure_still_alerts() {
        let (mut monitor, harness) =
            monitor(Arc::new(FixtureSensor::alert_test()), AlertSettings::default());
        harness.store.set_fail_writes(true);
        let (_handle, signal) = shutdown_channel();

        let report = monitor.run_cycle(&signal).await;

        assert!(!report.persisted);
        assert!(report.dispatched());
        assert_eq!(harness.channel.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cooldown_applies_across_cycles() {
        let (mut monitor, harness) =
            monitor(Arc::new(FixtureSensor::alert_test()), AlertSettings::default());
        let (_handle, signal) = shutdown_channel();

        let first = monitor.run_cycle(&signal).await;
        let second = monitor.run_cycle(&signal).await;

        assert!(first.dispatched());
        assert!(matches!(second.outcome, Some(DispatchOutcome::Suppressed(_))));
        assert_eq!(harness.channel.sent.load(Ordering::SeqCst), 1);
        assert_eq!(harness.store.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_cycle_stops_after_sampling() {
        let (mut monitor, harness) =
            monitor(Arc::new(FixtureSensor::alert_test()), AlertSettings::default());
        let (handle, signal) = shutdown_channel();
        handle.trigger();

        let report = monitor.run_cycle(&signal).await;

        assert!(report.cancelled);
        assert_eq!(report.last_phase, CyclePhase::Sampling);
        assert_eq!(harness.store.count().unwrap(), 0);
        assert_eq!(harness.channel.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_single_cycle_mode_terminates_without_sleeping() {
        let (monitor, harness) =
            monitor(Arc::new(FixtureSensor::alert_test()), AlertSettings::default());
        let monitor = monitor
            .with_interval(Duration::from_secs(3600))
            .with_mode(RunMode::SingleCycle);
        let (_handle, signal) = shutdown_channel();

        let summary = tokio::time::timeout(Duration::from_secs(5), monitor.run(signal))
            .await
            .expect("single cycle must not sleep");

        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.alerts_dispatched, 1);
        assert_eq!(summary.reason, ShutdownReason::SingleCycleComplete);
        assert_eq!(harness.store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let (monitor, harness) = monitor(fixture(25.0, 50.0, 80.0), AlertSettings::default());
        let monitor = monitor.with_interval(Duration::from_secs(3600));
        let (handle, signal) = shutdown_channel();

        let task = tokio::spawn(monitor.run(signal));
        while harness.store.count().unwrap() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.trigger();

        let summary = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("sleep must be interruptible")
            .unwrap();

        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.reason, ShutdownReason::Cancelled);
    }

    #[tokio::test]
    async fn test_continuous_mode_repeats_until_cancelled() {
        let (monitor, harness) = monitor(fixture(25.0, 50.0, 80.0), AlertSettings::default());
        let monitor = monitor.with_interval(Duration::from_millis(5));
        let (handle, signal) = shutdown_channel();

        let task = tokio::spawn(monitor.run(signal));
        while harness.store.count().unwrap() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.trigger();

        let summary = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert!(summary.cycles >= 3);
        assert_eq!(summary.reason, ShutdownReason::Cancelled);
        assert_eq!(summary.alerts_dispatched, 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_runs_no_cycle() {
        let (monitor, harness) = monitor(fixture(25.0, 50.0, 80.0), AlertSettings::default());
        let (handle, signal) = shutdown_channel();
        handle.trigger();

        let summary = monitor.run(signal).await;

        assert_eq!(summary.cycles, 0);
        assert_eq!(harness.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_dispatch_finishes_cycle_then_stops() {
        let (handle, signal) = shutdown_channel();
        let handle = Arc::new(handle);
        let store = Arc::new(MemoryReadingStore::new());
        let channel = Arc::new(ShutdownOnSend {
            handle: handle.clone(),
            sent: AtomicUsize::new(0),
        });
        let dispatcher =
            AlertDispatcher::new(AlertSettings::default()).with_channel(channel.clone());
        let monitor = Monitor::new(
            Arc::new(FixtureSensor::alert_test()),
            store.clone(),
            Thresholds::default(),
            dispatcher,
        )
        .with_interval(Duration::from_millis(10));

        let summary = tokio::time::timeout(Duration::from_secs(5), monitor.run(signal))
            .await
            .expect("loop should stop after the in-flight cycle");

        assert_eq!(summary.reason, ShutdownReason::Cancelled);
        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.alerts_dispatched, 1);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(channel.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_persist_skips_evaluation() {
        let (handle, signal) = shutdown_channel();
        let handle = Arc::new(handle);
        let store = Arc::new(ShutdownOnSave {
            inner: MemoryReadingStore::new(),
            handle: handle.clone(),
        });
        let channel = Arc::new(CountingChannel::default());
        let dispatcher =
            AlertDispatcher::new(AlertSettings::default()).with_channel(channel.clone());
        let mut monitor = Monitor::new(
            Arc::new(FixtureSensor::alert_test()),
            store.clone(),
            Thresholds::default(),
            dispatcher,
        );

        let report = monitor.run_cycle(&signal).await;

        assert!(report.cancelled);
        assert!(report.persisted);
        assert_eq!(report.last_phase, CyclePhase::Persisting);
        assert!(report.findings.is_empty());
        assert!(report.outcome.is_none());
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(channel.sent.load(Ordering::SeqCst), 0);
    }
}
