//! Alert dispatch with per-signature cooldown

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use super::checker::{Finding, Metric};
use super::config::AlertSettings;
use super::notifier::{ChannelError, NotificationChannel};

/// Set of metrics an alert fired for. Observed values are not part of the signature.
pub type Signature = BTreeSet<Metric>;

/// Findings of one cycle, ready for dispatch
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub timestamp: DateTime<Utc>,
    pub findings: Vec<Finding>,
}

impl AlertEvent {
    pub fn new(timestamp: DateTime<Utc>, findings: Vec<Finding>) -> Self {
        Self {
            timestamp,
            findings,
        }
    }

    pub fn signature(&self) -> Signature {
        self.findings.iter().map(|f| f.metric).collect()
    }

    fn lines(&self) -> Vec<String> {
        self.findings.iter().map(|f| f.description.clone()).collect()
    }
}

/// Last successful dispatch time per signature.
///
/// Owned by the monitoring loop and passed into every dispatch call.
#[derive(Debug, Default)]
pub struct CooldownState {
    sent: HashMap<Signature, DateTime<Utc>>,
}

impl CooldownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining cooldown for `signature` at `now`, if any earlier alert covers it.
    ///
    /// An earlier alert covers a signature when the signature is a subset of it.
    /// Entries stamped later than `now` are treated as expired.
    pub fn remaining(
        &self,
        signature: &Signature,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Option<Duration> {
        self.sent
            .iter()
            .filter(|(sent, _)| signature.is_subset(sent))
            .filter_map(|(_, at)| match (now - *at).to_std() {
                Ok(elapsed) if elapsed < cooldown => Some(cooldown - elapsed),
                // a recorded time in the future means the clock stepped back
                _ => None,
            })
            .max()
    }

    pub fn record(&mut self, signature: Signature, at: DateTime<Utc>) {
        self.sent.insert(signature, at);
    }

    /// Forget signatures whose cooldown has fully elapsed
    pub fn prune(&mut self, now: DateTime<Utc>, cooldown: Duration) {
        self.sent.retain(|_, at| match (now - *at).to_std() {
            Ok(elapsed) => elapsed < cooldown,
            Err(_) => false,
        });
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

/// Why an alert was not sent
#[derive(Debug, Clone, PartialEq)]
pub enum SuppressReason {
    /// Alerting is switched off
    Disabled,
    /// An earlier alert covering the same findings is still cooling down
    Cooldown { remaining: Duration },
}

/// Delivery result for one channel
#[derive(Debug, Clone)]
pub struct ChannelResult {
    pub channel: String,
    pub recipient: String,
    pub result: Result<(), ChannelError>,
}

impl ChannelResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    NoAlert,
    Suppressed(SuppressReason),
    Dispatched { results: Vec<ChannelResult> },
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched { .. })
    }

    /// Short label for the per-cycle log line
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::NoAlert => "none",
            DispatchOutcome::Suppressed(SuppressReason::Disabled) => "disabled",
            DispatchOutcome::Suppressed(SuppressReason::Cooldown { .. }) => "cooldown",
            DispatchOutcome::Dispatched { results } if results.iter().all(|r| r.is_ok()) => {
                "sent"
            }
            DispatchOutcome::Dispatched { .. } => "partial",
        }
    }
}

/// Decides whether findings become notifications and fans them out to every channel
pub struct AlertDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    settings: AlertSettings,
}

impl AlertDispatcher {
    pub fn new(settings: AlertSettings) -> Self {
        Self {
            channels: Vec::new(),
            settings,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }

    /// Dispatch one cycle's findings.
    ///
    /// Channels are sent to concurrently and all of them are awaited. A failing
    /// channel never stops the others.
    pub async fn dispatch(&self, event: &AlertEvent, state: &mut CooldownState) -> DispatchOutcome {
        if event.findings.is_empty() {
            return DispatchOutcome::NoAlert;
        }

        if !self.settings.enabled {
            tracing::debug!(findings = event.findings.len(), "Alerting disabled, not sending");
            return DispatchOutcome::Suppressed(SuppressReason::Disabled);
        }

        let signature = event.signature();
        state.prune(event.timestamp, self.settings.cooldown);
        if let Some(remaining) = state.remaining(&signature, event.timestamp, self.settings.cooldown)
        {
            tracing::info!(
                signature = ?signature,
                remaining_secs = remaining.as_secs(),
                "Alert suppressed by cooldown"
            );
            return DispatchOutcome::Suppressed(SuppressReason::Cooldown { remaining });
        }

        let lines = event.lines();
        let sends = self.channels.iter().map(|channel| {
            let notification = channel.render(&lines);
            let channel = Arc::clone(channel);
            async move {
                let result = channel.send(&notification).await;
                ChannelResult {
                    channel: channel.name().to_string(),
                    recipient: notification.recipient,
                    result,
                }
            }
        });
        let results = join_all(sends).await;

        for r in &results {
            match &r.result {
                Ok(()) => tracing::info!(
                    channel = %r.channel,
                    recipient = %r.recipient,
                    "Alert notification sent"
                ),
                Err(e) => tracing::error!(
                    timestamp = %event.timestamp,
                    channel = %r.channel,
                    recipient = %r.recipient,
                    error = %e,
                    "Alert notification failed"
                ),
            }
        }

        if results.is_empty() || results.iter().any(|r| r.is_ok()) {
            state.record(signature, event.timestamp);
        }

        DispatchOutcome::Dispatched { results }
    }
}
