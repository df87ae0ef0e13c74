//! Threshold alerting
//!
//! Evaluates readings against configured bounds and dispatches alert notifications
//! to email and SMS channels, with a cooldown that suppresses repeated alerts.

pub mod checker;
pub mod config;
pub mod dispatcher;
pub mod notifier;

pub use checker::{evaluate, Finding, Metric};
pub use config::{AlertSettings, Thresholds};
pub use dispatcher::{
    AlertDispatcher, AlertEvent, ChannelResult, CooldownState, DispatchOutcome, SuppressReason,
};
pub use notifier::{
    ChannelError, ChannelKind, Notification, NotificationChannel, RelayChannel, Transport,
    DEFAULT_WEBHOOK_TIMEOUT,
};
