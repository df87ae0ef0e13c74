//! Notification channels for alerts

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

/// One outbound message for one recipient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

/// Kind of notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Email,
    Sms,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
        }
    }
}

/// A destination for alert notifications.
///
/// Implementations report delivery failure as a value; nothing is raised past the
/// dispatcher.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Name used in logs and dispatch results
    fn name(&self) -> &str;

    /// Render the subject and body for this channel from finding descriptions
    fn render(&self, lines: &[String]) -> Notification;

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError>;
}

/// How a relay channel hands the message off
#[derive(Debug, Clone)]
pub enum Transport {
    /// Write the message to the log
    Log,
    /// POST the message as JSON to a relay endpoint
    Webhook { url: String },
}

/// Email or SMS channel that hands messages to a transport
pub struct RelayChannel {
    kind: ChannelKind,
    recipient: String,
    transport: Transport,
    client: reqwest::Client,
    timeout: Duration,
}

pub const ALERT_SUBJECT: &str = "Control Tower Alert";

/// Upper bound on one webhook request, connect through response headers
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

impl RelayChannel {
    pub fn new(kind: ChannelKind, recipient: impl Into<String>, transport: Transport) -> Self {
        Self {
            kind,
            recipient: recipient.into(),
            transport,
            client: reqwest::Client::new(),
            timeout: DEFAULT_WEBHOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn email(recipient: impl Into<String>, transport: Transport) -> Self {
        Self::new(ChannelKind::Email, recipient, transport)
    }

    pub fn sms(recipient: impl Into<String>, transport: Transport) -> Self {
        Self::new(ChannelKind::Sms, recipient, transport)
    }

    /// Send webhook notification
    async fn send_webhook(&self, url: &str, notification: &Notification) -> Result<(), ChannelError> {
        let payload = serde_json::json!({
            "channel": self.kind.as_str(),
            "subject": notification.subject,
            "body": notification.body,
            "recipient": notification.recipient,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let request = self.client.post(url).json(&payload).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| {
                ChannelError::Webhook(format!(
                    "Webhook timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| ChannelError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(ChannelError::Webhook(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        tracing::debug!(
            channel = self.kind.as_str(),
            url = %url,
            "Webhook notification sent"
        );

        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for RelayChannel {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn render(&self, lines: &[String]) -> Notification {
        let body = match self.kind {
            ChannelKind::Email => lines.join("\n"),
            ChannelKind::Sms => format!("ALERT:\n{}", lines.join("\n")),
        };

        Notification {
            subject: ALERT_SUBJECT.to_string(),
            body,
            recipient: self.recipient.clone(),
        }
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        if notification.recipient.trim().is_empty() {
            return Err(ChannelError::Delivery("no recipient configured".to_string()));
        }

        match &self.transport {
            Transport::Log => {
                tracing::warn!(
                    channel = self.kind.as_str(),
                    recipient = %notification.recipient,
                    subject = %notification.subject,
                    "{}",
                    notification.body
                );
                Ok(())
            }
            Transport::Webhook { url } => self.send_webhook(url, notification).await,
        }
    }
}

/// Channel delivery errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Webhook error: {0}")]
    Webhook(String),
}
