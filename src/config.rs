//! Process configuration
//!
//! Everything is read from `CONTROL_TOWER_*` environment variables (a `.env` file is
//! loaded first by the binary). Values are parsed once at startup and passed by value
//! into the components that need them.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::alerts::{AlertSettings, Thresholds, Transport, DEFAULT_WEBHOOK_TIMEOUT};

const PREFIX: &str = "CONTROL_TOWER_";

/// Outbound channel configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub recipient: String,
    /// Relay endpoint; `None` writes the alert to the log
    pub webhook: Option<String>,
}

impl ChannelConfig {
    pub fn transport(&self) -> Transport {
        match &self.webhook {
            Some(url) => Transport::Webhook { url: url.clone() },
            None => Transport::Log,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub interval: Duration,
    pub thresholds: Thresholds,
    pub alerts: AlertSettings,
    pub email: Option<ChannelConfig>,
    pub sms: Option<ChannelConfig>,
    /// Bound on each webhook delivery
    pub webhook_timeout: Duration,
    pub dashboard_host: String,
    pub dashboard_port: u16,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("sensor_data.db"),
            interval: Duration::from_secs(5),
            thresholds: Thresholds::default(),
            alerts: AlertSettings::default(),
            email: None,
            sms: None,
            webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT,
            dashboard_host: "127.0.0.1".to_string(),
            dashboard_port: 8080,
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Build from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Keys are full variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let thresholds = Thresholds {
            temperature_min: parse_or(&get, "TEMP_MIN", defaults.thresholds.temperature_min)?,
            temperature_max: parse_or(&get, "TEMP_MAX", defaults.thresholds.temperature_max)?,
            humidity_min: parse_or(&get, "HUMIDITY_MIN", defaults.thresholds.humidity_min)?,
            humidity_max: parse_or(&get, "HUMIDITY_MAX", defaults.thresholds.humidity_max)?,
            light_min: parse_or(&get, "LIGHT_MIN", defaults.thresholds.light_min)?,
        };

        let alerts = AlertSettings {
            enabled: parse_bool_or(&get, "ALERTS_ENABLED", defaults.alerts.enabled)?,
            cooldown: Duration::from_secs(parse_or(
                &get,
                "ALERT_COOLDOWN_SECS",
                defaults.alerts.cooldown.as_secs(),
            )?),
        };

        let email = get("EMAIL_TO").map(|recipient| ChannelConfig {
            recipient,
            webhook: get("EMAIL_WEBHOOK"),
        });
        let sms = get("SMS_TO").map(|recipient| ChannelConfig {
            recipient,
            webhook: get("SMS_WEBHOOK"),
        });

        let interval_secs: f64 = parse_or(&get, "INTERVAL_SECS", defaults.interval.as_secs_f64())?;
        let interval = Duration::try_from_secs_f64(interval_secs).map_err(|_| ConfigError::Parse {
            key: format!("{}INTERVAL_SECS", PREFIX),
            value: interval_secs.to_string(),
        })?;

        let timeout_secs: f64 = parse_or(
            &get,
            "WEBHOOK_TIMEOUT_SECS",
            defaults.webhook_timeout.as_secs_f64(),
        )?;
        let webhook_timeout =
            Duration::try_from_secs_f64(timeout_secs).map_err(|_| ConfigError::Parse {
                key: format!("{}WEBHOOK_TIMEOUT_SECS", PREFIX),
                value: timeout_secs.to_string(),
            })?;

        Ok(Self {
            db_path: get("DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            interval,
            thresholds,
            alerts,
            email,
            sms,
            webhook_timeout,
            dashboard_host: get("DASHBOARD_HOST").unwrap_or(defaults.dashboard_host),
            dashboard_port: parse_or(&get, "DASHBOARD_PORT", defaults.dashboard_port)?,
            log_file: get("LOG_FILE").map(PathBuf::from),
        })
    }

    /// Check the configuration for values the loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = match self.thresholds.validate() {
            Ok(()) => Vec::new(),
            Err(problems) => problems,
        };

        if self.interval.is_zero() {
            problems.push("interval must be greater than zero".to_string());
        }
        if self.webhook_timeout.is_zero() {
            problems.push("webhook timeout must be greater than zero".to_string());
        }
        for (name, channel) in [("email", &self.email), ("sms", &self.sms)] {
            if let Some(ChannelConfig {
                webhook: Some(url), ..
            }) = channel
            {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    problems.push(format!("{} webhook '{}' is not an http(s) URL", name, url));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }
}

fn parse_or<G, T>(get: &G, name: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Parse {
            key: format!("{}{}", PREFIX, name),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, name: &str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Parse {
                key: format!("{}{}", PREFIX, name),
                value: raw,
            }),
        },
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot parse {key}={value:?}")]
    Parse { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
