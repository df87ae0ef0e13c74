//! Alert configuration types

use serde::{Serialize, Serializer};
use std::time::Duration;

/// Safe operating bounds for each metric.
///
/// Built once at startup and shared read-only with the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// Minimum safe temperature, °C
    pub temperature_min: f64,
    /// Maximum safe temperature, °C
    pub temperature_max: f64,
    /// Minimum acceptable humidity, %
    pub humidity_min: f64,
    /// Maximum acceptable humidity, %
    pub humidity_max: f64,
    /// Minimum required light level, lux. There is no upper bound.
    pub light_min: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature_min: 15.0,
            temperature_max: 35.0,
            humidity_min: 30.0,
            humidity_max: 70.0,
            light_min: 70.0,
        }
    }
}

impl Thresholds {
    /// Check that every bound is finite and every range is non-empty
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        let bounds = [
            ("temperature_min", self.temperature_min),
            ("temperature_max", self.temperature_max),
            ("humidity_min", self.humidity_min),
            ("humidity_max", self.humidity_max),
            ("light_min", self.light_min),
        ];
        for (name, value) in bounds {
            if !value.is_finite() {
                problems.push(format!("{} must be a finite number, got {}", name, value));
            }
        }

        if self.temperature_min > self.temperature_max {
            problems.push(format!(
                "temperature_min {} exceeds temperature_max {}",
                self.temperature_min, self.temperature_max
            ));
        }
        if self.humidity_min > self.humidity_max {
            problems.push(format!(
                "humidity_min {} exceeds humidity_max {}",
                self.humidity_min, self.humidity_max
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// Dispatcher settings
#[derive(Debug, Clone, Serialize)]
pub struct AlertSettings {
    /// Master switch for outbound alerts
    pub enabled: bool,
    /// Minimum time between repeated alerts for the same findings
    #[serde(rename = "cooldown_secs", serialize_with = "as_secs")]
    pub cooldown: Duration,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown: Duration::from_secs(300),
        }
    }
}

impl AlertSettings {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
