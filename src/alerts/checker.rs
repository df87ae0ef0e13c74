//! Threshold evaluation

use serde::Serialize;
use std::fmt;

use super::config::Thresholds;
use crate::data::Reading;

/// Monitored quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Temperature,
    Humidity,
    Light,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Light => "light",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single threshold violation derived from a reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub metric: Metric,
    /// Observed value that violated the threshold
    pub value: f64,
    pub description: String,
}

impl Finding {
    fn new(metric: Metric, value: f64, description: String) -> Self {
        Self {
            metric,
            value,
            description,
        }
    }
}

/// Evaluate a reading against the thresholds.
///
/// Each metric is checked independently and findings always come back in the order
/// temperature, humidity, light.
pub fn evaluate(reading: &Reading, thresholds: &Thresholds) -> Vec<Finding> {
    let mut findings = Vec::with_capacity(3);

    if reading.temperature < thresholds.temperature_min
        || reading.temperature > thresholds.temperature_max
    {
        findings.push(Finding::new(
            Metric::Temperature,
            reading.temperature,
            format!("Temperature out of range: {}°C", reading.temperature),
        ));
    }

    if reading.humidity < thresholds.humidity_min || reading.humidity > thresholds.humidity_max {
        findings.push(Finding::new(
            Metric::Humidity,
            reading.humidity,
            format!("Humidity out of range: {}%", reading.humidity),
        ));
    }

    if reading.light < thresholds.light_min {
        findings.push(Finding::new(
            Metric::Light,
            reading.light,
            format!("Low light level: {} lux", reading.light),
        ));
    }

    findings
}
