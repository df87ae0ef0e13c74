use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;

/// Raw values returned by a sensor source, before they are timestamped
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorValues {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// Illuminance, lux
    pub light: f64,
}

impl SensorValues {
    pub fn new(temperature: f64, humidity: f64, light: f64) -> Self {
        Self {
            temperature,
            humidity,
            light,
        }
    }
}

/// One timestamped sample of temperature, humidity and light.
///
/// Readings are created once per monitoring cycle and never mutated afterwards.
/// Timestamps carry microsecond precision, the resolution the store keeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub light: f64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, values: SensorValues) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(6),
            temperature: values.temperature,
            humidity: values.humidity,
            light: values.light,
        }
    }

    /// Stamp sensor values with the current wall-clock time
    pub fn now(values: SensorValues) -> Self {
        Self::new(Utc::now(), values)
    }

    pub fn values(&self) -> SensorValues {
        SensorValues::new(self.temperature, self.humidity, self.light)
    }

    /// ISO-8601 timestamp with fixed microsecond precision.
    ///
    /// Fixed width keeps lexical order identical to chronological order, which the
    /// store relies on when sorting the text column.
    pub fn timestamp_text(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}
