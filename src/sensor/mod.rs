//! Sensor sources
//!
//! The monitoring loop only needs a single synchronous "read current values" call.
//! Real drivers live outside this crate; a simulated source and a fixed fixture are
//! provided for running without hardware and for exercising the alert path.

use rand::Rng;

use crate::data::SensorValues;

/// Source of current sensor values
pub trait SensorSource: Send + Sync {
    /// Read the current temperature, humidity and light values
    fn read(&self) -> Result<SensorValues, SensorError>;

    /// Short name used in log output
    fn name(&self) -> &str;
}

/// Simulated sensor producing uniformly random values
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    temperature: (f64, f64),
    humidity: (f64, f64),
    light: (f64, f64),
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self {
            temperature: (10.0, 40.0),
            humidity: (20.0, 90.0),
            light: (30.0, 100.0),
        }
    }

    fn sample(range: (f64, f64)) -> f64 {
        let value = rand::thread_rng().gen_range(range.0..=range.1);
        (value * 100.0).round() / 100.0
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for SimulatedSensor {
    fn read(&self) -> Result<SensorValues, SensorError> {
        Ok(SensorValues::new(
            Self::sample(self.temperature),
            Self::sample(self.humidity),
            Self::sample(self.light),
        ))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// Sensor that always returns the same values
#[derive(Debug, Clone)]
pub struct FixtureSensor {
    values: SensorValues,
}

impl FixtureSensor {
    pub fn new(values: SensorValues) -> Self {
        Self { values }
    }

    /// Out-of-range values that violate every default threshold
    pub fn alert_test() -> Self {
        Self::new(SensorValues::new(48.5, 85.0, 30.0))
    }
}

impl SensorSource for FixtureSensor {
    fn read(&self) -> Result<SensorValues, SensorError> {
        Ok(self.values)
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

/// Sensor errors
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),
}
