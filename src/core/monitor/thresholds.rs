//! Threshold evaluation for readings.
//!
//! Compares a reading against static limits and reports every breach. Whether
//! a breach triggers the alarm is decided by the caller.

use serde::{Deserialize, Serialize};

use super::reading::{Channel, Reading, SensorStatus};
use crate::error::{EnvmonError, Result};

/// Static min/max limits per physical quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmThresholds {
    pub min_temperature: f64, // °C
    pub max_temperature: f64, // °C
    pub min_humidity: f64,    // %
    pub max_humidity: f64,    // %
    pub max_smoke: f64,       // ppm
}

impl Default for AlarmThresholds {
    fn default() -> Self {
        Self {
            min_temperature: 10.0,
            max_temperature: 35.0,
            min_humidity: 20.0,
            max_humidity: 80.0,
            max_smoke: 300.0,
        }
    }
}

impl AlarmThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.min_temperature >= self.max_temperature {
            return Err(EnvmonError::config(format!(
                "min_temperature ({}) must be below max_temperature ({})",
                self.min_temperature, self.max_temperature
            )));
        }
        if self.min_humidity >= self.max_humidity {
            return Err(EnvmonError::config(format!(
                "min_humidity ({}) must be below max_humidity ({})",
                self.min_humidity, self.max_humidity
            )));
        }
        if self.max_smoke < 0.0 {
            return Err(EnvmonError::config("max_smoke must not be negative"));
        }
        Ok(())
    }

    fn limits(&self, channel: Channel) -> (Option<f64>, Option<f64>) {
        match channel {
            Channel::Temperature => (Some(self.min_temperature), Some(self.max_temperature)),
            Channel::Humidity => (Some(self.min_humidity), Some(self.max_humidity)),
            Channel::Smoke => (None, Some(self.max_smoke)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreachKind {
    Above,
    Below,
    /// The channel could not be read on this tick
    SensorFault,
}

/// A single limit violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breach {
    pub channel: Channel,
    pub kind: BreachKind,
    pub value: f64,
    pub limit: f64,
    pub message: String,
}

/// Evaluate a reading and list every breach
pub fn evaluate(reading: &Reading, thresholds: &AlarmThresholds) -> Vec<Breach> {
    let mut breaches = Vec::new();

    for channel in Channel::ALL {
        let Some(value) = reading.value(channel) else {
            continue;
        };

        match reading.status.get(channel) {
            SensorStatus::Offline => continue,
            SensorStatus::Error => {
                breaches.push(Breach {
                    channel,
                    kind: BreachKind::SensorFault,
                    value,
                    limit: 0.0,
                    message: format!("{} sensor read failed", channel),
                });
                continue;
            }
            SensorStatus::Normal => {}
        }

        let (min, max) = thresholds.limits(channel);
        if let Some(max) = max.filter(|&m| value > m) {
            breaches.push(Breach {
                channel,
                kind: BreachKind::Above,
                value,
                limit: max,
                message: format!(
                    "{} at {:.1}{} (max: {:.1}{})",
                    channel,
                    value,
                    channel.unit(),
                    max,
                    channel.unit()
                ),
            });
        } else if let Some(min) = min.filter(|&m| value < m) {
            breaches.push(Breach {
                channel,
                kind: BreachKind::Below,
                value,
                limit: min,
                message: format!(
                    "{} at {:.1}{} (min: {:.1}{})",
                    channel,
                    value,
                    channel.unit(),
                    min,
                    channel.unit()
                ),
            });
        }
    }

    breaches
}
