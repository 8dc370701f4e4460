use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One physical quantity measured by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Temperature,
    Humidity,
    Smoke,
}

impl Channel {
    /// Sampling order used by the acquisition loop
    pub const ALL: [Channel; 3] = [Channel::Temperature, Channel::Humidity, Channel::Smoke];

    pub fn unit(&self) -> &'static str {
        match self {
            Channel::Temperature => "°C",
            Channel::Humidity => "%",
            Channel::Smoke => "ppm",
        }
    }

    /// Physical domain of the quantity as (lower, upper) limits
    pub fn domain(&self) -> (Option<f64>, Option<f64>) {
        match self {
            Channel::Temperature => (None, None),
            Channel::Humidity => (Some(0.0), Some(100.0)),
            Channel::Smoke => (Some(0.0), None),
        }
    }

    /// Position of the channel in the fixed sampling order
    pub fn order(&self) -> usize {
        match self {
            Channel::Temperature => 0,
            Channel::Humidity => 1,
            Channel::Smoke => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Smoke => "smoke",
        };
        f.write_str(name)
    }
}

/// Health of a single channel for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    #[default]
    Normal,
    /// No device is configured for the channel
    Offline,
    /// The read failed and the value is a sentinel
    Error,
}

/// Per-channel status attached to every reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub temperature: SensorStatus,
    pub humidity: SensorStatus,
    pub smoke: SensorStatus,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            temperature: SensorStatus::Offline,
            humidity: SensorStatus::Offline,
            smoke: SensorStatus::Offline,
        }
    }
}

impl SystemStatus {
    pub fn get(&self, channel: Channel) -> SensorStatus {
        match channel {
            Channel::Temperature => self.temperature,
            Channel::Humidity => self.humidity,
            Channel::Smoke => self.smoke,
        }
    }

    pub fn set(&mut self, channel: Channel, status: SensorStatus) {
        match channel {
            Channel::Temperature => self.temperature = status,
            Channel::Humidity => self.humidity = status,
            Channel::Smoke => self.smoke = status,
        }
    }
}

/// Value substituted for a channel whose read failed on a tick
pub const SENTINEL_VALUE: f64 = 0.0;

/// Immutable result of one sampling tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
    /// Present only when a smoke channel is configured
    pub smoke: Option<f64>,
    pub timestamp: DateTime<Local>,
    pub status: SystemStatus,
}

impl Reading {
    pub fn new(temperature: f64, humidity: f64, smoke: Option<f64>) -> Self {
        let status = SystemStatus {
            temperature: SensorStatus::Normal,
            humidity: SensorStatus::Normal,
            smoke: if smoke.is_some() {
                SensorStatus::Normal
            } else {
                SensorStatus::Offline
            },
        };
        Self {
            temperature,
            humidity,
            smoke,
            timestamp: Local::now(),
            status,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_status(mut self, status: SystemStatus) -> Self {
        self.status = status;
        self
    }

    /// Value of one channel, `None` when that channel is not configured
    pub fn value(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Temperature => Some(self.temperature),
            Channel::Humidity => Some(self.humidity),
            Channel::Smoke => self.smoke,
        }
    }

    /// True when the channel produced a real measurement on this tick
    pub fn is_valid(&self, channel: Channel) -> bool {
        self.status.get(channel) == SensorStatus::Normal && self.value(channel).is_some()
    }

    pub fn faulted_channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|&c| self.status.get(c) == SensorStatus::Error)
            .collect()
    }

    /// Project the reading onto one channel
    pub fn sample(&self, channel: Channel) -> Option<ChannelSample> {
        self.value(channel).map(|value| ChannelSample {
            value,
            timestamp: self.timestamp,
        })
    }
}

/// The unit stored in a time-series window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSample {
    pub value: f64,
    pub timestamp: DateTime<Local>,
}

impl ChannelSample {
    pub fn new(value: f64, timestamp: DateTime<Local>) -> Self {
        Self { value, timestamp }
    }
}
