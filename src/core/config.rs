use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::monitor::{AlarmThresholds, Calibration, DEFAULT_WINDOW_CAPACITY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Samples kept per channel for live plots
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    #[serde(default)]
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub thresholds: AlarmThresholds,
    /// SQLite file receiving every reading (None = platform data dir)
    #[serde(default)]
    pub database_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceBackend {
    /// Pseudo-random values, no hardware needed
    #[default]
    Simulated,
    /// SHT11 temperature/humidity character device
    Sht11,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub backend: DeviceBackend,
    pub sht11_path: String,
    /// Numeric sysfs/IIO file for the optional smoke sensor
    pub smoke_path: Option<String>,
    /// Seed for the simulated backend (random when unset)
    pub seed: Option<u64>,
    /// Simulate a smoke channel as well
    pub simulate_smoke: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: DeviceBackend::Simulated,
            sht11_path: "/dev/sht11".to_string(),
            smoke_path: None,
            seed: None,
            simulate_smoke: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub tick_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub startup_timeout_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            shutdown_timeout_ms: 5000,
            startup_timeout_ms: 2000,
        }
    }
}

impl SamplingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    pub duration_secs: u64,
    /// sysfs file driving the visual indicator (log only when unset)
    pub led_path: Option<String>,
    /// sysfs file driving the audible indicator (log only when unset)
    pub buzzer_path: Option<String>,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            duration_secs: 5,
            led_path: None,
            buzzer_path: None,
        }
    }
}

fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            calibration: Calibration::default(),
            sampling: SamplingConfig::default(),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            alarm: AlarmConfig::default(),
            thresholds: AlarmThresholds::default(),
            database_path: None,
        }
    }
}

impl Config {
    /// Load the user config, falling back to defaults when missing
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let data = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // An empty file means defaults; anything else must parse, so a typo
        // never silently switches the monitor to simulated sensors
        if data.trim().is_empty() {
            return Ok(Config::default());
        }

        let config = serde_json::from_str(&data).with_context(|| {
            format!(
                "Failed to parse config file {:?} (fix it or run 'envmon config reset')",
                config_path
            )
        })?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("envmon").join("config.json"))
    }

    /// Database file, defaulting to the platform data directory
    pub fn get_database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(PathBuf::from(path));
        }

        let data_dir = dirs::data_dir().with_context(|| "Could not determine data directory")?;
        Ok(data_dir.join("envmon").join("sensor_data.db"))
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.calibration.validate()?;
        if self.window_capacity == 0 {
            anyhow::bail!("window_capacity must be at least 1");
        }
        Ok(())
    }
}
