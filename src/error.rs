use std::io;
use thiserror::Error;

use crate::core::monitor::Channel;

/// Custom error type for envmon
#[derive(Error, Debug)]
pub enum EnvmonError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to initialize {channel} channel: {reason}")]
    DeviceInit { channel: Channel, reason: String },

    #[error("Failed to read {channel} channel: {reason}")]
    DeviceRead { channel: Channel, reason: String },

    #[error("Acquisition loop already started")]
    AlreadyStarted,

    #[error("Acquisition loop has been stopped")]
    LoopStopped,

    #[error("Acquisition loop did not report startup within {0} ms")]
    StartupTimeout(u64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for envmon
pub type Result<T> = std::result::Result<T, EnvmonError>;

impl EnvmonError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        EnvmonError::Config(msg.into())
    }

    /// Create a device initialization error
    pub fn device_init<S: Into<String>>(channel: Channel, reason: S) -> Self {
        EnvmonError::DeviceInit {
            channel,
            reason: reason.into(),
        }
    }

    /// Create a per-read device error
    pub fn device_read<S: Into<String>>(channel: Channel, reason: S) -> Self {
        EnvmonError::DeviceRead {
            channel,
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        EnvmonError::Storage(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        EnvmonError::Other(msg.into())
    }
}
