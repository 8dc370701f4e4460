// Core business logic module

pub mod config;
pub mod monitor;

// Re-export commonly used items
pub use config::Config;
pub use monitor::{AcquisitionLoop, AlarmController, Reading, TimeSeriesWindow};
