//! Sensor monitoring core functionality.
//!
//! This module provides the acquisition loop that samples the device
//! channels, the rolling per-channel history used for live plots, and the
//! timed alarm controller.

pub mod acquisition;
pub mod alarm;
pub mod calibration;
mod device;
mod reading;
pub mod thresholds;
pub mod timeseries;

pub use acquisition::{AcquisitionLoop, AcquisitionLoopBuilder, LoopStatus, ShutdownOutcome};
pub use alarm::{AlarmController, IndicatorOutput, LogIndicator};
pub use calibration::{Calibration, LinearCalibration, PolynomialCalibration};
pub use device::DeviceChannel;
pub use reading::{
    Channel, ChannelSample, Reading, SensorStatus, SystemStatus, SENTINEL_VALUE,
};
pub use thresholds::{evaluate, AlarmThresholds, Breach, BreachKind};
pub use timeseries::{Bounds, SharedWindow, TimeSeriesWindow, WindowSet, DEFAULT_WINDOW_CAPACITY};
