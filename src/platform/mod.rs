//! Platform-specific device code.
//!
//! Provides the concrete sensor channels and alarm outputs, and builds them
//! from the user configuration.

pub mod indicator;
pub mod sht11;
pub mod simulated;
pub mod sysfs;

pub use indicator::SysfsIndicator;
pub use sht11::{Sht11Channel, Sht11Device};
pub use simulated::SimulatedChannel;
pub use sysfs::SysfsChannel;

use crate::core::config::{AlarmConfig, Config, DeviceBackend};
use crate::core::monitor::{Channel, DeviceChannel, IndicatorOutput, LogIndicator};

/// Build the device channels described by the configuration
///
/// Temperature and humidity always come from the selected backend. Smoke comes
/// from `smoke_path` when set, otherwise from the simulator when the backend is
/// simulated and `simulate_smoke` is on.
pub fn build_channels(config: &Config) -> Vec<Box<dyn DeviceChannel>> {
    let device = &config.device;
    let mut channels: Vec<Box<dyn DeviceChannel>> = Vec::with_capacity(3);

    match device.backend {
        DeviceBackend::Simulated => {
            channels.push(Box::new(SimulatedChannel::new(Channel::Temperature, device.seed)));
            channels.push(Box::new(SimulatedChannel::new(Channel::Humidity, device.seed)));
        }
        DeviceBackend::Sht11 => {
            // One device node serves both quantities
            let sht11 = Sht11Device::new(device.sht11_path.clone());
            channels.push(Box::new(sht11.temperature(config.calibration)));
            channels.push(Box::new(sht11.humidity(config.calibration)));
        }
    }

    if let Some(path) = &device.smoke_path {
        channels.push(Box::new(SysfsChannel::new(
            Channel::Smoke,
            path.clone(),
            config.calibration.smoke,
        )));
    } else if device.backend == DeviceBackend::Simulated && device.simulate_smoke {
        channels.push(Box::new(SimulatedChannel::new(Channel::Smoke, device.seed)));
    }

    channels
}

/// Build the visual and audible alarm outputs
pub fn build_indicators(alarm: &AlarmConfig) -> Vec<Box<dyn IndicatorOutput>> {
    let mut outputs: Vec<Box<dyn IndicatorOutput>> = Vec::with_capacity(2);

    match &alarm.led_path {
        Some(path) => outputs.push(Box::new(SysfsIndicator::new("LED", path.clone()))),
        None => outputs.push(Box::new(LogIndicator::new("LED"))),
    }
    match &alarm.buzzer_path {
        Some(path) => outputs.push(Box::new(SysfsIndicator::new("Buzzer", path.clone()))),
        None => outputs.push(Box::new(LogIndicator::new("Buzzer"))),
    }

    outputs
}
