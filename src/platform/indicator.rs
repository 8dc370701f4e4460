use std::fs;

use crate::core::monitor::IndicatorOutput;
use crate::error::Result;

/// Alarm output driven through a sysfs attribute, e.g. an LED class
/// `brightness` file or a GPIO `value` file. Writes `1` to switch on and `0`
/// to switch off.
#[derive(Debug, Clone)]
pub struct SysfsIndicator {
    name: String,
    path: String,
}

impl SysfsIndicator {
    pub fn new<N: Into<String>, P: Into<String>>(name: N, path: P) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    fn write(&self, value: &str) -> Result<()> {
        fs::write(&self.path, value)?;
        Ok(())
    }
}

impl IndicatorOutput for SysfsIndicator {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self) -> Result<()> {
        self.write("1")
    }

    fn deactivate(&mut self) -> Result<()> {
        self.write("0")
    }
}
