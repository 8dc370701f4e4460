//! Raw sensor code to physical value transforms.
//!
//! The coefficients are sensor-specific calibration data and live in the
//! configuration file rather than in code.

use serde::{Deserialize, Serialize};

use crate::error::{EnvmonError, Result};

/// Linear transform `raw & mask` × scale + offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearCalibration {
    pub mask: u32,
    pub scale: f64,
    pub offset: f64,
}

impl LinearCalibration {
    pub fn apply(&self, raw: u32) -> f64 {
        (raw & self.mask) as f64 * self.scale + self.offset
    }
}

/// Second-order transform c1 + c2·x + c3·x², clamped to [min, max]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolynomialCalibration {
    pub mask: u32,
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
    pub min: f64,
    pub max: f64,
}

impl PolynomialCalibration {
    pub fn apply(&self, raw: u32) -> f64 {
        let x = (raw & self.mask) as f64;
        let value = self.c1 + self.c2 * x + self.c3 * x * x;
        // Never panics, even on an inverted range
        value.max(self.min).min(self.max)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min >= self.max {
            return Err(EnvmonError::config(format!(
                "calibration range min ({}) must be below max ({})",
                self.min, self.max
            )));
        }
        if self.mask == 0 {
            return Err(EnvmonError::config("calibration mask must not be zero"));
        }
        Ok(())
    }
}

/// Calibration for every channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default = "default_temperature")]
    pub temperature: LinearCalibration,
    #[serde(default = "default_humidity")]
    pub humidity: PolynomialCalibration,
    #[serde(default = "default_smoke")]
    pub smoke: LinearCalibration,
}

impl Calibration {
    /// Reject ranges and masks that cannot produce a usable value
    pub fn validate(&self) -> Result<()> {
        self.humidity.validate()?;
        for (name, linear) in [("temperature", &self.temperature), ("smoke", &self.smoke)] {
            if linear.mask == 0 {
                return Err(EnvmonError::config(format!("{} calibration mask must not be zero", name)));
            }
            if !(linear.scale.is_finite() && linear.offset.is_finite()) {
                return Err(EnvmonError::config(format!("{} calibration must be finite", name)));
            }
        }
        Ok(())
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            humidity: default_humidity(),
            smoke: default_smoke(),
        }
    }
}

// SHT11: 14-bit temperature code, 0.01 °C per count, -40 °C offset
fn default_temperature() -> LinearCalibration {
    LinearCalibration {
        mask: 0x3fff,
        scale: 0.01,
        offset: -40.0,
    }
}

// SHT11: 12-bit relative humidity code
fn default_humidity() -> PolynomialCalibration {
    PolynomialCalibration {
        mask: 0xfff,
        c1: -0.40,
        c2: 0.0405,
        c3: -0.0000028,
        min: 0.1,
        max: 100.0,
    }
}

fn default_smoke() -> LinearCalibration {
    LinearCalibration {
        mask: u32::MAX,
        scale: 1.0,
        offset: 0.0,
    }
}
