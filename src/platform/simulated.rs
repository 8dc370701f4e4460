use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::monitor::{Channel, DeviceChannel};
use crate::error::{EnvmonError, Result};

/// Pseudo-random channel for running without hardware.
///
/// Produces a value on every tick (temperature 20-30 °C, humidity 40-80 %,
/// smoke 0-50 ppm) with 0.1 resolution. A fixed seed gives a reproducible
/// sequence.
pub struct SimulatedChannel {
    channel: Channel,
    rng: StdRng,
    open: bool,
}

impl SimulatedChannel {
    pub fn new(channel: Channel, seed: Option<u64>) -> Self {
        let rng = match seed {
            // Distinct stream per channel for the same seed
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(channel.order() as u64)),
            None => StdRng::from_entropy(),
        };
        Self {
            channel,
            rng,
            open: false,
        }
    }

    fn range(&self) -> (f64, u32) {
        match self.channel {
            Channel::Temperature => (20.0, 100),
            Channel::Humidity => (40.0, 400),
            Channel::Smoke => (0.0, 500),
        }
    }
}

impl DeviceChannel for SimulatedChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Result<f64> {
        if !self.open {
            return Err(EnvmonError::device_read(self.channel, "device not open"));
        }
        let (base, steps) = self.range();
        let step = self.rng.gen_range(0..steps);
        Ok(base + step as f64 / 10.0)
    }

    fn close(&mut self) {
        self.open = false;
    }
}
