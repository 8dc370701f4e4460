use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::core::monitor::{Channel, DeviceChannel, LinearCalibration};
use crate::error::{EnvmonError, Result};

/// Channel backed by a text file holding one integer raw code, such as an
/// IIO `in_voltage0_raw` attribute. The file is re-read from the start on
/// every sample.
pub struct SysfsChannel {
    channel: Channel,
    path: String,
    calibration: LinearCalibration,
    file: Option<File>,
}

impl SysfsChannel {
    pub fn new<S: Into<String>>(channel: Channel, path: S, calibration: LinearCalibration) -> Self {
        Self {
            channel,
            path: path.into(),
            calibration,
            file: None,
        }
    }
}

fn parse_raw(text: &str) -> std::result::Result<u32, String> {
    let trimmed = text.trim();
    trimmed
        .parse::<u32>()
        .map_err(|e| format!("invalid raw value {:?}: {}", trimmed, e))
}

impl DeviceChannel for SysfsChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .map_err(|e| EnvmonError::device_init(self.channel, format!("{}: {}", self.path, e)))?;
        self.file = Some(file);
        Ok(())
    }

    fn read(&mut self) -> Result<f64> {
        let channel = self.channel;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| EnvmonError::device_read(channel, "device not open"))?;

        let mut text = String::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_string(&mut text))
            .map_err(|e| EnvmonError::device_read(channel, e.to_string()))?;

        let raw = parse_raw(&text).map_err(|e| EnvmonError::device_read(channel, e))?;
        Ok(self.calibration.apply(raw))
    }

    fn close(&mut self) {
        self.file = None;
    }
}
