use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::monitor::{Calibration, Channel, DeviceChannel};
use crate::error::{EnvmonError, Result};

#[cfg(target_os = "linux")]
use std::fs::File;

/// ioctl command selecting the quantity returned by the next read
#[cfg(target_os = "linux")]
const CMD_TEMPERATURE: u64 = 0;
#[cfg(target_os = "linux")]
const CMD_HUMIDITY: u64 = 1;

struct DeviceState {
    path: String,
    /// Channels currently holding the device open
    users: usize,
    #[cfg(target_os = "linux")]
    file: Option<File>,
}

/// An SHT11 sensor exposed as a single character device.
///
/// The driver multiplexes temperature and humidity over one node: an `ioctl`
/// selects the quantity, then a `read` returns the raw code as a native-endian
/// `u32`. Both channels share one descriptor, opened by the first channel and
/// closed by the last, and the select-then-read pair runs under one lock.
#[derive(Clone)]
pub struct Sht11Device {
    state: Arc<Mutex<DeviceState>>,
}

impl Sht11Device {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                path: path.into(),
                users: 0,
                #[cfg(target_os = "linux")]
                file: None,
            })),
        }
    }

    pub fn temperature(&self, calibration: Calibration) -> Sht11Channel {
        Sht11Channel::new(Channel::Temperature, self.clone(), calibration)
    }

    pub fn humidity(&self, calibration: Calibration) -> Sht11Channel {
        Sht11Channel::new(Channel::Humidity, self.clone(), calibration)
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().users > 0
    }

    fn acquire(&self, channel: Channel) -> Result<()> {
        let mut state = self.state.lock();
        if state.users == 0 {
            Self::open_node(&mut state, channel)?;
        }
        state.users += 1;
        Ok(())
    }

    fn release(&self, channel: Channel) {
        let mut state = self.state.lock();
        state.users = state.users.saturating_sub(1);
        if state.users == 0 {
            #[cfg(target_os = "linux")]
            state.file.take();
            log::debug!("Closed {} (last user {})", state.path, channel);
        }
    }

    #[cfg(target_os = "linux")]
    fn open_node(state: &mut DeviceState, channel: Channel) -> Result<()> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&state.path)
            .map_err(|e| EnvmonError::device_init(channel, format!("{}: {}", state.path, e)))?;
        state.file = Some(file);
        log::debug!("Opened {} (first user {})", state.path, channel);
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn open_node(state: &mut DeviceState, channel: Channel) -> Result<()> {
        Err(EnvmonError::device_init(
            channel,
            format!("{}: SHT11 devices are only supported on Linux", state.path),
        ))
    }

    #[cfg(target_os = "linux")]
    fn read_raw(&self, channel: Channel) -> Result<u32> {
        use std::io::Read;
        use std::os::unix::io::AsRawFd;

        let mut state = self.state.lock();
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| EnvmonError::device_read(channel, "device not open"))?;

        let command = match channel {
            Channel::Humidity => CMD_HUMIDITY,
            _ => CMD_TEMPERATURE,
        };
        // SAFETY: the descriptor belongs to `file`, which outlives the call,
        // and the driver's commands take no argument.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), command as _) };
        if rc < 0 {
            return Err(EnvmonError::device_read(
                channel,
                format!("ioctl failed: {}", std::io::Error::last_os_error()),
            ));
        }

        let mut buf = [0u8; 4];
        file.read_exact(&mut buf)
            .map_err(|e| EnvmonError::device_read(channel, e.to_string()))?;
        Ok(u32::from_ne_bytes(buf))
    }

    #[cfg(not(target_os = "linux"))]
    fn read_raw(&self, channel: Channel) -> Result<u32> {
        Err(EnvmonError::device_read(
            channel,
            "SHT11 devices are only supported on Linux",
        ))
    }
}

/// One quantity of a shared [`Sht11Device`]
pub struct Sht11Channel {
    channel: Channel,
    device: Sht11Device,
    calibration: Calibration,
    opened: bool,
}

impl Sht11Channel {
    fn new(channel: Channel, device: Sht11Device, calibration: Calibration) -> Self {
        Self {
            channel,
            device,
            calibration,
            opened: false,
        }
    }

    fn convert(&self, raw: u32) -> f64 {
        match self.channel {
            Channel::Humidity => self.calibration.humidity.apply(raw),
            _ => self.calibration.temperature.apply(raw),
        }
    }
}

impl DeviceChannel for Sht11Channel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn open(&mut self) -> Result<()> {
        if !self.opened {
            self.device.acquire(self.channel)?;
            self.opened = true;
        }
        Ok(())
    }

    fn read(&mut self) -> Result<f64> {
        if !self.opened {
            return Err(EnvmonError::device_read(self.channel, "device not open"));
        }
        let raw = self.device.read_raw(self.channel)?;
        Ok(self.convert(raw))
    }

    fn close(&mut self) {
        if self.opened {
            self.opened = false;
            self.device.release(self.channel);
        }
    }
}

impl Drop for Sht11Channel {
    fn drop(&mut self) {
        self.close();
    }
}
