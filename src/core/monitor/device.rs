use super::reading::Channel;
use crate::error::Result;

/// Trait for a single sensor endpoint
///
/// This trait abstracts the hardware behind one channel (SHT11 character device,
/// sysfs/IIO files, simulated data). Implementations are provided in the
/// platform layer. A channel is moved into the acquisition thread and is only
/// ever touched from there.
pub trait DeviceChannel: Send {
    /// Quantity measured by this endpoint
    fn channel(&self) -> Channel;

    /// Acquire the underlying device handle
    fn open(&mut self) -> Result<()>;

    /// Read one physical value (already converted from the raw sensor code)
    fn read(&mut self) -> Result<f64>;

    /// Release the device handle. Called exactly once, by the acquisition
    /// thread, after the last read.
    fn close(&mut self);
}
