// Test doubles shared by the integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use envmon::core::monitor::{Channel, DeviceChannel};
use envmon::{EnvmonError, Result};
use parking_lot::Mutex;

/// Counts every call made on a [`ScriptedChannel`]
#[derive(Default)]
pub struct Calls {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub reads: AtomicUsize,
}

impl Calls {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Device double that returns `value`, optionally failing to open, failing
/// selected reads (0-based read index) or panicking on a read.
pub struct ScriptedChannel {
    channel: Channel,
    value: f64,
    fail_open: bool,
    failing_reads: Vec<usize>,
    read_delay: Option<Duration>,
    order_log: Option<Arc<Mutex<Vec<Channel>>>>,
    panic_on_read: Option<usize>,
    calls: Arc<Calls>,
}

impl ScriptedChannel {
    pub fn new(channel: Channel, value: f64) -> Self {
        Self {
            channel,
            value,
            fail_open: false,
            failing_reads: Vec::new(),
            read_delay: None,
            order_log: None,
            panic_on_read: None,
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_reads(mut self, reads: &[usize]) -> Self {
        self.failing_reads = reads.to_vec();
        self
    }

    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn panicking_read(mut self, index: usize) -> Self {
        self.panic_on_read = Some(index);
        self
    }

    pub fn order_log(mut self, log: Arc<Mutex<Vec<Channel>>>) -> Self {
        self.order_log = Some(log);
        self
    }

    pub fn calls(&self) -> Arc<Calls> {
        Arc::clone(&self.calls)
    }

    pub fn boxed(self) -> Box<dyn DeviceChannel> {
        Box::new(self)
    }
}

impl DeviceChannel for ScriptedChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn open(&mut self) -> Result<()> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(EnvmonError::device_init(self.channel, "no such device"));
        }
        Ok(())
    }

    fn read(&mut self) -> Result<f64> {
        let index = self.calls.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.order_log {
            log.lock().push(self.channel);
        }
        if let Some(delay) = self.read_delay {
            thread::sleep(delay);
        }
        if self.panic_on_read == Some(index) {
            panic!("{} driver crashed", self.channel);
        }
        if self.failing_reads.contains(&index) {
            return Err(EnvmonError::device_read(self.channel, "checksum mismatch"));
        }
        Ok(self.value)
    }

    fn close(&mut self) {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
