//! Background acquisition loop.
//!
//! One dedicated thread owns every device channel. Callers on other threads
//! toggle sampling and request shutdown through lock-guarded accessors; the
//! loop observes those flags once per tick. Readings are published on a
//! broadcast channel (every tick, in order) and a watch channel (latest only).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Local;
use parking_lot::{Condvar, Mutex};
use tokio::sync::{broadcast, watch};

use super::device::DeviceChannel;
use super::reading::{Reading, SensorStatus, SystemStatus, SENTINEL_VALUE};
use crate::error::{EnvmonError, Result};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(2);
const READING_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle of the acquisition thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStatus {
    NotStarted,
    Starting,
    Running,
    /// Device initialization failed, or the thread died mid-run
    Failed(String),
    Stopped,
}

impl LoopStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopStatus::Failed(_) | LoopStatus::Stopped)
    }
}

/// Result of a `request_stop` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// `start` was never called
    NotStarted,
    /// The thread exited and released its devices before the call returned
    Clean,
    /// Another call already performed the shutdown
    AlreadyStopped,
    /// The thread did not exit within the shutdown timeout and was detached
    TimedOut,
}

/// Flags shared between the loop thread and its callers
struct CollectionState {
    collecting: bool,
    /// One-way: true until shutdown is requested
    running: bool,
    /// Set by the loop thread after its devices are closed
    exited: bool,
    status: LoopStatus,
}

struct Shared {
    state: Mutex<CollectionState>,
    wake: Condvar,
    ticks: AtomicU64,
}

impl Shared {
    fn mark_exited(&self) {
        self.state.lock().exited = true;
        self.wake.notify_all();
    }
}

/// Marks the thread as exited even if a device read panics
struct ExitGuard(Arc<Shared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("Acquisition thread panicked, no further readings");
            self.0.state.lock().status = LoopStatus::Failed("acquisition thread panicked".to_string());
        }
        self.0.mark_exited();
    }
}

/// Reading outputs. Owned by the loop thread once started, so subscribers see
/// the channels close when it exits.
struct Publishers {
    readings: broadcast::Sender<Reading>,
    latest: watch::Sender<Option<Reading>>,
}

/// Builder for [`AcquisitionLoop`]
pub struct AcquisitionLoopBuilder {
    channels: Vec<Box<dyn DeviceChannel>>,
    tick_interval: Duration,
    shutdown_timeout: Duration,
    startup_timeout: Duration,
}

impl AcquisitionLoopBuilder {
    pub fn channel(mut self, channel: Box<dyn DeviceChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channels(mut self, channels: Vec<Box<dyn DeviceChannel>>) -> Self {
        self.channels.extend(channels);
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn build(self) -> AcquisitionLoop {
        let mut channels = self.channels;
        // Fixed sampling order: temperature, humidity, smoke. Stable sort keeps
        // the first registration when a channel is given twice.
        channels.sort_by_key(|c| c.channel().order());
        let before = channels.len();
        channels.dedup_by_key(|c| c.channel());
        if channels.len() != before {
            log::warn!("Ignoring {} duplicate device channel(s)", before - channels.len());
        }

        let (readings_tx, readings_rx) = broadcast::channel(READING_CHANNEL_CAPACITY);
        let (latest_tx, latest_rx) = watch::channel(None);

        AcquisitionLoop {
            shared: Arc::new(Shared {
                state: Mutex::new(CollectionState {
                    collecting: false,
                    running: true,
                    exited: false,
                    status: LoopStatus::NotStarted,
                }),
                wake: Condvar::new(),
                ticks: AtomicU64::new(0),
            }),
            channels: Mutex::new(Some(channels)),
            handle: Mutex::new(None),
            publishers: Mutex::new(Some(Publishers {
                readings: readings_tx,
                latest: latest_tx,
            })),
            readings_rx,
            latest_rx,
            tick_interval: self.tick_interval,
            shutdown_timeout: self.shutdown_timeout,
            startup_timeout: self.startup_timeout,
        }
    }
}

/// Periodic sampler running on its own thread
pub struct AcquisitionLoop {
    shared: Arc<Shared>,
    channels: Mutex<Option<Vec<Box<dyn DeviceChannel>>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    publishers: Mutex<Option<Publishers>>,
    /// Never read; only cloned for new subscribers
    readings_rx: broadcast::Receiver<Reading>,
    latest_rx: watch::Receiver<Option<Reading>>,
    tick_interval: Duration,
    shutdown_timeout: Duration,
    startup_timeout: Duration,
}

impl AcquisitionLoop {
    pub fn builder() -> AcquisitionLoopBuilder {
        AcquisitionLoopBuilder {
            channels: Vec::new(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Loop with default timing over the given channels
    pub fn new(channels: Vec<Box<dyn DeviceChannel>>) -> Self {
        Self::builder().channels(channels).build()
    }

    /// Spawn the acquisition thread and wait for it to open every channel.
    ///
    /// On initialization failure the thread closes whatever it had opened,
    /// exits without sampling, and the loop status becomes
    /// [`LoopStatus::Failed`].
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if !state.running || state.status.is_terminal() {
                return Err(EnvmonError::LoopStopped);
            }
            if state.status != LoopStatus::NotStarted {
                return Err(EnvmonError::AlreadyStarted);
            }
            state.status = LoopStatus::Starting;
        }

        let channels = self.channels.lock().take().unwrap_or_default();
        let publishers = self.publishers.lock().take().ok_or(EnvmonError::AlreadyStarted)?;
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let worker = Worker {
            shared: Arc::clone(&self.shared),
            channels,
            publishers,
            tick_interval: self.tick_interval,
        };

        let spawned = thread::Builder::new()
            .name("sensor-acquisition".to_string())
            .spawn(move || worker.run(ready_tx));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                {
                    let mut state = self.shared.state.lock();
                    state.status = LoopStatus::Failed(e.to_string());
                    state.exited = true;
                }
                self.shared.wake.notify_all();
                return Err(e.into());
            }
        };
        *self.handle.lock() = Some(handle);

        match ready_rx.recv_timeout(self.startup_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Acquisition thread has not finished opening devices after {:?}",
                    self.startup_timeout
                );
                Err(EnvmonError::StartupTimeout(self.startup_timeout.as_millis() as u64))
            }
            Err(RecvTimeoutError::Disconnected) => Err(EnvmonError::other(
                "acquisition thread exited during startup",
            )),
        }
    }

    /// Enable sampling from the next tick on
    pub fn start_collection(&self) {
        self.shared.state.lock().collecting = true;
    }

    /// Disable sampling from the next tick on
    pub fn stop_collection(&self) {
        self.shared.state.lock().collecting = false;
    }

    pub fn is_collecting(&self) -> bool {
        self.shared.state.lock().collecting
    }

    pub fn status(&self) -> LoopStatus {
        self.shared.state.lock().status.clone()
    }

    /// Number of readings emitted so far
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }

    /// Receive every reading emitted from now on, in tick order. The
    /// receiver reports `Closed` once the loop thread has exited.
    pub fn subscribe(&self) -> broadcast::Receiver<Reading> {
        self.readings_rx.resubscribe()
    }

    /// Most recent reading, if any tick has sampled yet
    pub fn latest(&self) -> Option<Reading> {
        self.latest_rx.borrow().clone()
    }

    /// Stop the loop and wait for the thread to release its devices.
    ///
    /// Idempotent and safe before `start`. The wait is bounded by the
    /// shutdown timeout; past it the thread is detached and the shutdown is
    /// logged as abnormal.
    pub fn request_stop(&self) -> ShutdownOutcome {
        let deadline = Instant::now() + self.shutdown_timeout;
        let mut state = self.shared.state.lock();

        let first = state.running;
        state.running = false;
        state.collecting = false;

        if state.status == LoopStatus::NotStarted {
            state.status = LoopStatus::Stopped;
            self.publishers.lock().take();
            log::debug!("Acquisition loop stopped before it was started");
            return ShutdownOutcome::NotStarted;
        }

        self.shared.wake.notify_all();
        while !state.exited {
            if self
                .shared
                .wake
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        let exited = state.exited;
        if exited && !state.status.is_terminal() {
            state.status = LoopStatus::Stopped;
        }
        drop(state);

        if !first {
            return ShutdownOutcome::AlreadyStopped;
        }

        let handle = self.handle.lock().take();
        if !exited {
            log::error!(
                "Abnormal shutdown: acquisition thread did not exit within {:?}, detaching it",
                self.shutdown_timeout
            );
            drop(handle);
            return ShutdownOutcome::TimedOut;
        }

        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Acquisition thread panicked");
            }
        }
        log::info!("Acquisition loop shut down cleanly");
        ShutdownOutcome::Clean
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.request_stop();
    }
}

/// State moved into the acquisition thread
struct Worker {
    shared: Arc<Shared>,
    channels: Vec<Box<dyn DeviceChannel>>,
    publishers: Publishers,
    tick_interval: Duration,
}

impl Worker {
    fn run(mut self, ready: SyncSender<Result<()>>) {
        let _exit = ExitGuard(Arc::clone(&self.shared));

        if let Err(e) = self.open_all() {
            log::error!("Initialize failed: {}", e);
            self.shared.state.lock().status = LoopStatus::Failed(e.to_string());
            let _ = ready.send(Err(e));
            return;
        }

        {
            let mut state = self.shared.state.lock();
            if state.status == LoopStatus::Starting {
                state.status = LoopStatus::Running;
            }
        }
        let _ = ready.send(Ok(()));
        log::info!("Acquisition loop started with {} channel(s)", self.channels.len());

        loop {
            let collecting = {
                let state = self.shared.state.lock();
                if !state.running {
                    break;
                }
                state.collecting
            };

            if collecting {
                let reading = self.sample();
                self.shared.ticks.fetch_add(1, Ordering::AcqRel);
                self.publishers.latest.send_replace(Some(reading.clone()));
                // No subscribers is fine
                let _ = self.publishers.readings.send(reading);
            }

            self.wait_tick();
        }

        self.close_all();
        log::info!("Acquisition loop finished");
    }

    fn open_all(&mut self) -> Result<()> {
        for index in 0..self.channels.len() {
            if let Err(e) = self.channels[index].open() {
                for opened in self.channels[..index].iter_mut().rev() {
                    opened.close();
                }
                self.channels.clear();
                return Err(e);
            }
        }
        Ok(())
    }

    fn close_all(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.close();
        }
        self.channels.clear();
    }

    /// Read every channel once. A failed read yields the sentinel value for
    /// that channel on this tick only.
    fn sample(&mut self) -> Reading {
        let mut values = [None; 3];
        let mut status = SystemStatus::default();

        for device in self.channels.iter_mut() {
            let channel = device.channel();
            let value = match device.read() {
                Ok(value) => {
                    status.set(channel, SensorStatus::Normal);
                    value
                }
                Err(e) => {
                    log::warn!("{} (using {} for this tick)", e, SENTINEL_VALUE);
                    status.set(channel, SensorStatus::Error);
                    SENTINEL_VALUE
                }
            };
            values[channel.order()] = Some(value);
        }

        Reading {
            temperature: values[0].unwrap_or(SENTINEL_VALUE),
            humidity: values[1].unwrap_or(SENTINEL_VALUE),
            smoke: values[2],
            timestamp: Local::now(),
            status,
        }
    }

    /// Sleep one tick, waking early only when shutdown is requested
    fn wait_tick(&self) {
        let deadline = Instant::now() + self.tick_interval;
        let mut state = self.shared.state.lock();
        while state.running {
            if self
                .shared
                .wake
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
    }
}
