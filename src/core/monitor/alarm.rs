//! Level-triggered alarm with a timed auto-clear.
//!
//! A single alarm is either active or inactive. Triggering arms a one-shot
//! timer thread; every trigger/stop bumps an epoch so that a timer from an
//! earlier activation can never clear (or keep alive) a newer one.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use parking_lot::{Condvar, Mutex};

use crate::error::Result;

pub const DEFAULT_ALARM_DURATION_SECS: u64 = 5;
const MIN_ALARM_DURATION_SECS: u64 = 1;

/// A binary alarm output (LED, buzzer, relay...)
pub trait IndicatorOutput: Send {
    fn name(&self) -> &str;
    fn activate(&mut self) -> Result<()>;
    fn deactivate(&mut self) -> Result<()>;
}

/// Output that only writes to the log
#[derive(Debug, Clone)]
pub struct LogIndicator {
    name: String,
}

impl LogIndicator {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl IndicatorOutput for LogIndicator {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&mut self) -> Result<()> {
        log::info!("{} on", self.name);
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        log::info!("{} off", self.name);
        Ok(())
    }
}

/// Why an alarm went back to inactive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClearReason {
    Manual,
    Expired,
    Shutdown,
}

struct AlarmState {
    active: bool,
    triggered_at: Option<DateTime<Local>>,
    deadline: Option<Instant>,
    duration: Duration,
    epoch: u64,
    outputs: Vec<Box<dyn IndicatorOutput>>,
    timer: Option<JoinHandle<()>>,
}

impl AlarmState {
    fn set_outputs(&mut self, on: bool) {
        for output in self.outputs.iter_mut() {
            let result = if on {
                output.activate()
            } else {
                output.deactivate()
            };
            match result {
                Ok(()) => log::debug!("{} {}", output.name(), if on { "activated" } else { "deactivated" }),
                Err(e) => log::warn!("Failed to switch {} {}: {}", output.name(), if on { "on" } else { "off" }, e),
            }
        }
    }

    fn clear(&mut self, reason: ClearReason) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.deadline = None;
        self.epoch = self.epoch.wrapping_add(1);
        self.set_outputs(false);
        log::info!("Alarm cleared ({:?})", reason);
        true
    }
}

struct Shared {
    state: Mutex<AlarmState>,
    wake: Condvar,
}

/// Single alarm channel with auto-clear
pub struct AlarmController {
    shared: Arc<Shared>,
}

impl AlarmController {
    /// Controller with log-only LED and buzzer outputs
    pub fn new() -> Self {
        Self::with_outputs(vec![
            Box::new(LogIndicator::new("LED")),
            Box::new(LogIndicator::new("Buzzer")),
        ])
    }

    pub fn with_outputs(outputs: Vec<Box<dyn IndicatorOutput>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(AlarmState {
                    active: false,
                    triggered_at: None,
                    deadline: None,
                    duration: Duration::from_secs(DEFAULT_ALARM_DURATION_SECS),
                    epoch: 0,
                    outputs,
                    timer: None,
                }),
                wake: Condvar::new(),
            }),
        }
    }

    /// Activate the alarm and arm the auto-clear timer.
    ///
    /// Returns `Ok(false)` when the alarm was already active; the running
    /// deadline is left untouched in that case.
    pub fn trigger_alarm(&self) -> Result<bool> {
        let mut state = self.shared.state.lock();
        if state.active {
            return Ok(false);
        }

        let duration = state.duration;
        let deadline = Instant::now() + duration;
        state.epoch = state.epoch.wrapping_add(1);
        let epoch = state.epoch;

        let weak = Arc::downgrade(&self.shared);
        let timer = thread::Builder::new()
            .name("alarm-timer".to_string())
            .spawn(move || run_timer(weak, epoch, deadline))?;

        state.active = true;
        state.triggered_at = Some(Local::now());
        state.deadline = Some(deadline);
        state.set_outputs(true);
        // The previous timer has already seen its epoch change and exits on its own
        state.timer = Some(timer);
        log::info!("Alarm triggered, auto-clear in {}s", duration.as_secs());
        Ok(true)
    }

    /// Deactivate the alarm and cancel the pending timer. Returns `false`
    /// when the alarm was not active.
    pub fn stop_alarm(&self) -> bool {
        self.clear(ClearReason::Manual)
    }

    fn clear(&self, reason: ClearReason) -> bool {
        let cleared = self.shared.state.lock().clear(reason);
        if cleared {
            self.shared.wake.notify_all();
        }
        cleared
    }

    pub fn is_alarming(&self) -> bool {
        self.shared.state.lock().active
    }

    /// Set the auto-clear duration for future activations (minimum 1 second)
    pub fn set_alarm_duration(&self, seconds: u64) {
        let seconds = seconds.max(MIN_ALARM_DURATION_SECS);
        self.shared.state.lock().duration = Duration::from_secs(seconds);
    }

    pub fn alarm_duration(&self) -> Duration {
        self.shared.state.lock().duration
    }

    /// When the current (or last) activation started
    pub fn triggered_at(&self) -> Option<DateTime<Local>> {
        self.shared.state.lock().triggered_at
    }

    /// Time left before auto-clear, `None` when inactive
    pub fn remaining(&self) -> Option<Duration> {
        let state = self.shared.state.lock();
        state
            .deadline
            .filter(|_| state.active)
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.shared.state.lock().deadline
    }
}

impl Default for AlarmController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AlarmController {
    fn drop(&mut self) {
        self.clear(ClearReason::Shutdown);
        let timer = self.shared.state.lock().timer.take();
        if let Some(timer) = timer {
            if timer.join().is_err() {
                log::error!("Alarm timer thread panicked");
            }
        }
    }
}

fn run_timer(shared: Weak<Shared>, epoch: u64, deadline: Instant) {
    let Some(shared) = shared.upgrade() else {
        return;
    };

    let mut state = shared.state.lock();
    loop {
        if state.epoch != epoch || !state.active {
            return;
        }
        if Instant::now() >= deadline {
            break;
        }
        shared.wake.wait_until(&mut state, deadline);
    }
    state.clear(ClearReason::Expired);
}
