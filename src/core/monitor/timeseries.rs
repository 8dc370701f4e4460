//! Bounded rolling history per channel, with display-scale bounds.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::reading::{Channel, ChannelSample, Reading};

pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

/// Minimum width of the data range used for the margin computation
const MIN_RANGE: f64 = 1.0;
/// Range floor relative to the largest magnitude, so huge values still
/// produce distinct bounds after rounding
const MIN_RELATIVE_RANGE: f64 = 1e-9;
const MARGIN_RATIO: f64 = 0.1;
const DEFAULT_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: 100.0,
};

/// Display bounds of a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

impl Default for Bounds {
    fn default() -> Self {
        DEFAULT_BOUNDS
    }
}

/// FIFO window of the most recent samples of one channel
#[derive(Debug, Clone)]
pub struct TimeSeriesWindow {
    channel: Channel,
    capacity: usize,
    samples: VecDeque<ChannelSample>,
    bounds: Bounds,
}

impl TimeSeriesWindow {
    pub fn new(channel: Channel) -> Self {
        Self::with_capacity(channel, DEFAULT_WINDOW_CAPACITY)
    }

    pub fn with_capacity(channel: Channel, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channel,
            capacity,
            samples: VecDeque::with_capacity(capacity),
            bounds: DEFAULT_BOUNDS,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn latest(&self) -> Option<&ChannelSample> {
        self.samples.back()
    }

    /// Insert at the tail, evicting the oldest sample when over capacity
    pub fn append(&mut self, sample: ChannelSample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.compute_bounds();
    }

    /// Empty the window and go back to the default display range
    pub fn clear(&mut self) {
        self.samples.clear();
        self.bounds = DEFAULT_BOUNDS;
    }

    /// Recompute the display bounds over the whole window.
    ///
    /// Values are clamped to the channel's physical domain, the range is
    /// floored at 1.0 (or a tiny fraction of the magnitude for huge values)
    /// and padded by 10% on each side, then the bounds are clamped to the
    /// domain again. An empty window (or one holding only
    /// non-finite values) keeps the previous bounds.
    pub fn compute_bounds(&mut self) -> Bounds {
        let (lower, upper) = self.channel.domain();
        let clamp = |v: f64| {
            let v = lower.map_or(v, |lo| v.max(lo));
            upper.map_or(v, |hi| v.min(hi))
        };

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for value in self.samples.iter().map(|s| s.value).filter(|v| v.is_finite()) {
            let value = clamp(value);
            min = min.min(value);
            max = max.max(value);
        }

        if min > max {
            return self.bounds;
        }

        let magnitude = min.abs().max(max.abs());
        let range = (max - min).max(MIN_RANGE).max(magnitude * MIN_RELATIVE_RANGE);
        let margin = range * MARGIN_RATIO;
        // Padding past f64::MAX would give an infinite bound
        let pad = |v: f64, delta: f64| Some(v + delta).filter(|p| p.is_finite()).unwrap_or(v);
        self.bounds = Bounds {
            min: clamp(pad(min, -margin)),
            max: clamp(pad(max, margin)),
        };
        self.bounds
    }

    /// Samples in chronological order
    pub fn iter(&self) -> impl Iterator<Item = &ChannelSample> + '_ {
        self.samples.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn snapshot(&self) -> Vec<ChannelSample> {
        self.samples.iter().copied().collect()
    }
}

/// A window shared between threads. Every access goes through the window's
/// own lock; iteration holds the read guard for its whole duration.
#[derive(Debug, Clone)]
pub struct SharedWindow {
    inner: Arc<RwLock<TimeSeriesWindow>>,
}

impl SharedWindow {
    pub fn new(window: TimeSeriesWindow) -> Self {
        Self {
            inner: Arc::new(RwLock::new(window)),
        }
    }

    pub fn append(&self, sample: ChannelSample) {
        self.inner.write().append(sample);
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn bounds(&self) -> Bounds {
        self.inner.read().bounds()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<ChannelSample> {
        self.inner.read().snapshot()
    }

    /// Run `f` over the samples while holding the read lock
    pub fn with_samples<R>(&self, f: impl FnOnce(&mut dyn Iterator<Item = &ChannelSample>) -> R) -> R {
        let guard = self.inner.read();
        let mut iter = guard.iter();
        f(&mut iter)
    }
}

/// One window per channel, fed from readings
#[derive(Debug, Clone)]
pub struct WindowSet {
    pub temperature: TimeSeriesWindow,
    pub humidity: TimeSeriesWindow,
    pub smoke: TimeSeriesWindow,
}

impl WindowSet {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WINDOW_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            temperature: TimeSeriesWindow::with_capacity(Channel::Temperature, capacity),
            humidity: TimeSeriesWindow::with_capacity(Channel::Humidity, capacity),
            smoke: TimeSeriesWindow::with_capacity(Channel::Smoke, capacity),
        }
    }

    pub fn get(&self, channel: Channel) -> &TimeSeriesWindow {
        match channel {
            Channel::Temperature => &self.temperature,
            Channel::Humidity => &self.humidity,
            Channel::Smoke => &self.smoke,
        }
    }

    fn get_mut(&mut self, channel: Channel) -> &mut TimeSeriesWindow {
        match channel {
            Channel::Temperature => &mut self.temperature,
            Channel::Humidity => &mut self.humidity,
            Channel::Smoke => &mut self.smoke,
        }
    }

    /// Append every valid channel of the reading. Sentinel values from failed
    /// reads are skipped so they never distort the plotted range.
    pub fn record(&mut self, reading: &Reading) {
        for channel in Channel::ALL {
            if !reading.is_valid(channel) {
                continue;
            }
            if let Some(sample) = reading.sample(channel) {
                self.get_mut(channel).append(sample);
            }
        }
    }

    pub fn clear(&mut self) {
        for channel in Channel::ALL {
            self.get_mut(channel).clear();
        }
    }
}

impl Default for WindowSet {
    fn default() -> Self {
        Self::new()
    }
}
