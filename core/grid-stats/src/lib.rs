//! Grid Statistics Collectors
//!
//! Aggregation primitives attached to every machine and to the grid as a whole.
//! Time is plain simulated time (`f64`), never wall-clock.

use serde::{Deserialize, Serialize};

/// Snapshot of a monitor, serialized into run reports
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub count: u64,
    pub total: f64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Time-weighted average of a stepwise value (e.g. number of tasks in system).
///
/// The value is held constant between observations; the average is the
/// integral of the step function divided by elapsed time since `start`.
#[derive(Debug, Clone)]
pub struct TimeWeightedMonitor {
    start: f64,
    last_time: f64,
    last_value: f64,
    area: f64,
    observations: u64,
    min: f64,
    max: f64,
}

impl TimeWeightedMonitor {
    /// Monitor starting at `start` with value zero
    pub fn new(start: f64) -> Self {
        Self {
            start,
            last_time: start,
            last_value: 0.0,
            area: 0.0,
            observations: 0,
            min: 0.0,
            max: 0.0,
        }
    }

    /// Record that the value became `value` at time `now`.
    ///
    /// Observations must arrive in non-decreasing time order; an earlier
    /// timestamp is clamped to the last one so the integral never shrinks.
    pub fn observe(&mut self, now: f64, value: f64) {
        let now = now.max(self.last_time);
        self.area += self.last_value * (now - self.last_time);
        self.last_time = now;
        self.last_value = value;
        self.observations += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Add `delta` to the current value at time `now`
    pub fn step(&mut self, now: f64, delta: f64) {
        let next = self.last_value + delta;
        self.observe(now, next);
    }

    /// Current (last observed) value
    pub fn current(&self) -> f64 {
        self.last_value
    }

    /// Integral of the value from `start` to `now`
    pub fn area(&self, now: f64) -> f64 {
        let now = now.max(self.last_time);
        self.area + self.last_value * (now - self.last_time)
    }

    /// Time-weighted average over `[start, now]`; `None` when no time elapsed
    pub fn time_average(&self, now: f64) -> Option<f64> {
        let elapsed = now - self.start;
        if elapsed <= 0.0 {
            return None;
        }
        Some(self.area(now) / elapsed)
    }

    pub fn summary(&self, now: f64) -> MonitorSummary {
        MonitorSummary {
            count: self.observations,
            total: self.area(now),
            mean: self.time_average(now),
            min: (self.observations > 0).then_some(self.min),
            max: (self.observations > 0).then_some(self.max),
        }
    }
}

impl Default for TimeWeightedMonitor {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Count-based monitor over scalar samples (sojourn times, service times).
///
/// Keeps running aggregates only, so memory does not grow with the run.
#[derive(Debug, Clone)]
pub struct SampleMonitor {
    count: u64,
    total: f64,
    min: f64,
    max: f64,
}

impl SampleMonitor {
    pub fn new() -> Self {
        Self {
            count: 0,
            total: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Arithmetic mean, `None` with no samples
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.total / self.count as f64)
    }

    pub fn summary(&self) -> MonitorSummary {
        let empty = self.count == 0;
        MonitorSummary {
            count: self.count,
            total: self.total,
            mean: self.mean(),
            min: (!empty).then_some(self.min),
            max: (!empty).then_some(self.max),
        }
    }
}

impl Default for SampleMonitor {
    fn default() -> Self {
        Self::new()
    }
}
