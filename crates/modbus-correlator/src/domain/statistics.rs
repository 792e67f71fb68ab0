//! Round-trip statistics for one correlator
//!
//! Tracks request count, accumulated and fastest duration, lost requests,
//! and a bounded set of the slowest durations seen since the last reset.
//! Every correlator owns its own aggregator; nothing here is global.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of slow durations retained between resets.
pub const DEFAULT_SLOW_SET_CAPACITY: usize = 10;

#[derive(Debug, Default)]
struct StatisticsState {
    total_requests: u64,
    accumulated_ms: u64,
    fastest_ms: Option<u64>,
    lost_requests: u64,
    /// Sorted ascending, at most `capacity` entries.
    slowest_ms: Vec<u64>,
}

/// Thread-safe statistics aggregator
#[derive(Debug)]
pub struct StatisticsAggregator {
    state: Mutex<StatisticsState>,
    slow_set_capacity: usize,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SLOW_SET_CAPACITY)
    }

    /// Create with a custom slow-set size (clamped to at least one).
    pub fn with_capacity(slow_set_capacity: usize) -> Self {
        Self {
            state: Mutex::new(StatisticsState::default()),
            slow_set_capacity: slow_set_capacity.max(1),
        }
    }

    /// Record one completed round trip.
    ///
    /// Durations are kept at millisecond resolution.
    pub fn record(&self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let mut state = self.state.lock();

        state.total_requests += 1;
        state.accumulated_ms = state.accumulated_ms.saturating_add(ms);
        state.fastest_ms = Some(state.fastest_ms.map_or(ms, |fastest| fastest.min(ms)));

        if state.slowest_ms.len() < self.slow_set_capacity {
            state.slowest_ms.push(ms);
            state.slowest_ms.sort_unstable();
        } else if ms > state.slowest_ms[0] {
            // Evict the smallest of the retained durations.
            state.slowest_ms[0] = ms;
            state.slowest_ms.sort_unstable();
        }
    }

    /// Record a request whose response never reached its caller.
    pub fn record_lost(&self) {
        self.state.lock().lost_requests += 1;
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let state = self.state.lock();
        StatisticsSnapshot::from_state(&state)
    }

    /// Zero all counters and clear the slow set.
    pub fn reset(&self) {
        *self.state.lock() = StatisticsState::default();
    }

    /// Snapshot and reset under one lock, so no sample falls between them.
    pub fn take_snapshot(&self) -> StatisticsSnapshot {
        let mut state = self.state.lock();
        let snapshot = StatisticsSnapshot::from_state(&state);
        *state = StatisticsState::default();
        snapshot
    }

    pub fn slow_set_capacity(&self) -> usize {
        self.slow_set_capacity
    }
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time statistics snapshot
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub total_requests: u64,
    pub accumulated_duration_ms: u64,
    pub average_duration_ms: f64,
    pub fastest_ms: Option<u64>,
    pub slowest_ms: Option<u64>,
    pub lost_requests: u64,
    /// Slowest durations seen, ascending.
    pub top_slowest_ms: Vec<u64>,
}

impl StatisticsSnapshot {
    fn from_state(state: &StatisticsState) -> Self {
        let average_duration_ms = if state.total_requests > 0 {
            state.accumulated_ms as f64 / state.total_requests as f64
        } else {
            0.0
        };

        Self {
            total_requests: state.total_requests,
            accumulated_duration_ms: state.accumulated_ms,
            average_duration_ms,
            fastest_ms: state.fastest_ms,
            slowest_ms: state.slowest_ms.last().copied(),
            lost_requests: state.lost_requests,
            top_slowest_ms: state.slowest_ms.clone(),
        }
    }

    /// Smallest duration in the slow set: every retained request took at
    /// least this long.
    pub fn slow_threshold_ms(&self) -> Option<u64> {
        self.top_slowest_ms.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.total_requests == 0 && self.lost_requests == 0
    }
}
