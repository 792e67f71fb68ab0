//! Metrics hooks for correlation outcomes
//!
//! The statistics aggregator answers "how slow were requests since the last
//! report". These hooks feed external monitoring with monotonic counters
//! instead, and are never reset by the correlator.
//!
//! ## Usage
//!
//! ```ignore
//! use modbus_correlator::metrics::Metrics;
//!
//! let metrics = Arc::new(Metrics::new());
//! let correlator = Correlator::with_metrics(config, metrics.clone())?;
//! // ...
//! let snapshot = metrics.snapshot();
//! ```

use modbus_types::ExceptionResponse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Trait for custom metrics recording implementations
///
/// Implement this to export correlation outcomes to Prometheus, StatsD or
/// similar. Calls are made outside the transaction table lock.
pub trait MetricsRecorder: Send + Sync {
    /// A frame reached its waiting caller.
    fn record_delivered(&self, waited: Duration);

    /// A frame arrived after its caller had timed out.
    fn record_late_arrival(&self);

    /// A frame matched no transaction.
    fn record_unmatched(&self);

    /// A caller gave up waiting.
    fn record_timeout(&self);

    /// A delivered frame carried an exception response.
    fn record_protocol_error(&self, exception: &ExceptionResponse);

    /// Timed-out reservations reclaimed without a late frame.
    fn record_reclaimed(&self, count: usize);

    /// Number of ids currently held by the transaction table.
    fn set_occupancy(&self, occupancy: usize);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Debug, Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_delivered(&self, _: Duration) {}
    fn record_late_arrival(&self) {}
    fn record_unmatched(&self) {}
    fn record_timeout(&self) {}
    fn record_protocol_error(&self, _: &ExceptionResponse) {}
    fn record_reclaimed(&self, _: usize) {}
    fn set_occupancy(&self, _: usize) {}
}

/// In-process counters
#[derive(Debug, Default)]
pub struct Metrics {
    pub delivered: AtomicU64,
    pub late_arrivals: AtomicU64,
    pub unmatched: AtomicU64,
    pub timeouts: AtomicU64,
    pub protocol_errors: AtomicU64,
    pub reclaimed: AtomicU64,
    pub occupancy: AtomicU64,
    /// Cumulative round-trip time of delivered frames in microseconds
    pub round_trip_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let delivered = self.delivered.load(Ordering::Relaxed);
        let round_trip_us = self.round_trip_us.load(Ordering::Relaxed);

        MetricsSnapshot {
            delivered,
            late_arrivals: self.late_arrivals.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            occupancy: self.occupancy.load(Ordering::Relaxed),
            avg_round_trip_us: if delivered > 0 {
                round_trip_us / delivered
            } else {
                0
            },
        }
    }
}

impl MetricsRecorder for Metrics {
    fn record_delivered(&self, waited: Duration) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.round_trip_us
            .fetch_add(waited.as_micros() as u64, Ordering::Relaxed);
    }

    fn record_late_arrival(&self) {
        self.late_arrivals.fetch_add(1, Ordering::Relaxed);
    }

    fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_protocol_error(&self, _exception: &ExceptionResponse) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_reclaimed(&self, count: usize) {
        self.reclaimed.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn set_occupancy(&self, occupancy: usize) {
        self.occupancy.store(occupancy as u64, Ordering::Relaxed);
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub delivered: u64,
    pub late_arrivals: u64,
    pub unmatched: u64,
    pub timeouts: u64,
    pub protocol_errors: u64,
    pub reclaimed: u64,
    pub occupancy: u64,
    pub avg_round_trip_us: u64,
}
