//! Prometheus export of correlator outcomes.
//!
//! Metric names are `<prefix>_<metric>_<unit>`; the prefix defaults to
//! `modbus_correlator`. Each `PrometheusMetrics` owns its registry, so
//! several correlators in one process can be exported side by side.

use modbus_correlator::MetricsRecorder;
use modbus_types::ExceptionResponse;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};
use std::time::Duration;

use crate::TelemetryError;

fn metrics_err(e: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsInit(e.to_string())
}

/// `MetricsRecorder` backed by a Prometheus registry.
pub struct PrometheusMetrics {
    registry: Registry,
    delivered: IntCounter,
    late_arrivals: IntCounter,
    unmatched: IntCounter,
    timeouts: IntCounter,
    protocol_errors: IntCounterVec,
    reclaimed: IntCounter,
    response_time: Histogram,
    occupancy: IntGauge,
}

impl PrometheusMetrics {
    pub fn new(prefix: &str) -> Result<Self, TelemetryError> {
        let registry =
            Registry::new_custom(Some(prefix.to_string()), None).map_err(metrics_err)?;

        let delivered = IntCounter::new(
            "responses_delivered_total",
            "Responses delivered to a waiting request",
        )
        .map_err(metrics_err)?;
        let late_arrivals = IntCounter::new(
            "responses_late_total",
            "Responses that arrived after their request had timed out",
        )
        .map_err(metrics_err)?;
        let unmatched = IntCounter::new(
            "responses_unmatched_total",
            "Frames whose transaction id matched no request",
        )
        .map_err(metrics_err)?;
        let timeouts = IntCounter::new(
            "request_timeouts_total",
            "Requests that received no response within the timeout",
        )
        .map_err(metrics_err)?;
        let protocol_errors = IntCounterVec::new(
            Opts::new(
                "protocol_errors_total",
                "Exception responses returned by the server",
            ),
            &["exception_code"],
        )
        .map_err(metrics_err)?;
        let reclaimed = IntCounter::new(
            "reservations_reclaimed_total",
            "Timed-out transaction ids reclaimed without a late response",
        )
        .map_err(metrics_err)?;
        let response_time = Histogram::with_opts(
            HistogramOpts::new(
                "response_time_seconds",
                "Time between registering a request and its response arriving",
            )
            .buckets(exponential_buckets(0.001, 2.0, 14).map_err(metrics_err)?),
        )
        .map_err(metrics_err)?;
        let occupancy = IntGauge::new(
            "transaction_slots_in_use",
            "Transaction ids currently pending, fulfilled or reserved",
        )
        .map_err(metrics_err)?;

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(delivered.clone()),
            Box::new(late_arrivals.clone()),
            Box::new(unmatched.clone()),
            Box::new(timeouts.clone()),
            Box::new(protocol_errors.clone()),
            Box::new(reclaimed.clone()),
            Box::new(response_time.clone()),
            Box::new(occupancy.clone()),
        ];
        for collector in collectors {
            registry.register(collector).map_err(metrics_err)?;
        }

        Ok(Self {
            registry,
            delivered,
            late_arrivals,
            unmatched,
            timeouts,
            protocol_errors,
            reclaimed,
            response_time,
            occupancy,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn gather_text(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(metrics_err)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}

impl MetricsRecorder for PrometheusMetrics {
    fn record_delivered(&self, waited: Duration) {
        self.delivered.inc();
        self.response_time.observe(waited.as_secs_f64());
    }

    fn record_late_arrival(&self) {
        self.late_arrivals.inc();
    }

    fn record_unmatched(&self) {
        self.unmatched.inc();
    }

    fn record_timeout(&self) {
        self.timeouts.inc();
    }

    fn record_protocol_error(&self, exception: &ExceptionResponse) {
        let code = u8::from(exception.exception_code).to_string();
        self.protocol_errors.with_label_values(&[code.as_str()]).inc();
    }

    fn record_reclaimed(&self, count: usize) {
        self.reclaimed.inc_by(count as u64);
    }

    fn set_occupancy(&self, occupancy: usize) {
        self.occupancy
            .set(i64::try_from(occupancy).unwrap_or(i64::MAX));
    }
}
