//! # Correlator Telemetry
//!
//! Logging and metrics for processes that run a Modbus response correlator.
//!
//! ## Components
//!
//! - **Logging**: global `tracing` subscriber with `EnvFilter`, pretty or
//!   JSON output
//! - **Metrics**: `PrometheusMetrics`, a `MetricsRecorder` for the
//!   correlator backed by its own Prometheus registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use correlator_telemetry::{init_telemetry, TelemetryConfig};
//! use modbus_correlator::{Correlator, CorrelatorConfig};
//!
//! let metrics = init_telemetry(&TelemetryConfig::from_env())?;
//! let correlator = Correlator::with_metrics(CorrelatorConfig::from_env(), metrics.clone())?;
//!
//! // serve metrics.gather_text() on /metrics
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CORRELATOR_SERVICE_NAME` | `modbus-correlator` | Service name in logs |
//! | `CORRELATOR_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `CORRELATOR_JSON_LOGS` | `false` | JSON log lines |
//! | `CORRELATOR_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `CORRELATOR_METRICS_PREFIX` | `modbus_correlator` | Metric name prefix |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_env_filter, init_logging};
pub use metrics::PrometheusMetrics;

use std::sync::Arc;
use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and build the metrics recorder.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Arc<PrometheusMetrics>, TelemetryError> {
    let metrics = PrometheusMetrics::new(&config.metrics_prefix)?;
    init_logging(config)?;
    Ok(Arc::new(metrics))
}
