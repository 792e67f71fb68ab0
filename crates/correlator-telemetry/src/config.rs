//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for logging and metrics export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `modbus_correlator=debug,info`
    pub log_level: String,

    /// Whether to write logs as JSON (one object per line)
    pub json_logs: bool,

    /// Whether to write logs to stdout at all
    pub console_output: bool,

    /// Prefix for every exported Prometheus metric
    pub metrics_prefix: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "modbus-correlator".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            console_output: true,
            metrics_prefix: "modbus_correlator".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CORRELATOR_SERVICE_NAME`: Service name (default: modbus-correlator)
    /// - `CORRELATOR_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `CORRELATOR_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `CORRELATOR_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `CORRELATOR_METRICS_PREFIX`: Metric name prefix (default: modbus_correlator)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("CORRELATOR_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: env::var("CORRELATOR_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: env::var("CORRELATOR_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            console_output: env::var("CORRELATOR_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.console_output),

            metrics_prefix: env::var("CORRELATOR_METRICS_PREFIX")
                .unwrap_or(defaults.metrics_prefix),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
