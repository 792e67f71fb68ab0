//! Correlator configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use modbus_correlator::domain::CorrelatorConfigBuilder;
//!
//! let config = CorrelatorConfigBuilder::new()
//!     .response_timeout_ms(500)
//!     .transaction_id_space_size(256)
//!     .verbose_logging(true)
//!     .build()?;
//! ```

use crate::error::ConfigError;
use modbus_types::{DEFAULT_RESPONSE_TIMEOUT_MS, TRANSACTION_ID_SPACE};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Upper bound for the configured response timeout (one hour).
pub const MAX_RESPONSE_TIMEOUT_MS: u64 = 3_600_000;

/// Correlator configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Maximum wait per request
    pub response_timeout_ms: u64,
    /// Number of ids handed out before wrapping (at most 65536)
    pub transaction_id_space_size: u32,
    /// Feed the statistics aggregator
    pub statistics_enabled: bool,
    /// Log every delivered response at info instead of debug
    pub verbose_logging_enabled: bool,
    /// A timed-out id stays reserved for this many response timeouts
    pub timed_out_retention_factor: u32,
    /// Interval of the background sweep of expired reservations
    pub sweep_interval_ms: u64,
    /// Size of the slowest-requests set kept by the statistics
    pub slow_set_capacity: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            transaction_id_space_size: TRANSACTION_ID_SPACE,
            statistics_enabled: true,
            verbose_logging_enabled: false,
            timed_out_retention_factor: 3,
            sweep_interval_ms: 1_000,
            slow_set_capacity: 10,
        }
    }
}

impl CorrelatorConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.response_timeout_ms == 0 {
            return Err(ConfigError::ZeroResponseTimeout);
        }

        if self.response_timeout_ms > MAX_RESPONSE_TIMEOUT_MS {
            return Err(ConfigError::ResponseTimeoutTooLarge {
                timeout_ms: self.response_timeout_ms,
                max_ms: MAX_RESPONSE_TIMEOUT_MS,
            });
        }

        if self.transaction_id_space_size == 0
            || self.transaction_id_space_size > TRANSACTION_ID_SPACE
        {
            return Err(ConfigError::InvalidIdSpace {
                size: self.transaction_id_space_size,
                max: TRANSACTION_ID_SPACE,
            });
        }

        if self.timed_out_retention_factor == 0 {
            return Err(ConfigError::InvalidValue(
                "timed_out_retention_factor cannot be 0".to_string(),
            ));
        }

        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "sweep_interval_ms cannot be 0".to_string(),
            ));
        }

        if self.slow_set_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "slow_set_capacity cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Load overrides from `CORRELATOR_*` environment variables.
    ///
    /// Unset or unparsable variables keep their defaults. The result is
    /// not validated.
    ///
    /// - `CORRELATOR_RESPONSE_TIMEOUT_MS`
    /// - `CORRELATOR_ID_SPACE_SIZE`
    /// - `CORRELATOR_STATISTICS` (true/false)
    /// - `CORRELATOR_VERBOSE` (true/false)
    /// - `CORRELATOR_RETENTION_FACTOR`
    /// - `CORRELATOR_SWEEP_INTERVAL_MS`
    /// - `CORRELATOR_SLOW_SET_CAPACITY`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            response_timeout_ms: parse_env("CORRELATOR_RESPONSE_TIMEOUT_MS")
                .unwrap_or(defaults.response_timeout_ms),
            transaction_id_space_size: parse_env("CORRELATOR_ID_SPACE_SIZE")
                .unwrap_or(defaults.transaction_id_space_size),
            statistics_enabled: flag_env("CORRELATOR_STATISTICS")
                .unwrap_or(defaults.statistics_enabled),
            verbose_logging_enabled: flag_env("CORRELATOR_VERBOSE")
                .unwrap_or(defaults.verbose_logging_enabled),
            timed_out_retention_factor: parse_env("CORRELATOR_RETENTION_FACTOR")
                .unwrap_or(defaults.timed_out_retention_factor),
            sweep_interval_ms: parse_env("CORRELATOR_SWEEP_INTERVAL_MS")
                .unwrap_or(defaults.sweep_interval_ms),
            slow_set_capacity: parse_env("CORRELATOR_SLOW_SET_CAPACITY")
                .unwrap_or(defaults.slow_set_capacity),
        }
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// How long an id stays reserved after a request with `timeout` gave up.
    pub fn late_arrival_grace(&self, timeout: Duration) -> Duration {
        timeout.saturating_mul(self.timed_out_retention_factor)
    }

    pub fn with_response_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.response_timeout_ms = timeout_ms;
        self
    }

    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.statistics_enabled = enabled;
        self
    }

    pub fn with_verbose_logging(mut self, enabled: bool) -> Self {
        self.verbose_logging_enabled = enabled;
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn flag_env(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}

/// Builder for CorrelatorConfig with validation
#[derive(Default)]
pub struct CorrelatorConfigBuilder {
    response_timeout_ms: Option<u64>,
    transaction_id_space_size: Option<u32>,
    statistics_enabled: Option<bool>,
    verbose_logging_enabled: Option<bool>,
    timed_out_retention_factor: Option<u32>,
    sweep_interval_ms: Option<u64>,
    slow_set_capacity: Option<usize>,
}

impl CorrelatorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.response_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn transaction_id_space_size(mut self, size: u32) -> Self {
        self.transaction_id_space_size = Some(size);
        self
    }

    pub fn statistics(mut self, enabled: bool) -> Self {
        self.statistics_enabled = Some(enabled);
        self
    }

    pub fn verbose_logging(mut self, enabled: bool) -> Self {
        self.verbose_logging_enabled = Some(enabled);
        self
    }

    pub fn timed_out_retention_factor(mut self, factor: u32) -> Self {
        self.timed_out_retention_factor = Some(factor);
        self
    }

    pub fn sweep_interval_ms(mut self, interval_ms: u64) -> Self {
        self.sweep_interval_ms = Some(interval_ms);
        self
    }

    pub fn slow_set_capacity(mut self, capacity: usize) -> Self {
        self.slow_set_capacity = Some(capacity);
        self
    }

    /// Build the configuration, validating all parameters
    pub fn build(self) -> Result<CorrelatorConfig, ConfigError> {
        let defaults = CorrelatorConfig::default();

        let config = CorrelatorConfig {
            response_timeout_ms: self.response_timeout_ms.unwrap_or(defaults.response_timeout_ms),
            transaction_id_space_size: self
                .transaction_id_space_size
                .unwrap_or(defaults.transaction_id_space_size),
            statistics_enabled: self.statistics_enabled.unwrap_or(defaults.statistics_enabled),
            verbose_logging_enabled: self
                .verbose_logging_enabled
                .unwrap_or(defaults.verbose_logging_enabled),
            timed_out_retention_factor: self
                .timed_out_retention_factor
                .unwrap_or(defaults.timed_out_retention_factor),
            sweep_interval_ms: self.sweep_interval_ms.unwrap_or(defaults.sweep_interval_ms),
            slow_set_capacity: self.slow_set_capacity.unwrap_or(defaults.slow_set_capacity),
        };

        config.validate()?;
        Ok(config)
    }
}
