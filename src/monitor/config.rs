//! Monitor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

use super::markers::MarkerConfig;

/// Default per-job timeout, matching the scale of multi-day gradient runs.
pub const DEFAULT_TIMEOUT_SECS: u64 = 4_000_000;

/// Default polling period.
pub const DEFAULT_INTERVAL_SECS: u64 = 90;

/// Configuration for the job monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Maximum time to wait for one job's log to stabilize once it exists.
    pub timeout: Duration,
    /// Polling period for existence and size checks.
    pub interval: Duration,
    /// Number of jobs stabilized concurrently. 1 keeps strictly sequential
    /// processing.
    pub parallel: usize,
    /// Outcome markers.
    pub markers: MarkerConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            parallel: 1,
            markers: MarkerConfig::default(),
        }
    }
}

/// Optional overrides, as read from the `monitor:` section of a batch file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorOverrides {
    pub timeout_secs: Option<u64>,
    pub interval_secs: Option<u64>,
    pub parallel: Option<usize>,
    pub markers: Option<MarkerConfig>,
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `JOBWATCH_TIMEOUT_SECS`: Per-job timeout in seconds (default: 4000000)
    /// - `JOBWATCH_INTERVAL_SECS`: Polling interval in seconds (default: 90)
    /// - `JOBWATCH_PARALLEL`: Jobs stabilized concurrently (default: 1)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("JOBWATCH_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "JOBWATCH_TIMEOUT_SECS")?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("JOBWATCH_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "JOBWATCH_INTERVAL_SECS")?;
            config.interval = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("JOBWATCH_PARALLEL") {
            config.parallel = parse_env_value(&val, "JOBWATCH_PARALLEL")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from a batch file on top of this configuration.
    pub fn merge(mut self, overrides: &MonitorOverrides) -> Self {
        if let Some(secs) = overrides.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.interval_secs {
            self.interval = Duration::from_secs(secs);
        }
        if let Some(parallel) = overrides.parallel {
            self.parallel = parallel;
        }
        if let Some(markers) = &overrides.markers {
            self.markers = markers.clone();
        }
        self
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "timeout must be greater than 0".to_string(),
            ));
        }

        if self.interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "interval must be greater than 0".to_string(),
            ));
        }

        if self.parallel == 0 {
            return Err(ConfigError::ValidationFailed(
                "parallel must be greater than 0".to_string(),
            ));
        }

        if self.timeout < self.interval {
            warn!(
                "Timeout {:?} is shorter than the polling interval {:?}; logs without a \
                 completion marker will always time out",
                self.timeout,
                self.interval
            );
        }

        self.markers.compile()?;
        Ok(())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }
}

fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(4_000_000));
        assert_eq!(config.interval, Duration::from_secs(90));
        assert_eq!(config.parallel, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        assert!(MonitorConfig::default()
            .with_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(MonitorConfig::default()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(MonitorConfig::default().with_parallel(0).validate().is_err());
    }

    #[test]
    fn test_timeout_shorter_than_interval_is_accepted() {
        let config = MonitorConfig::new()
            .with_interval(Duration::from_secs(90))
            .with_timeout(Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_markers() {
        let mut config = MonitorConfig::default();
        config.markers.error_pattern = "(".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Markers(_))));
    }

    #[test]
    fn test_merge_overrides() {
        let overrides = MonitorOverrides {
            timeout_secs: Some(60),
            interval_secs: None,
            parallel: Some(3),
            markers: None,
        };
        let config = MonitorConfig::default().merge(&overrides);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.interval, Duration::from_secs(90));
        assert_eq!(config.parallel, 3);
    }

    #[test]
    fn test_parse_env_value() {
        let value: u64 = parse_env_value(" 42 ", "KEY").unwrap();
        assert_eq!(value, 42);
        let err = parse_env_value::<u64>("abc", "KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
