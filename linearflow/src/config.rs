//! Configuration for the registry, launcher, and monitor.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Environment variable holding the execution role reference.
pub const ENV_EXECUTION_ROLE: &str = "LINEARFLOW_EXECUTION_ROLE";
/// Environment variable overriding the poll interval, in milliseconds.
pub const ENV_POLL_INTERVAL_MS: &str = "LINEARFLOW_POLL_INTERVAL_MS";
/// Environment variable overriding the attempt budget.
pub const ENV_MAX_POLL_ATTEMPTS: &str = "LINEARFLOW_MAX_POLL_ATTEMPTS";
/// Environment variable naming the input field used in launch names.
pub const ENV_CORRELATION_FIELD: &str = "LINEARFLOW_CORRELATION_FIELD";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required setting {0}")]
    Missing(String),

    /// A variable is set but cannot be used.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// The setting name.
        key: String,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The JSON document could not be parsed.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Polling cadence of an [`ExecutionMonitor`](crate::monitor::ExecutionMonitor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Sleep between two describe calls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum number of describe calls per execution.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    30
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl MonitorConfig {
    /// Creates a monitor configuration with defaults (1 s, 30 attempts).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Gets the poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Checks that at least one attempt is allowed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_attempts".to_string(),
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings for a whole workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Role reference handed to the backend at registration.
    pub execution_role: String,
    /// Polling cadence.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Input field whose value names launches. Defaults to the first
    /// required field of the definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_field: Option<String>,
}

impl OrchestratorConfig {
    /// Creates a configuration with default polling.
    #[must_use]
    pub fn new(execution_role: impl Into<String>) -> Self {
        Self {
            execution_role: execution_role.into(),
            monitor: MonitorConfig::default(),
            correlation_field: None,
        }
    }

    /// Sets the polling cadence.
    #[must_use]
    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// Sets the correlation field.
    #[must_use]
    pub fn with_correlation_field(mut self, field: impl Into<String>) -> Self {
        self.correlation_field = Some(field.into());
        self
    }

    /// Loads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration from process environment variables, using
    /// `default_role` when no execution role is set.
    pub fn from_env_or_role(default_role: &str) -> Result<Self, ConfigError> {
        Self::from_lookup_or_role(|key| std::env::var(key).ok(), default_role)
    }

    /// Loads the configuration from a variable lookup.
    ///
    /// The execution role is required; the polling settings fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let execution_role = lookup(ENV_EXECUTION_ROLE)
            .filter(|role| !role.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing(ENV_EXECUTION_ROLE.to_string()))?;
        Self::from_parts(execution_role, &lookup)
    }

    /// Like [`OrchestratorConfig::from_lookup`], but a missing execution role
    /// becomes `default_role`. The other settings are still read and checked.
    pub fn from_lookup_or_role(
        lookup: impl Fn(&str) -> Option<String>,
        default_role: &str,
    ) -> Result<Self, ConfigError> {
        let execution_role = match lookup(ENV_EXECUTION_ROLE).filter(|role| !role.trim().is_empty()) {
            Some(role) => role,
            None => {
                warn!(key = ENV_EXECUTION_ROLE, role = default_role, "Execution role not set, using default role");
                default_role.to_string()
            }
        };
        Self::from_parts(execution_role, &lookup)
    }

    fn from_parts(
        execution_role: String,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {

        let mut monitor = MonitorConfig::default();
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            monitor.poll_interval_ms = parse_setting(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_POLL_ATTEMPTS) {
            monitor.max_attempts = parse_setting(ENV_MAX_POLL_ATTEMPTS, &raw)?;
        }

        let config = Self {
            execution_role,
            monitor,
            correlation_field: lookup(ENV_CORRELATION_FIELD).filter(|f| !f.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses the configuration from JSON.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the role is set and the monitor settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution_role.trim().is_empty() {
            return Err(ConfigError::Missing("execution_role".to_string()));
        }
        self.monitor.validate()
    }
}

fn parse_setting<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
