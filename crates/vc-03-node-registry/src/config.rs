//! # Registry Configuration
//!
//! Penalty factors, thresholds and windows of the node reputation state
//! machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Node reputation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Weight multiplier applied on success.
    pub success_reward: f64,

    /// Weight multiplier for a transport failure (timeout, refused).
    pub transport_penalty: f64,

    /// Weight multiplier for a structurally invalid response.
    pub malformed_penalty: f64,

    /// Weight multiplier for a failed proof. Must be the harshest.
    pub verification_penalty: f64,

    /// Consecutive failures that blacklist a node.
    pub failure_threshold: u32,

    /// Verification failures in a row that blacklist a node immediately.
    pub verification_blacklist_threshold: u32,

    /// Blacklist duration in seconds.
    pub blacklist_window_secs: u64,

    /// Weight multiplier applied when a blacklist expires.
    pub rehabilitation_discount: f64,

    /// Lower weight bound.
    pub min_weight: f64,

    /// Upper weight bound.
    pub max_weight: f64,

    /// Response time (ms) at which the response factor is 0.5.
    pub response_time_reference_ms: f64,

    /// Smoothing factor of the response-time moving average.
    pub response_time_smoothing: f64,

    /// Seconds after a failure during which the recency penalty applies.
    pub recency_window_secs: u64,

    /// Multiplier applied to nodes that failed within the recency window.
    pub recency_penalty: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            success_reward: 1.05,
            transport_penalty: 0.8,
            malformed_penalty: 0.6,
            verification_penalty: 0.2,
            failure_threshold: 3,
            verification_blacklist_threshold: 1,
            blacklist_window_secs: 3600,
            rehabilitation_discount: 0.5,
            min_weight: 0.01,
            max_weight: 10.0,
            response_time_reference_ms: 500.0,
            response_time_smoothing: 0.2,
            recency_window_secs: 300,
            recency_penalty: 0.5,
        }
    }
}

impl RegistryConfig {
    /// Short windows for tests.
    pub fn for_testing() -> Self {
        Self {
            blacklist_window_secs: 60,
            recency_window_secs: 10,
            ..Self::default()
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("transport_penalty", self.transport_penalty),
            ("malformed_penalty", self.malformed_penalty),
            ("verification_penalty", self.verification_penalty),
            ("rehabilitation_discount", self.rehabilitation_discount),
            ("recency_penalty", self.recency_penalty),
            ("response_time_smoothing", self.response_time_smoothing),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::invalid(field, "must be in (0, 1]"));
            }
        }

        if self.success_reward < 1.0 {
            return Err(ConfigError::invalid("success_reward", "must be >= 1"));
        }

        if self.verification_penalty > self.transport_penalty
            || self.verification_penalty > self.malformed_penalty
        {
            return Err(ConfigError::invalid(
                "verification_penalty",
                "must be the harshest penalty",
            ));
        }

        if self.failure_threshold == 0 || self.verification_blacklist_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold", "cannot be 0"));
        }

        if !(self.min_weight > 0.0 && self.min_weight <= self.max_weight) {
            return Err(ConfigError::invalid(
                "min_weight",
                "must be positive and <= max_weight",
            ));
        }

        if self.response_time_reference_ms <= 0.0 {
            return Err(ConfigError::invalid(
                "response_time_reference_ms",
                "must be positive",
            ));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds an unusable value.
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Why it is rejected
        reason: String,
    },
}

impl ConfigError {
    /// Build an `InvalidValue` error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
