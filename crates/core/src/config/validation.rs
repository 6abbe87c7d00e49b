//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - any timeout is below 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - rate limit parameters are zero
    /// - `environment` is not "development" or "production"
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        for (field, value) in [
            ("timeout_ms", self.timeout_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("resolve_timeout_ms", self.resolve_timeout_ms),
        ] {
            if value < 100 {
                return Err(invalid(field, "must be at least 100ms"));
            }
            if value > 300_000 {
                return Err(invalid(field, "must not exceed 5 minutes (300000ms)"));
            }
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.rate_limit_max_requests == 0 {
            return Err(invalid("rate_limit_max_requests", "must be greater than 0"));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(invalid("rate_limit_window_secs", "must be greater than 0"));
        }

        if self.backfill_batch_size == 0 {
            return Err(invalid("backfill_batch_size", "must be greater than 0"));
        }

        if !matches!(self.environment.as_str(), "development" | "production") {
            return Err(invalid("environment", "must be \"development\" or \"production\""));
        }

        if self.resolve_timeout_ms < self.timeout_ms {
            tracing::warn!(
                resolve_timeout_ms = self.resolve_timeout_ms,
                timeout_ms = self.timeout_ms,
                "resolve_timeout_ms is shorter than the page fetch timeout; \
                 slow pages will hit the resolution deadline first"
            );
        }

        if self.enhancer_api_key().is_none() {
            tracing::warn!("no enhancer_api_key configured; item text will not be rewritten");
        }

        Ok(())
    }
}
