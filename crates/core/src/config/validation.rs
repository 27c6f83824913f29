//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use regex::Regex;
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn check_label(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(invalid(field, "must not contain whitespace"));
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` or a bucket label is empty or contains whitespace
    /// - both bucket labels are equal
    /// - `origin` is not an http(s) URL
    /// - a manifest path or the navigation fallback is not root-relative
    /// - an API pattern is not a valid regular expression
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `runtime_max_entries` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_label("version", &self.version)?;
        check_label("static_label", &self.static_label)?;
        check_label("runtime_label", &self.runtime_label)?;
        if self.static_label == self.runtime_label {
            return Err(invalid("runtime_label", "must differ from static_label"));
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme())));
        }

        if self.app_shell.is_empty() {
            return Err(invalid("app_shell", "must list at least one path"));
        }
        if let Some(path) = self.app_shell.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid("app_shell", format!("{path:?} is not root-relative")));
        }
        if !self.navigation_fallback.starts_with('/') {
            return Err(invalid("navigation_fallback", "must be root-relative"));
        }
        if !self.app_shell.contains(&self.navigation_fallback) {
            tracing::warn!(
                fallback = %self.navigation_fallback,
                "navigation_fallback is not part of app_shell; offline navigations will get 503"
            );
        }

        for pattern in &self.api_patterns {
            Regex::new(pattern).map_err(|e| invalid("api_patterns", format!("{pattern:?}: {e}")))?;
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.runtime_max_entries == Some(0) {
            return Err(invalid("runtime_max_entries", "must be greater than 0 when set"));
        }

        Ok(())
    }
}
