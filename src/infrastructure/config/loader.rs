//! Layered configuration loading and validation.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Upper bound on concurrently refined scenarios
pub const MAX_CONCURRENCY_LIMIT: usize = 64;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `max_attempts` is zero.
    #[error("Invalid max_attempts: {0}. Must be at least 1")]
    InvalidMaxAttempts(u32),

    /// `max_concurrency` is outside the allowed range.
    #[error("Invalid max_concurrency: {0}. Must be between 1 and {MAX_CONCURRENCY_LIMIT}")]
    InvalidMaxConcurrency(usize),

    /// `call_timeout_secs` is zero.
    #[error("Invalid call_timeout_secs: {0}. Must be at least 1")]
    InvalidCallTimeout(u64),

    /// `requests_per_second` is not a positive number.
    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    /// Unknown log level.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// `burst_size` is zero.
    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    /// Initial backoff is not below the maximum.
    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    /// `output.root` is empty.
    #[error("Output root cannot be empty")]
    EmptyOutputRoot,

    /// `output.extension` is empty.
    #[error("Output extension cannot be empty")]
    EmptyOutputExtension,

    /// Any other invalid setting.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .autotest/config.yaml (project config)
    /// 3. .autotest/local.yaml (project local overrides, optional)
    /// 4. Environment variables (AUTOTEST_* prefix, `__` for nesting)
    ///
    /// CLI flags are applied on top by the command handlers.
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment(None)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration with an explicit file layered over the project
    /// files and under the environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Self::figment(Some(path))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise from the project files
    pub fn load_with(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }

    fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".autotest/config.yaml"))
            .merge(Yaml::file(".autotest/local.yaml"));
        if let Some(path) = explicit {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed("AUTOTEST_").split("__"))
    }

    /// Validate configuration after loading or after CLI overrides
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let refinement = &config.refinement;
        if refinement.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(refinement.max_attempts));
        }
        if refinement.max_concurrency == 0 || refinement.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(ConfigError::InvalidMaxConcurrency(refinement.max_concurrency));
        }
        if refinement.call_timeout_secs == 0 {
            return Err(ConfigError::InvalidCallTimeout(refinement.call_timeout_secs));
        }

        if config.output.root.trim().is_empty() {
            return Err(ConfigError::EmptyOutputRoot);
        }
        if config.output.extension.trim().trim_start_matches('.').is_empty() {
            return Err(ConfigError::EmptyOutputExtension);
        }
        if config.output.test_framework.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "output.test_framework cannot be empty".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.rate_limit.requests_per_second <= 0.0
            || !config.rate_limit.requests_per_second.is_finite()
        {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_second,
            ));
        }

        if config.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(config.rate_limit.burst_size));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if config.capability.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "capability.model cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
