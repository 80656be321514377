use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::cache::MAX_TTL_SECS;
use crate::domain::models::config::MAX_SAFETY_MARGIN_SECS;
use crate::domain::models::{CacheCategory, Config};
use crate::infrastructure::logging::logger::parse_log_level;

/// Directory holding project configuration
pub const CONFIG_DIR: &str = ".ledgerbridge";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "LEDGERBRIDGE_";

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("api.base_url cannot be empty")]
    EmptyBaseUrl,

    #[error("Invalid api.base_url: {0}. Must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("Invalid api.timeout_secs: 0. Must be at least 1")]
    InvalidTimeout,

    #[error(
        "Invalid TTL for category {0}: must be between 1 and {max} seconds",
        max = MAX_TTL_SECS
    )]
    InvalidTtl(CacheCategory),

    #[error(
        "Invalid session.safety_margin_secs: {0}. Must be at most {max}",
        max = MAX_SAFETY_MARGIN_SECS
    )]
    InvalidSafetyMargin(u64),

    #[error("Invalid cache.max_size: 0. Must be at least 1")]
    InvalidCacheSize,

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(u32),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid retry.jitter: {0}. Must be in [0, 1)")]
    InvalidJitter(f64),

    #[error("Invalid retry.total_timeout_secs: 0. Must be at least 1")]
    InvalidTotalTimeout,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .ledgerbridge/config.yaml (project config)
    /// 3. .ledgerbridge/local.yaml (local overrides, optional)
    /// 4. Environment variables (LEDGERBRIDGE_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(CONFIG_DIR)
    }

    /// Load configuration rooted at `dir` instead of the working directory
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, ignoring the environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let base_url = config.api.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_string()));
        }
        if config.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        for category in CacheCategory::ALL {
            let secs = config.cache.ttl.secs(category);
            if secs == 0 || secs > MAX_TTL_SECS {
                return Err(ConfigError::InvalidTtl(category));
            }
        }
        if config.session.safety_margin_secs > MAX_SAFETY_MARGIN_SECS {
            return Err(ConfigError::InvalidSafetyMargin(
                config.session.safety_margin_secs,
            ));
        }
        if config.cache.max_size == 0 {
            return Err(ConfigError::InvalidCacheSize);
        }

        if config.rate_limit.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_second,
            ));
        }
        if config.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(config.rate_limit.burst_size));
        }

        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }
        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }
        if !(0.0..1.0).contains(&config.retry.jitter) {
            return Err(ConfigError::InvalidJitter(config.retry.jitter));
        }
        if config.retry.total_timeout_secs == 0 {
            return Err(ConfigError::InvalidTotalTimeout);
        }

        if parse_log_level(&config.logging.level).is_err() {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
