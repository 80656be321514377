use serde::{Deserialize, Serialize};

use super::cache::CategoryTtls;
use crate::infrastructure::logging::LogConfig;

/// Main configuration structure for Ledgerbridge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Remote API endpoints and transport settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Session / token lifecycle settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Outbound rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LogConfig,
}

/// Remote accounting API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiConfig {
    /// Base URL every path is resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Login endpoint (POST, email/password body)
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Refresh endpoint (POST, refresh token body); unset disables refresh
    #[serde(default = "default_refresh_path")]
    pub refresh_path: Option<String>,

    /// Logout endpoint called on shutdown; unset skips remote logout
    #[serde(default)]
    pub logout_path: Option<String>,

    /// Header carrying a static API key; unset sends `Authorization: Bearer`
    #[serde(default)]
    pub api_key_header: Option<String>,

    /// Cheap resource used by connectivity checks
    #[serde(default = "default_probe_path")]
    pub probe_path: String,

    /// Per-attempt request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://api.example-accounting.com".to_string()
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_refresh_path() -> Option<String> {
    Some("/auth/refresh".to_string())
}

fn default_probe_path() -> String {
    "/me".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("ledgerbridge/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            logout_path: None,
            api_key_header: None,
            probe_path: default_probe_path(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Longest accepted `session.safety_margin_secs` (one day)
pub const MAX_SAFETY_MARGIN_SECS: u64 = 24 * 60 * 60;

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Seconds before expiry at which a token is treated as stale
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,

    /// Fall back to a full login when a refresh is rejected
    #[serde(default = "default_true")]
    pub relogin_on_refresh_failure: bool,
}

const fn default_safety_margin_secs() -> u64 {
    60
}

const fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            safety_margin_secs: default_safety_margin_secs(),
            relogin_on_refresh_failure: default_true(),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Maximum number of entries held at once
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Interval of the background expiry sweep in seconds; 0 disables it
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Category TTL table
    #[serde(default)]
    pub ttl: CategoryTtls,
}

const fn default_max_size() -> usize {
    1000
}

const fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            sweep_interval_secs: default_sweep_interval_secs(),
            ttl: CategoryTtls::default(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Randomization factor applied to each delay, in `[0, 1)`
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Deadline for a whole fetch, retries included, in seconds
    #[serde(default = "default_total_timeout_secs")]
    pub total_timeout_secs: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

const fn default_jitter() -> f64 {
    0.2
}

const fn default_total_timeout_secs() -> u64 {
    120
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
            total_timeout_secs: default_total_timeout_secs(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst size for token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> u32 {
    10
}

const fn default_burst_size() -> u32 {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}
