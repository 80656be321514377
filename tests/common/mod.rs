//! Common test utilities for integration tests
//!
//! Provides shared fixtures and mock-server helpers used across
//! multiple integration test files.

#![allow(dead_code)]

use ledgerbridge::domain::models::Config;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Configuration pointing at `server` with fast, deterministic retries
pub fn mock_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.api.timeout_secs = 5;
    config.retry.max_retries = 3;
    config.retry.initial_backoff_ms = 5;
    config.retry.max_backoff_ms = 20;
    config.retry.jitter = 0.0;
    config.retry.total_timeout_secs = 10;
    config.rate_limit.requests_per_second = 1000;
    config.rate_limit.burst_size = 1000;
    config
}

/// Token response body as issued by the login endpoint
pub fn token_body(token: &str, expires_in: i64) -> serde_json::Value {
    json!({
        "access_token": token,
        "token_type": "Bearer",
        "expires_in": expires_in,
    })
}

/// Mount a login endpoint issuing `token`, optionally only `times` times
pub async fn mount_login(server: &MockServer, token: &str, times: Option<u64>) {
    let mock = Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(token, 3600)));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
