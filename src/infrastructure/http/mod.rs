//! HTTP infrastructure: reqwest transport and authenticator, retry policy
//! and outbound rate limiting.

pub mod auth;
pub mod client;
pub mod rate_limiter;
pub mod retry;

pub use auth::HttpAuthenticator;
pub use client::{build_http_client, ReqwestTransport};
pub use rate_limiter::OutboundRateLimiter;
pub use retry::{BackoffSchedule, RetryPolicy};
