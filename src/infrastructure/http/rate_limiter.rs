use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

use crate::domain::models::RateLimitConfig;

/// Token bucket in front of every outbound HTTP attempt
///
/// Keeps the process under the remote API's request quota; callers wait in
/// `acquire` instead of collecting 429s.
pub struct OutboundRateLimiter {
    limiter: DefaultDirectRateLimiter,
    quota: Quota,
}

impl std::fmt::Debug for OutboundRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundRateLimiter")
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

impl OutboundRateLimiter {
    /// Create a limiter allowing `requests_per_second` with bursts of `burst_size`
    ///
    /// Zero values are raised to one.
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst_size).unwrap_or(NonZeroU32::MIN);

        let quota = Quota::per_second(rate).allow_burst(burst);

        Self {
            limiter: RateLimiter::direct(quota),
            quota,
        }
    }

    /// Wait until a request may be sent
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

impl From<&RateLimitConfig> for OutboundRateLimiter {
    fn from(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }
}
