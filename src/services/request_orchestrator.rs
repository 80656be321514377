//! Request orchestrator: cache lookup, authenticated HTTP with bounded
//! retries, response classification and cache population.
//!
//! Each fetch runs this state machine:
//!
//! ```text
//! cache lookup ──hit──▶ return cached value
//!      │ miss / force
//!      ▼
//! get token ──AuthError──▶ fail
//!      ▼
//! attempt ──2xx──▶ parse ──▶ cache write ──▶ return
//!      ├──401/403 (first)──▶ invalidate session, next attempt
//!      ├──401/403 (again)──▶ fail (Auth)
//!      ├──408/425/429/5xx, network──▶ backoff, next attempt (bounded)
//!      └──other 4xx──▶ fail (Client)
//! ```
//!
//! Nothing is cached unless a 2xx body parsed as JSON.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use crate::domain::errors::{AuthError, FetchError, TransportError};
use crate::domain::models::{
    CacheCategory, CredentialKind, ConnectivityReport, HttpMethod, QueryParams,
    RequestDescriptor,
};
use crate::domain::ports::{AuthHeader, HttpTransport, TransportRequest, TransportResponse};
use crate::infrastructure::http::{OutboundRateLimiter, RetryPolicy};
use crate::infrastructure::logging::sanitize_body;
use crate::services::{SessionManager, TieredCache};

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(120);

/// Classified result of one HTTP attempt
#[derive(Debug)]
enum AttemptOutcome {
    Success { status: u16, value: Value },
    AuthRejected { status: u16, message: String },
    Transient { status: Option<u16>, reason: String },
    Failed(FetchError),
}

/// Serves fetches from the cache or the remote API
pub struct RequestOrchestrator {
    cache: Arc<TieredCache>,
    sessions: SessionManager,
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
    rate_limiter: Option<Arc<OutboundRateLimiter>>,
    api_key_header: Option<String>,
    attempt_timeout: Duration,
    total_timeout: Duration,
}

impl RequestOrchestrator {
    /// Create an orchestrator with default timeouts and no rate limiting
    pub fn new(
        cache: Arc<TieredCache>,
        sessions: SessionManager,
        transport: Arc<dyn HttpTransport>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            sessions,
            transport,
            retry,
            rate_limiter: None,
            api_key_header: None,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            total_timeout: DEFAULT_TOTAL_TIMEOUT,
        }
    }

    /// Throttle every attempt through `limiter`
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<OutboundRateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Send static API keys in `header` instead of `Authorization: Bearer`
    #[must_use]
    pub fn with_api_key_header(mut self, header: Option<String>) -> Self {
        self.api_key_header = header;
        self
    }

    /// Bound a single HTTP attempt
    #[must_use]
    pub const fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Bound a whole fetch, retries and backoff included
    #[must_use]
    pub const fn with_total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = timeout;
        self
    }

    /// The cache this orchestrator reads and populates
    pub const fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// The session manager supplying tokens
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Serve `descriptor` from the cache, or fetch and cache it
    ///
    /// A cache hit returns without fetching a token or touching the
    /// network. `force_refresh` skips the lookup but still writes the fresh
    /// value back.
    #[instrument(
        skip(self, descriptor),
        fields(
            request_id = %Uuid::new_v4(),
            category = %descriptor.category(),
            cache_key = %descriptor.cache_key(),
            force = descriptor.force_refresh(),
        ),
        err
    )]
    pub async fn fetch(&self, descriptor: RequestDescriptor) -> Result<Value, FetchError> {
        if !descriptor.force_refresh() {
            if let Some(value) = self.cache.get(descriptor.cache_key()) {
                debug!("cache hit");
                return Ok(value);
            }
        }

        let value = tokio::time::timeout(self.total_timeout, self.fetch_remote(&descriptor))
            .await
            .map_err(|_| FetchError::DeadlineExceeded {
                timeout_secs: self.total_timeout.as_secs(),
            })??;

        self.cache.set(
            descriptor.cache_key().clone(),
            value.clone(),
            descriptor.category(),
        );
        Ok(value)
    }

    async fn fetch_remote(&self, descriptor: &RequestDescriptor) -> Result<Value, FetchError> {
        let mut schedule = self.retry.schedule();
        let mut attempts = 0_u32;
        let mut retries = 0_u32;
        let mut auth_retried = false;

        loop {
            let token = self.sessions.get_valid_token().await?;
            attempts += 1;

            let outcome = self
                .attempt(
                    descriptor.method(),
                    descriptor.path(),
                    descriptor.query_params(),
                    &token,
                )
                .await;

            match outcome {
                AttemptOutcome::Success { status, value } => {
                    info!(attempts, status, "fetched from remote");
                    return Ok(value);
                }
                AttemptOutcome::AuthRejected { status, message } => {
                    let static_key =
                        self.sessions.credential_kind() == Some(CredentialKind::StaticApiKey);
                    if auth_retried || static_key {
                        warn!(status, attempts, "authorization rejected");
                        return Err(AuthError::Rejected { status, message }.into());
                    }
                    debug!(status, "authorization rejected, renewing session once");
                    auth_retried = true;
                    self.sessions.invalidate_if_current(&token);
                }
                AttemptOutcome::Transient { status, reason } => {
                    if !self.retry.allows_retry(retries) {
                        warn!(attempts, ?status, %reason, "retry budget exhausted");
                        return Err(FetchError::Transient {
                            attempts,
                            status,
                            reason,
                        });
                    }
                    let delay = schedule.next_delay();
                    retries += 1;
                    warn!(
                        attempt = attempts,
                        ?status,
                        %reason,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                AttemptOutcome::Failed(err) => return Err(err),
            }
        }
    }

    async fn attempt(
        &self,
        method: HttpMethod,
        path: &str,
        query: &QueryParams,
        token: &str,
    ) -> AttemptOutcome {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let request = TransportRequest {
            method,
            path: path.to_string(),
            query: query.clone(),
            auth: self.auth_header(token),
        };

        let result = tokio::time::timeout(self.attempt_timeout, self.transport.send(&request))
            .await
            .unwrap_or(Err(TransportError::Timeout));

        match result {
            Ok(response) => classify_response(response),
            Err(err) if err.is_transient() => AttemptOutcome::Transient {
                status: None,
                reason: err.to_string(),
            },
            Err(err) => AttemptOutcome::Failed(FetchError::InvalidRequest(err.to_string())),
        }
    }

    fn auth_header(&self, token: &str) -> AuthHeader {
        match (&self.api_key_header, self.sessions.credential_kind()) {
            (Some(header), Some(CredentialKind::StaticApiKey)) => {
                AuthHeader::custom(header.as_str(), token)
            }
            _ => AuthHeader::bearer(token),
        }
    }

    /// Probe `probe_path` once with a valid token
    ///
    /// Never reads or writes the cache and never retries.
    #[instrument(skip(self), fields(request_id = %Uuid::new_v4(), outcome = tracing::field::Empty))]
    pub async fn test_connectivity(&self, probe_path: &str) -> ConnectivityReport {
        let started = Instant::now();
        let credential_kind = self.sessions.credential_kind();
        let elapsed_ms =
            |started: Instant| u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let token = match self.sessions.get_valid_token().await {
            Ok(token) => token,
            Err(err) => {
                let reachable = !matches!(
                    err,
                    AuthError::MissingCredentials | AuthError::Network(_) | AuthError::Timeout
                );
                Span::current().record("outcome", "auth_failed");
                return ConnectivityReport {
                    reachable,
                    authenticated: false,
                    credential_kind,
                    latency_ms: elapsed_ms(started),
                    status: None,
                    error: Some(err.to_string()),
                };
            }
        };

        let outcome = self
            .attempt(HttpMethod::Get, probe_path, &QueryParams::new(), &token)
            .await;

        let (reachable, authenticated, status, error) = match outcome {
            AttemptOutcome::Success { status, .. } => (true, true, Some(status), None),
            AttemptOutcome::AuthRejected { status, message } => {
                // A rejected token is worthless to later callers too.
                self.sessions.invalidate_if_current(&token);
                (true, false, Some(status), Some(message))
            }
            AttemptOutcome::Transient { status, reason } => {
                (status.is_some(), false, status, Some(reason))
            }
            AttemptOutcome::Failed(err) => (true, true, err.status(), Some(err.to_string())),
        };

        Span::current().record("outcome", if error.is_none() { "ok" } else { "degraded" });
        ConnectivityReport {
            reachable,
            authenticated,
            credential_kind,
            latency_ms: elapsed_ms(started),
            status,
            error,
        }
    }

    /// Drop every cached response
    pub fn clear_cache(&self) -> usize {
        self.cache.invalidate_all()
    }

    /// Drop cached responses of one category
    pub fn clear_category(&self, category: CacheCategory) -> usize {
        self.cache.invalidate_category(category)
    }
}

impl std::fmt::Debug for RequestOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOrchestrator")
            .field("retry", &self.retry)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("total_timeout", &self.total_timeout)
            .finish_non_exhaustive()
    }
}

fn classify_response(response: TransportResponse) -> AttemptOutcome {
    let status = response.status;
    match status {
        200..=299 => {
            if response.body.trim().is_empty() {
                return AttemptOutcome::Success {
                    status,
                    value: Value::Null,
                };
            }
            match serde_json::from_str(&response.body) {
                Ok(value) => AttemptOutcome::Success { status, value },
                Err(e) => AttemptOutcome::Failed(FetchError::MalformedResponse(format!(
                    "invalid JSON in {status} response: {e}"
                ))),
            }
        }
        401 | 403 => AttemptOutcome::AuthRejected {
            status,
            message: sanitize_body(&response.body),
        },
        408 | 425 | 429 | 500..=599 => AttemptOutcome::Transient {
            status: Some(status),
            reason: format!("HTTP {status}: {}", sanitize_body(&response.body)),
        },
        _ => AttemptOutcome::Failed(FetchError::Client {
            status,
            message: sanitize_body(&response.body),
        }),
    }
}
