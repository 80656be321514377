use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::domain::errors::{AuthError, FetchError};
use crate::domain::models::{
    CacheCategory, CacheStatistics, Config, ConnectivityReport, Credentials, RequestDescriptor,
    Session,
};
use crate::infrastructure::credentials;
use crate::infrastructure::http::{
    build_http_client, HttpAuthenticator, OutboundRateLimiter, ReqwestTransport, RetryPolicy,
};
use crate::services::{
    RequestOrchestrator, SessionManager, SessionPolicy, SessionStatus, TieredCache,
};

/// Fully wired client for the accounting API
///
/// Owns the session manager, the response cache (plus its background
/// sweeper) and the request orchestrator. One gateway per process is the
/// intended use; clones of the inner components share state.
///
/// # Examples
///
/// ```no_run
/// use ledgerbridge::application::Gateway;
/// use ledgerbridge::domain::models::{CacheCategory, Config, RequestDescriptor};
///
/// # async fn example() -> anyhow::Result<()> {
/// let gateway = Gateway::from_env(Config::default())?;
/// let invoices = gateway
///     .fetch(
///         RequestDescriptor::get(CacheCategory::Transactional, "/invoices")
///             .param("status", "open")
///             .build(),
///     )
///     .await?;
/// println!("{invoices}");
/// gateway.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Gateway {
    config: Config,
    orchestrator: RequestOrchestrator,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    /// Build every component from `config` and explicit credentials
    ///
    /// The expiry sweeper only starts when called inside a tokio runtime.
    pub fn init(config: Config, credentials: Option<Credentials>) -> Result<Self> {
        let http_client =
            build_http_client(&config.api).context("Failed to build HTTP client")?;
        let transport = ReqwestTransport::with_client(http_client.clone(), &config.api.base_url);
        let authenticator = HttpAuthenticator::with_client(http_client, &config.api);

        let sessions = SessionManager::new(
            Arc::new(authenticator),
            credentials,
            SessionPolicy::from(&config.session),
        );
        let cache = Arc::new(TieredCache::new(config.cache.ttl, config.cache.max_size));

        let sweeper = (config.cache.sweep_interval_secs > 0
            && tokio::runtime::Handle::try_current().is_ok())
        .then(|| cache.spawn_sweeper(Duration::from_secs(config.cache.sweep_interval_secs)));

        let orchestrator = RequestOrchestrator::new(
            cache,
            sessions,
            Arc::new(transport),
            RetryPolicy::from(&config.retry),
        )
        .with_rate_limiter(Arc::new(OutboundRateLimiter::from(&config.rate_limit)))
        .with_api_key_header(config.api.api_key_header.clone())
        .with_attempt_timeout(Duration::from_secs(config.api.timeout_secs))
        .with_total_timeout(Duration::from_secs(config.retry.total_timeout_secs));

        info!(
            base_url = %config.api.base_url,
            credential_kind = ?orchestrator.sessions().credential_kind(),
            sweeper = sweeper.is_some(),
            "gateway initialized"
        );

        Ok(Self {
            config,
            orchestrator,
            sweeper: Mutex::new(sweeper),
        })
    }

    /// Build every component with credentials from `LEDGERBRIDGE_*` variables
    pub fn from_env(config: Config) -> Result<Self> {
        let credentials =
            credentials::resolve_from_env().context("Failed to resolve credentials")?;
        Self::init(config, credentials)
    }

    /// Effective configuration
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Serve a request from the cache or the remote API
    pub async fn fetch(&self, descriptor: RequestDescriptor) -> Result<Value, FetchError> {
        self.orchestrator.fetch(descriptor).await
    }

    /// Authenticate explicitly, replacing the configured credentials
    pub async fn login(&self, credentials: Credentials) -> Result<Session, AuthError> {
        self.orchestrator.sessions().login(credentials).await
    }

    /// Drop the current session; the next call re-authenticates
    pub fn invalidate_session(&self) {
        self.orchestrator.sessions().invalidate();
    }

    /// Non-secret snapshot of the session state
    pub fn session_status(&self) -> SessionStatus {
        self.orchestrator.sessions().status()
    }

    /// Drop all cached responses, or those of one category
    pub fn clear_cache(&self, category: Option<CacheCategory>) -> usize {
        let removed = category.map_or_else(
            || self.orchestrator.clear_cache(),
            |category| self.orchestrator.clear_category(category),
        );
        debug!(removed, ?category, "cache cleared");
        removed
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStatistics {
        self.orchestrator.cache().stats()
    }

    /// Probe `probe_path`, or the configured probe path
    pub async fn test_connectivity(&self, probe_path: Option<&str>) -> ConnectivityReport {
        let path = probe_path.unwrap_or(&self.config.api.probe_path);
        self.orchestrator.test_connectivity(path).await
    }

    /// Stop the sweeper and end the session
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = sweeper {
            handle.abort();
        }
        self.orchestrator.sessions().shutdown().await;
        info!("gateway shut down");
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        if let Some(handle) = self
            .sweeper
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.config.api.base_url)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
