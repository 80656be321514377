use async_trait::async_trait;
use reqwest::{header, Client as ReqwestClient, Method};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::errors::TransportError;
use crate::domain::models::{ApiConfig, HttpMethod};
use crate::domain::ports::{HttpTransport, TransportRequest, TransportResponse};

/// Build the pooled reqwest client shared by the transport and authenticator
pub fn build_http_client(config: &ApiConfig) -> Result<ReqwestClient, TransportError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );

    ReqwestClient::builder()
        .pool_max_idle_per_host(10)
        .timeout(Duration::from_secs(config.timeout_secs))
        .tcp_nodelay(true)
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .build()
        .map_err(|e| TransportError::InvalidRequest(format!("Failed to build HTTP client: {e}")))
}

/// Join a base URL and a path without doubling or dropping slashes
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Map a reqwest failure onto the transport taxonomy
pub(crate) fn classify_reqwest_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// reqwest-backed [`HttpTransport`]
///
/// Performs exactly one attempt per call; retry, auth handling and caching
/// live in the request orchestrator.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: ReqwestClient,
    base_url: String,
}

impl ReqwestTransport {
    /// Create a transport from API configuration
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        Ok(Self::with_client(build_http_client(config)?, &config.base_url))
    }

    /// Create a transport around an existing client
    pub fn with_client(http_client: ReqwestClient, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = join_url(&self.base_url, &request.path);
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
        };

        debug!("{} {}", method, url);

        let response = self
            .http_client
            .request(method, &url)
            .query(&request.query)
            .header(request.auth.name.as_str(), request.auth.value.as_str())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        debug!(status, bytes = body.len(), "response received");
        Ok(TransportResponse { status, body })
    }
}
