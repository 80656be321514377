use async_trait::async_trait;

use crate::domain::errors::TransportError;
use crate::domain::models::{HttpMethod, QueryParams};

/// Credential header attached to an outbound request
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeader {
    /// Header name, e.g. `Authorization`
    pub name: String,
    /// Full header value, e.g. `Bearer <token>`
    pub value: String,
}

impl AuthHeader {
    /// `Authorization: Bearer <token>`
    pub fn bearer(token: &str) -> Self {
        Self {
            name: "Authorization".to_string(),
            value: format!("Bearer {token}"),
        }
    }

    /// A custom header carrying the raw key
    pub fn custom(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeader")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// One HTTP attempt
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Method
    pub method: HttpMethod,
    /// Path relative to the base URL
    pub path: String,
    /// Query string
    pub query: QueryParams,
    /// Credential header
    pub auth: AuthHeader,
}

/// Raw HTTP response, classified by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl TransportResponse {
    /// Build a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Outbound HTTP seam used by the request orchestrator
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform a single attempt; never retries
    ///
    /// Non-2xx responses are returned as `Ok`; only network-level failures
    /// produce `Err`.
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}
