use serde::Serialize;

use super::session::CredentialKind;

/// Result of a connectivity probe
///
/// Produced by a single authenticated request against a cheap resource.
/// Probes never touch the response cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityReport {
    /// The API (or its auth endpoint) answered at all
    pub reachable: bool,
    /// A token was obtained and accepted
    pub authenticated: bool,
    /// Kind of the configured credentials
    pub credential_kind: Option<CredentialKind>,
    /// Wall time of the probe including authentication
    pub latency_ms: u64,
    /// HTTP status of the probe request, if one was answered
    pub status: Option<u16>,
    /// Scrubbed description of the failure, if any
    pub error: Option<String>,
}

impl ConnectivityReport {
    /// Reachable and authenticated without error
    pub const fn is_healthy(&self) -> bool {
        self.reachable && self.authenticated && self.error.is_none()
    }
}
