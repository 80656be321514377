//! Error taxonomy for authentication, transport and fetch operations.

use thiserror::Error;

/// Errors raised while establishing or renewing a session
///
/// `Clone` because a single in-flight refresh hands its result to every
/// waiting caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No credentials were configured
    #[error("No credentials configured")]
    MissingCredentials,

    /// The login endpoint rejected the credentials (HTTP 400/401/403)
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The refresh endpoint rejected the refresh token
    #[error("Token refresh rejected: {0}")]
    RefreshRejected(String),

    /// The API kept rejecting a freshly obtained token
    #[error("Authorization rejected by API ({status}): {message}")]
    Rejected {
        /// HTTP status of the last rejection (401 or 403)
        status: u16,
        /// Scrubbed response body
        message: String,
    },

    /// The auth endpoint could not be reached
    #[error("Network error during authentication: {0}")]
    Network(String),

    /// The auth endpoint timed out
    #[error("Authentication request timed out")]
    Timeout,

    /// The auth endpoint failed with a server error
    #[error("Authentication server error ({status}): {message}")]
    Server {
        /// HTTP status
        status: u16,
        /// Scrubbed response body
        message: String,
    },

    /// The auth endpoint answered with something that is not a token
    #[error("Malformed authentication response: {0}")]
    MalformedResponse(String),
}

impl AuthError {
    /// Returns true if retrying the same credentials later may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::Server { .. }
        )
    }

    /// Returns true if the user has to fix the configured credentials
    pub const fn requires_reconfiguration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials | Self::InvalidCredentials(_) | Self::Rejected { .. }
        )
    }
}

/// Network-level failure of a single HTTP attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The attempt exceeded its timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection could not be established or was reset
    #[error("Connection error: {0}")]
    Connect(String),

    /// The request could not be built (bad URL, invalid header value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other I/O failure while sending or reading the body
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Returns true if the attempt may succeed when repeated
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

/// Classified outcome of a failed fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// No usable token could be obtained, or the API rejected it twice
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Timeouts, connection failures or 5xx after the retry budget ran out
    #[error("Transient failure after {attempts} attempt(s): {reason}")]
    Transient {
        /// HTTP attempts made
        attempts: u32,
        /// Last HTTP status, if the server answered
        status: Option<u16>,
        /// Description of the last failure
        reason: String,
    },

    /// Non-auth 4xx; not retried
    #[error("Client error ({status}): {message}")]
    Client {
        /// HTTP status
        status: u16,
        /// Scrubbed response body
        message: String,
    },

    /// 2xx response whose body is not valid JSON
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The request itself could not be issued
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The whole fetch, retries included, exceeded its deadline
    #[error("Fetch deadline of {timeout_secs}s exceeded")]
    DeadlineExceeded {
        /// Configured deadline
        timeout_secs: u64,
    },
}

/// Coarse classification of a [`FetchError`] for callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Credentials or session problem
    Auth,
    /// Worth retrying later
    Transient,
    /// Caller asked for something the API refuses
    Client,
    /// The API answered with garbage or the request was unusable
    Fatal,
}

impl FetchError {
    /// Coarse classification
    pub const fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Auth(_) => FetchErrorKind::Auth,
            Self::Transient { .. } | Self::DeadlineExceeded { .. } => FetchErrorKind::Transient,
            Self::Client { .. } => FetchErrorKind::Client,
            Self::MalformedResponse(_) | Self::InvalidRequest(_) => FetchErrorKind::Fatal,
        }
    }

    /// Returns true if the caller may retry later
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Auth(err) => err.is_transient(),
            Self::Transient { .. } | Self::DeadlineExceeded { .. } => true,
            _ => false,
        }
    }

    /// Returns true if the user must reconfigure credentials
    pub const fn requires_reconfiguration(&self) -> bool {
        match self {
            Self::Auth(err) => err.requires_reconfiguration(),
            _ => false,
        }
    }

    /// Remote HTTP status associated with the error, if any
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Auth(AuthError::Rejected { status, .. } | AuthError::Server { status, .. })
            | Self::Client { status, .. } => Some(*status),
            Self::Transient { status, .. } => *status,
            _ => None,
        }
    }
}
