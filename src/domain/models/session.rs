//! Domain models for authenticated sessions against the accounting API.
//!
//! A session holds the bearer token handed out by the remote login endpoint
//! (or a long-lived API key) together with its expiry. Tokens never leave
//! this module in `Debug` output.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the process authenticates against the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Email/password login exchanged for an expiring bearer token
    PasswordLogin,
    /// Long-lived API key sent unchanged on every call
    StaticApiKey,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PasswordLogin => write!(f, "password_login"),
            Self::StaticApiKey => write!(f, "static_api_key"),
        }
    }
}

/// Resolved credential values handed to the session manager
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Email/password pair for the login endpoint
    Password {
        /// Account email
        email: String,
        /// Account password
        password: String,
    },
    /// Static API key
    ApiKey(String),
}

impl Credentials {
    /// Build password credentials
    pub fn password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Build API key credentials
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(key.into())
    }

    /// Credential kind these values authenticate with
    pub const fn kind(&self) -> CredentialKind {
        match self {
            Self::Password { .. } => CredentialKind::PasswordLogin,
            Self::ApiKey(_) => CredentialKind::StaticApiKey,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::ApiKey(_) => f.debug_tuple("ApiKey").field(&"[REDACTED]").finish(),
        }
    }
}

/// Token material returned by a successful login or refresh call
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Bearer token
    pub access_token: String,
    /// Absolute expiry, `None` when the token does not expire
    pub expires_at: Option<DateTime<Utc>>,
    /// Refresh token, when the remote API issues one
    pub refresh_token: Option<String>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// The single live session of the process
///
/// Owned by the session manager; callers only ever get clones.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    expires_at: Option<DateTime<Utc>>,
    credential_kind: CredentialKind,
    refresh_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session from freshly issued token material
    pub fn from_issued(issued: IssuedToken, kind: CredentialKind, now: DateTime<Utc>) -> Self {
        Self {
            token: issued.access_token,
            expires_at: issued.expires_at,
            credential_kind: kind,
            refresh_token: issued.refresh_token,
            created_at: now,
        }
    }

    /// Create a non-expiring session around a static API key
    pub fn static_key(key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            token: key.into(),
            expires_at: None,
            credential_kind: CredentialKind::StaticApiKey,
            refresh_token: None,
            created_at: now,
        }
    }

    /// Token value
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry instant, `None` for non-expiring credentials
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Credential kind
    pub const fn credential_kind(&self) -> CredentialKind {
        self.credential_kind
    }

    /// Refresh token issued with this session, if any
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// When the session was established
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the token can still be handed out at `now`
    ///
    /// A token is usable while `now < expires_at - safety_margin`.
    pub fn is_usable_at(&self, now: DateTime<Utc>, safety_margin: Duration) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at
                .checked_sub_signed(safety_margin)
                .is_some_and(|deadline| now < deadline),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("credential_kind", &self.credential_kind)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("created_at", &self.created_at)
            .finish()
    }
}
