use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::client::{build_http_client, join_url};
use crate::domain::errors::{AuthError, TransportError};
use crate::domain::models::{ApiConfig, Credentials, IssuedToken};
use crate::domain::ports::Authenticator;
use crate::infrastructure::logging::sanitize_body;

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// Token payload as returned by the login and refresh endpoints
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "token", alias = "accessToken")]
    access_token: String,
    #[serde(default, alias = "expiresIn")]
    expires_in: Option<i64>,
    #[serde(default, alias = "expiresAt")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_issued(self, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        // An absolute expiry wins over a relative one.
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => Some(at),
            (None, Some(secs)) => Some(relative_expiry(now, secs)?),
            (None, None) => None,
        };
        Ok(IssuedToken {
            access_token: self.access_token,
            expires_at,
            refresh_token: self.refresh_token,
        })
    }
}

fn relative_expiry(now: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, AuthError> {
    if secs < 0 {
        return Err(AuthError::MalformedResponse(format!(
            "token response carries a negative expires_in ({secs})"
        )));
    }
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AuthError::MalformedResponse(format!(
                "token response expires_in ({secs}) is out of range"
            ))
        })
}

#[derive(Clone, Copy)]
enum Endpoint {
    Login,
    Refresh,
}

/// reqwest-backed [`Authenticator`] for the login/refresh/logout endpoints
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    http_client: ReqwestClient,
    base_url: String,
    login_path: String,
    refresh_path: Option<String>,
    logout_path: Option<String>,
}

impl HttpAuthenticator {
    /// Create an authenticator from API configuration
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        Ok(Self::with_client(build_http_client(config)?, config))
    }

    /// Create an authenticator around an existing client
    pub fn with_client(http_client: ReqwestClient, config: &ApiConfig) -> Self {
        Self {
            http_client,
            base_url: config.base_url.clone(),
            login_path: config.login_path.clone(),
            refresh_path: config.refresh_path.clone(),
            logout_path: config.logout_path.clone(),
        }
    }

    async fn request_token<B: Serialize + Sync>(
        &self,
        endpoint: Endpoint,
        path: &str,
        body: &B,
    ) -> Result<IssuedToken, AuthError> {
        let url = join_url(&self.base_url, path);
        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| map_send_error(&e))?;

        if !status.is_success() {
            return Err(classify_status(endpoint, status, &text));
        }

        let token: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| AuthError::MalformedResponse(format!("token response: {e}")))?;
        if token.access_token.is_empty() {
            return Err(AuthError::MalformedResponse(
                "token response carries an empty access token".to_string(),
            ));
        }

        token.into_issued(Utc::now())
    }
}

fn map_send_error(err: &reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Timeout
    } else {
        AuthError::Network(sanitize_body(&err.to_string()))
    }
}

fn classify_status(endpoint: Endpoint, status: StatusCode, body: &str) -> AuthError {
    let message = sanitize_body(body);
    let code = status.as_u16();
    match (endpoint, code) {
        (Endpoint::Login, 400 | 401 | 403 | 422) => AuthError::InvalidCredentials(message),
        (Endpoint::Refresh, 400 | 401 | 403) => AuthError::RefreshRejected(message),
        (_, 408) => AuthError::Timeout,
        (_, 429) | (_, 500..=599) => AuthError::Server {
            status: code,
            message,
        },
        _ => AuthError::MalformedResponse(format!("unexpected status {code}: {message}")),
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    #[instrument(skip_all, fields(kind = %credentials.kind()))]
    async fn login(&self, credentials: &Credentials) -> Result<IssuedToken, AuthError> {
        let Credentials::Password { email, password } = credentials else {
            return Err(AuthError::InvalidCredentials(
                "static API keys cannot be exchanged for a session".to_string(),
            ));
        };

        debug!(path = %self.login_path, "requesting session token");
        self.request_token(Endpoint::Login, &self.login_path, &LoginBody { email, password })
            .await
    }

    fn supports_refresh(&self) -> bool {
        self.refresh_path.is_some()
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<IssuedToken, AuthError> {
        let Some(path) = &self.refresh_path else {
            return Err(AuthError::RefreshRejected(
                "no refresh endpoint configured".to_string(),
            ));
        };

        debug!(path = %path, "refreshing session token");
        self.request_token(Endpoint::Refresh, path, &RefreshBody { refresh_token })
            .await
    }

    #[instrument(skip_all)]
    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let Some(path) = &self.logout_path else {
            return Ok(());
        };

        let response = self
            .http_client
            .post(join_url(&self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "logout was not acknowledged");
            Err(AuthError::Server {
                status: status.as_u16(),
                message: sanitize_body(&body),
            })
        }
    }
}
