use async_trait::async_trait;

use crate::domain::errors::AuthError;
use crate::domain::models::{Credentials, IssuedToken};

/// Remote authentication protocol
///
/// Implementations talk to the API's login/refresh/logout endpoints. They
/// never store tokens; the session manager owns session state.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange credentials for a token
    async fn login(&self, credentials: &Credentials) -> Result<IssuedToken, AuthError>;

    /// Whether this authenticator can renew tokens without a full login
    fn supports_refresh(&self) -> bool {
        false
    }

    /// Renew a session using its refresh token
    async fn refresh(&self, refresh_token: &str) -> Result<IssuedToken, AuthError> {
        let _ = refresh_token;
        Err(AuthError::RefreshRejected(
            "refresh is not supported by this API".to_string(),
        ))
    }

    /// End a session on the remote side
    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let _ = token;
        Ok(())
    }
}
