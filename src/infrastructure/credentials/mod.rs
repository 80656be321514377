//! Credentials resolution from the environment
//!
//! A static API key wins over an email/password pair. Values are never
//! logged; only which kind was found.

use thiserror::Error;
use tracing::debug;

use crate::domain::models::Credentials;

/// Static API key variable
pub const API_KEY_VAR: &str = "LEDGERBRIDGE_API_KEY";
/// Login email variable
pub const EMAIL_VAR: &str = "LEDGERBRIDGE_EMAIL";
/// Login password variable
pub const PASSWORD_VAR: &str = "LEDGERBRIDGE_PASSWORD";

/// Errors while resolving credentials
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    /// Only half of the email/password pair is set
    #[error("{present} is set but {missing} is not")]
    IncompletePair {
        /// Variable that was found
        present: &'static str,
        /// Variable that is missing
        missing: &'static str,
    },

    /// A credential variable is set to an empty value
    #[error("{0} is set but empty")]
    Empty(&'static str),
}

/// Resolve credentials from `LEDGERBRIDGE_*` environment variables
///
/// Returns `Ok(None)` when no credential variable is set at all.
pub fn resolve_from_env() -> Result<Option<Credentials>, CredentialsError> {
    resolve_with(|name| std::env::var(name).ok())
}

/// Resolve credentials through an arbitrary variable lookup
pub fn resolve_with(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<Credentials>, CredentialsError> {
    let read = |name: &'static str| -> Result<Option<String>, CredentialsError> {
        match lookup(name) {
            None => Ok(None),
            Some(value) if value.trim().is_empty() => Err(CredentialsError::Empty(name)),
            Some(value) => Ok(Some(value)),
        }
    };

    if let Some(key) = read(API_KEY_VAR)? {
        debug!("using static API key credentials");
        return Ok(Some(Credentials::ApiKey(key)));
    }

    match (read(EMAIL_VAR)?, read(PASSWORD_VAR)?) {
        (Some(email), Some(password)) => {
            debug!("using email/password credentials");
            Ok(Some(Credentials::password(email, password)))
        }
        (Some(_), None) => Err(CredentialsError::IncompletePair {
            present: EMAIL_VAR,
            missing: PASSWORD_VAR,
        }),
        (None, Some(_)) => Err(CredentialsError::IncompletePair {
            present: PASSWORD_VAR,
            missing: EMAIL_VAR,
        }),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::CredentialKind;

    #[test]
    fn test_api_key_wins() {
        temp_env::with_vars(
            [
                (API_KEY_VAR, Some("key-1")),
                (EMAIL_VAR, Some("ops@example.com")),
                (PASSWORD_VAR, Some("secret")),
            ],
            || {
                let credentials = resolve_from_env().unwrap().unwrap();
                assert_eq!(credentials, Credentials::api_key("key-1"));
            },
        );
    }

    #[test]
    fn test_password_pair() {
        temp_env::with_vars(
            [
                (API_KEY_VAR, None),
                (EMAIL_VAR, Some("ops@example.com")),
                (PASSWORD_VAR, Some("secret")),
            ],
            || {
                let credentials = resolve_from_env().unwrap().unwrap();
                assert_eq!(credentials.kind(), CredentialKind::PasswordLogin);
            },
        );
    }

    #[test]
    fn test_nothing_configured() {
        temp_env::with_vars_unset([API_KEY_VAR, EMAIL_VAR, PASSWORD_VAR], || {
            assert_eq!(resolve_from_env(), Ok(None));
        });
    }

    #[test]
    fn test_incomplete_pair() {
        temp_env::with_vars(
            [
                (API_KEY_VAR, None),
                (EMAIL_VAR, Some("ops@example.com")),
                (PASSWORD_VAR, None),
            ],
            || {
                assert_eq!(
                    resolve_from_env(),
                    Err(CredentialsError::IncompletePair {
                        present: EMAIL_VAR,
                        missing: PASSWORD_VAR,
                    })
                );
            },
        );
    }

    #[test]
    fn test_empty_value_rejected() {
        let result = resolve_with(|name| (name == API_KEY_VAR).then(|| "  ".to_string()));
        assert_eq!(result, Err(CredentialsError::Empty(API_KEY_VAR)));
    }
}
