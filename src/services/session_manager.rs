//! Session manager: owns the process-wide session and keeps it fresh.
//!
//! Renewal is single-flight. The first caller that finds the session stale
//! starts one shared renewal future; everyone else arriving before it
//! completes awaits the same future and receives the same result. The
//! renewal stores its own result, so a caller abandoning the wait does not
//! lose a token another caller is waiting on.

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::AuthError;
use crate::domain::models::config::MAX_SAFETY_MARGIN_SECS;
use crate::domain::models::{CredentialKind, Credentials, Session, SessionConfig};
use crate::domain::ports::{Authenticator, Clock, SystemClock};

type Renewal = Shared<BoxFuture<'static, Result<Session, AuthError>>>;

/// Tunables of the session manager
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// A token is stale once `now >= expires_at - safety_margin`
    pub safety_margin: Duration,
    /// Fall back to a full login when a refresh is rejected
    pub relogin_on_refresh_failure: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionPolicy {
    #[allow(clippy::cast_possible_wrap)]
    fn from(config: &SessionConfig) -> Self {
        Self {
            safety_margin: Duration::seconds(
                config.safety_margin_secs.min(MAX_SAFETY_MARGIN_SECS) as i64,
            ),
            relogin_on_refresh_failure: config.relogin_on_refresh_failure,
        }
    }
}

/// Non-secret view of the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    /// Kind of configured credentials, `None` when unconfigured
    pub credential_kind: Option<CredentialKind>,
    /// Whether a session is currently held
    pub has_session: bool,
    /// Expiry of the held session
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether a renewal is in flight
    pub renewing: bool,
}

#[derive(Default)]
struct SessionState {
    credentials: Option<Credentials>,
    session: Option<Session>,
    renewal: Option<(u64, Renewal)>,
    next_renewal_id: u64,
    // Bumped on shutdown so a renewal finishing afterwards is discarded.
    epoch: u64,
}

struct Inner {
    state: Mutex<SessionState>,
    authenticator: Arc<dyn Authenticator>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn renew(
        &self,
        stale: Option<Session>,
        credentials: Credentials,
    ) -> Result<Session, AuthError> {
        let refresh_token = stale
            .as_ref()
            .and_then(Session::refresh_token)
            .filter(|_| self.authenticator.supports_refresh())
            .map(str::to_string);

        if let Some(refresh_token) = refresh_token {
            debug!("refreshing session with refresh token");
            match self.authenticator.refresh(&refresh_token).await {
                Ok(mut issued) => {
                    if issued.refresh_token.is_none() {
                        issued.refresh_token = Some(refresh_token);
                    }
                    info!(expires_at = ?issued.expires_at, "session refreshed");
                    return Ok(Session::from_issued(
                        issued,
                        credentials.kind(),
                        self.clock.now(),
                    ));
                }
                Err(err) if err.is_transient() || !self.policy.relogin_on_refresh_failure => {
                    warn!(error = %err, "session refresh failed");
                    return Err(err);
                }
                Err(err) => {
                    warn!(error = %err, "session refresh rejected, falling back to login");
                }
            }
        }

        let issued = self.authenticator.login(&credentials).await?;
        info!(expires_at = ?issued.expires_at, "logged in");
        Ok(Session::from_issued(
            issued,
            credentials.kind(),
            self.clock.now(),
        ))
    }

    fn finish_renewal(&self, id: u64, epoch: u64, result: &Result<Session, AuthError>) {
        let mut state = self.lock();
        if state.renewal.as_ref().is_some_and(|(current, _)| *current == id) {
            state.renewal = None;
        }
        if state.epoch != epoch {
            debug!("discarding renewal result after shutdown");
            return;
        }
        match result {
            Ok(session) => state.session = Some(session.clone()),
            // Never fall back to the stale token.
            Err(_) => state.session = None,
        }
    }
}

/// Owner of the single live session of the process
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager on the system clock
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        credentials: Option<Credentials>,
        policy: SessionPolicy,
    ) -> Self {
        Self::with_clock(authenticator, credentials, policy, Arc::new(SystemClock))
    }

    /// Create a manager on an injected clock
    pub fn with_clock(
        authenticator: Arc<dyn Authenticator>,
        credentials: Option<Credentials>,
        policy: SessionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let session = match &credentials {
            Some(Credentials::ApiKey(key)) => Some(Session::static_key(key.clone(), now)),
            _ => None,
        };

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState {
                    credentials,
                    session,
                    ..SessionState::default()
                }),
                authenticator,
                clock,
                policy,
            }),
        }
    }

    /// Return a token that is valid for at least the safety margin
    ///
    /// Static API keys are returned unchanged. A stale or missing session is
    /// renewed first; concurrent callers share one renewal.
    #[instrument(skip(self), err)]
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let renewal = {
            let mut state = self.inner.lock();
            let credentials = match &state.credentials {
                None => return Err(AuthError::MissingCredentials),
                Some(Credentials::ApiKey(key)) => return Ok(key.clone()),
                Some(credentials) => credentials.clone(),
            };

            let now = self.inner.clock.now();
            if let Some(session) = &state.session {
                if session.is_usable_at(now, self.inner.policy.safety_margin) {
                    return Ok(session.token().to_string());
                }
            }

            if let Some((_, renewal)) = &state.renewal {
                debug!("joining in-flight session renewal");
                renewal.clone()
            } else {
                self.start_renewal(&mut state, credentials)
            }
        };

        renewal.await.map(|session| session.token().to_string())
    }

    fn start_renewal(&self, state: &mut SessionState, credentials: Credentials) -> Renewal {
        let id = state.next_renewal_id;
        state.next_renewal_id += 1;
        let epoch = state.epoch;
        let stale = state.session.clone();
        let inner = Arc::clone(&self.inner);

        debug!(renewal_id = id, has_session = stale.is_some(), "starting session renewal");

        let renewal = async move {
            let result = inner.renew(stale, credentials).await;
            inner.finish_renewal(id, epoch, &result);
            result
        }
        .boxed()
        .shared();

        state.renewal = Some((id, renewal.clone()));
        renewal
    }

    /// Authenticate with `credentials` and make them the configured ones
    ///
    /// On failure the existing credentials and session are left untouched.
    #[instrument(skip_all, fields(kind = %credentials.kind()), err)]
    pub async fn login(&self, credentials: Credentials) -> Result<Session, AuthError> {
        let session = match &credentials {
            Credentials::ApiKey(key) => Session::static_key(key.clone(), self.inner.clock.now()),
            Credentials::Password { .. } => {
                let issued = self.inner.authenticator.login(&credentials).await?;
                Session::from_issued(issued, credentials.kind(), self.inner.clock.now())
            }
        };

        let mut state = self.inner.lock();
        state.credentials = Some(credentials);
        state.session = Some(session.clone());
        info!(expires_at = ?session.expires_at(), "session established");
        Ok(session)
    }

    /// Drop the current session; the next call re-authenticates
    ///
    /// Static API key sessions are kept, since there is nothing to renew.
    pub fn invalidate(&self) {
        let mut state = self.inner.lock();
        if matches!(state.credentials, Some(Credentials::ApiKey(_))) {
            return;
        }
        if state.session.take().is_some() {
            info!("session invalidated");
        }
    }

    /// Drop the session only if it still carries `token`
    ///
    /// Used after a 401/403 so that a rejection of an old token does not
    /// discard a session another caller has just obtained.
    pub fn invalidate_if_current(&self, token: &str) -> bool {
        let mut state = self.inner.lock();
        if matches!(state.credentials, Some(Credentials::ApiKey(_))) {
            return false;
        }
        let is_current = state
            .session
            .as_ref()
            .is_some_and(|session| session.token() == token);
        if is_current {
            state.session = None;
            info!("session invalidated after authorization rejection");
        }
        is_current
    }

    /// Best-effort remote logout, then drop all session state
    pub async fn shutdown(&self) {
        let session = {
            let mut state = self.inner.lock();
            state.epoch += 1;
            state.renewal = None;
            state.session.take()
        };

        if let Some(session) = session {
            if session.credential_kind() == CredentialKind::PasswordLogin {
                if let Err(err) = self.inner.authenticator.logout(session.token()).await {
                    warn!(error = %err, "remote logout failed");
                }
            }
            info!("session closed");
        }
    }

    /// Kind of the configured credentials
    pub fn credential_kind(&self) -> Option<CredentialKind> {
        self.inner.lock().credentials.as_ref().map(Credentials::kind)
    }

    /// Non-secret snapshot of the session state
    pub fn status(&self) -> SessionStatus {
        let state = self.inner.lock();
        SessionStatus {
            credential_kind: state.credentials.as_ref().map(Credentials::kind),
            has_session: state.session.is_some(),
            expires_at: state.session.as_ref().and_then(Session::expires_at),
            renewing: state.renewal.is_some(),
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::IssuedToken;
    use crate::domain::ports::ManualClock;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    /// Authenticator issuing `tok-N` tokens valid for `lifetime` seconds
    struct CountingAuthenticator {
        clock: Arc<ManualClock>,
        lifetime: i64,
        logins: AtomicU32,
        refreshes: AtomicU32,
        logouts: AtomicU32,
        delay: std::time::Duration,
        fail_login: bool,
        refresh_result: Option<AuthError>,
        issue_refresh_token: bool,
    }

    impl CountingAuthenticator {
        fn new(clock: Arc<ManualClock>, lifetime: i64) -> Self {
            Self {
                clock,
                lifetime,
                logins: AtomicU32::new(0),
                refreshes: AtomicU32::new(0),
                logouts: AtomicU32::new(0),
                delay: std::time::Duration::ZERO,
                fail_login: false,
                refresh_result: None,
                issue_refresh_token: false,
            }
        }

        fn issue(&self, prefix: &str, n: u32) -> IssuedToken {
            IssuedToken {
                access_token: format!("{prefix}-{n}"),
                expires_at: Some(self.clock.now() + Duration::seconds(self.lifetime)),
                refresh_token: self.issue_refresh_token.then(|| format!("rt-{n}")),
            }
        }
    }

    #[async_trait]
    impl Authenticator for CountingAuthenticator {
        async fn login(&self, _credentials: &Credentials) -> Result<IssuedToken, AuthError> {
            let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_login {
                return Err(AuthError::InvalidCredentials("bad password".to_string()));
            }
            Ok(self.issue("tok", n))
        }

        fn supports_refresh(&self) -> bool {
            true
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<IssuedToken, AuthError> {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.refresh_result {
                Some(err) => Err(err.clone()),
                None => Ok(self.issue("refreshed", n)),
            }
        }

        async fn logout(&self, _token: &str) -> Result<(), AuthError> {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn manager(auth: Arc<CountingAuthenticator>, clock: Arc<ManualClock>) -> SessionManager {
        SessionManager::with_clock(
            auth,
            Some(Credentials::password("ops@example.com", "secret")),
            SessionPolicy::default(),
            clock,
        )
    }

    #[tokio::test]
    async fn test_first_call_logs_in_and_reuses_token() {
        let clock = Arc::new(ManualClock::new(start()));
        let auth = Arc::new(CountingAuthenticator::new(clock.clone(), 3600));
        let sessions = manager(auth.clone(), clock.clone());

        assert_eq!(sessions.get_valid_token().await.unwrap(), "tok-1");
        assert_eq!(sessions.get_valid_token().await.unwrap(), "tok-1");
        assert_eq!(auth.logins.load(Ordering::SeqCst), 1);
        assert!(sessions.status().has_session);
    }

    #[tokio::test]
    async fn test_safety_margin_boundary() {
        let clock = Arc::new(ManualClock::new(start()));
        let auth = Arc::new(CountingAuthenticator::new(clock.clone(), 100));
        let sessions = manager(auth.clone(), clock.clone());

        sessions.get_valid_token().await.unwrap();

        clock.set(start() + Duration::seconds(30));
        assert_eq!(sessions.get_valid_token().await.unwrap(), "tok-1");
        assert_eq!(auth.logins.load(Ordering::SeqCst), 1);

        clock.set(start() + Duration::seconds(41));
        assert_eq!(sessions.get_valid_token().await.unwrap(), "tok-2");
        assert_eq!(auth.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_login() {
        let clock = Arc::new(ManualClock::new(start()));
        let mut auth = CountingAuthenticator::new(clock.clone(), 3600);
        auth.delay = std::time::Duration::from_millis(50);
        let auth = Arc::new(auth);
        let sessions = manager(auth.clone(), clock);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let sessions = sessions.clone();
                tokio::spawn(async move { sessions.get_valid_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "tok-1");
        }
        assert_eq!(auth.logins.load(Ordering::SeqCst), 1);
        assert!(!sessions.status().renewing);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_refresh_of_stale_session() {
        let clock = Arc::new(ManualClock::new(start()));
        let mut auth = CountingAuthenticator::new(clock.clone(), 3600);
        auth.issue_refresh_token = true;
        auth.delay = std::time::Duration::from_millis(50);
        let auth = Arc::new(auth);
        let sessions = manager(auth.clone(), clock.clone());

        assert_eq!(sessions.get_valid_token().await.unwrap(), "tok-1");

        // Inside the 60s safety margin of the one-hour token.
        clock.set(start() + Duration::seconds(3541));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let sessions = sessions.clone();
                tokio::spawn(async move { sessions.get_valid_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "refreshed-1");
        }
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(auth.logins.load(Ordering::SeqCst), 1);
        assert!(!sessions.status().renewing);
    }

    #[test]
    fn test_policy_clamps_safety_margin() {
        let policy = SessionPolicy::from(&SessionConfig {
            safety_margin_secs: u64::MAX,
            ..SessionConfig::default()
        });
        assert_eq!(policy.safety_margin, Duration::days(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_failure() {
        let clock = Arc::new(ManualClock::new(start()));
        let mut auth = CountingAuthenticator::new(clock.clone(), 3600);
        auth.delay = std::time::Duration::from_millis(50);
        auth.fail_login = true;
        let auth = Arc::new(auth);
        let sessions = manager(auth.clone(), clock);

        let results = futures::future::join_all((0..8).map(|_| sessions.get_valid_token())).await;

        assert!(results
            .iter()
            .all(|r| matches!(r, Err(AuthError::InvalidCredentials(_)))));
        assert_eq!(auth.logins.load(Ordering::SeqCst), 1);
        assert!(!sessions.status().has_session);
    }

    #[tokio::test]
    async fn test_refresh_token_is_used_when_available() {
        let clock = Arc::new(ManualClock::new(start()));
        let mut auth = CountingAuthenticator::new(clock.clone(), 100);
        auth.issue_refresh_token = true;
        let auth = Arc::new(auth);
        let sessions = manager(auth.clone(), clock.clone());

        sessions.get_valid_token().await.unwrap();
        clock.advance(Duration::seconds(50));

        assert_eq!(sessions.get_valid_token().await.unwrap(), "refreshed-1");
        assert_eq!(auth.logins.load(Ordering::SeqCst), 1);
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_refresh_falls_back_to_login() {
        let clock = Arc::new(ManualClock::new(start()));
        let mut auth = CountingAuthenticator::new(clock.clone(), 100);
        auth.issue_refresh_token = true;
        auth.refresh_result = Some(AuthError::RefreshRejected("revoked".to_string()));
        let auth = Arc::new(auth);
        let sessions = manager(auth.clone(), clock.clone());

        sessions.get_valid_token().await.unwrap();
        clock.advance(Duration::seconds(50));

        assert_eq!(sessions.get_valid_token().await.unwrap(), "tok-2");
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(auth.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_refresh_without_relogin_surfaces_error() {
        let clock = Arc::new(ManualClock::new(start()));
        let mut auth = CountingAuthenticator::new(clock.clone(), 100);
        auth.issue_refresh_token = true;
        auth.refresh_result = Some(AuthError::RefreshRejected("revoked".to_string()));
        let auth = Arc::new(auth);
        let sessions = SessionManager::with_clock(
            auth.clone(),
            Some(Credentials::password("ops@example.com", "secret")),
            SessionPolicy {
                relogin_on_refresh_failure: false,
                ..SessionPolicy::default()
            },
            clock.clone(),
        );

        sessions.get_valid_token().await.unwrap();
        clock.advance(Duration::seconds(50));

        let err = sessions.get_valid_token().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshRejected(_)));
        assert_eq!(auth.logins.load(Ordering::SeqCst), 1);
        // The stale token is never handed out again.
        assert!(!sessions.status().has_session);
    }

    #[tokio::test]
    async fn test_static_api_key_short_circuits() {
        let clock = Arc::new(ManualClock::new(start()));
        let auth = Arc::new(CountingAuthenticator::new(clock.clone(), 100));
        let sessions = SessionManager::with_clock(
            auth.clone(),
            Some(Credentials::api_key("key-live-123")),
            SessionPolicy::default(),
            clock.clone(),
        );

        clock.advance(Duration::days(365));
        assert_eq!(sessions.get_valid_token().await.unwrap(), "key-live-123");
        sessions.invalidate();
        assert!(!sessions.invalidate_if_current("key-live-123"));
        assert_eq!(sessions.get_valid_token().await.unwrap(), "key-live-123");
        assert_eq!(auth.logins.load(Ordering::SeqCst), 0);
        assert_eq!(sessions.credential_kind(), Some(CredentialKind::StaticApiKey));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let clock = Arc::new(ManualClock::new(start()));
        let auth = Arc::new(CountingAuthenticator::new(clock.clone(), 100));
        let sessions =
            SessionManager::with_clock(auth, None, SessionPolicy::default(), clock);

        assert_eq!(
            sessions.get_valid_token().await,
            Err(AuthError::MissingCredentials)
        );
    }

    #[tokio::test]
    async fn test_failed_login_leaves_state_untouched() {
        let clock = Arc::new(ManualClock::new(start()));
        let auth = Arc::new(CountingAuthenticator::new(clock.clone(), 3600));
        let sessions = manager(auth, clock.clone());
        sessions.get_valid_token().await.unwrap();

        let mut failing = CountingAuthenticator::new(clock.clone(), 3600);
        failing.fail_login = true;
        let other = SessionManager::with_clock(
            Arc::new(failing),
            None,
            SessionPolicy::default(),
            clock,
        );
        assert!(other
            .login(Credentials::password("x@example.com", "wrong"))
            .await
            .is_err());
        assert_eq!(other.credential_kind(), None);
        assert!(!other.status().has_session);

        assert_eq!(sessions.get_valid_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_explicit_login_replaces_session() {
        let clock = Arc::new(ManualClock::new(start()));
        let auth = Arc::new(CountingAuthenticator::new(clock.clone(), 3600));
        let sessions = SessionManager::with_clock(
            auth.clone(),
            None,
            SessionPolicy::default(),
            clock,
        );

        let session = sessions
            .login(Credentials::password("ops@example.com", "secret"))
            .await
            .unwrap();
        assert_eq!(session.token(), "tok-1");
        assert_eq!(sessions.get_valid_token().await.unwrap(), "tok-1");
        assert_eq!(auth.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_if_current_ignores_old_tokens() {
        let clock = Arc::new(ManualClock::new(start()));
        let auth = Arc::new(CountingAuthenticator::new(clock.clone(), 3600));
        let sessions = manager(auth.clone(), clock);

        let first = sessions.get_valid_token().await.unwrap();
        assert!(sessions.invalidate_if_current(&first));
        let second = sessions.get_valid_token().await.unwrap();
        assert_ne!(first, second);

        assert!(!sessions.invalidate_if_current(&first));
        assert_eq!(sessions.get_valid_token().await.unwrap(), second);
        assert_eq!(auth.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_logs_out_and_clears() {
        let clock = Arc::new(ManualClock::new(start()));
        let auth = Arc::new(CountingAuthenticator::new(clock.clone(), 3600));
        let sessions = manager(auth.clone(), clock);

        sessions.get_valid_token().await.unwrap();
        sessions.shutdown().await;

        assert_eq!(auth.logouts.load(Ordering::SeqCst), 1);
        assert!(!sessions.status().has_session);

        // Nothing to log out the second time.
        sessions.shutdown().await;
        assert_eq!(auth.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_renewal_still_completes_for_next_caller() {
        let clock = Arc::new(ManualClock::new(start()));
        let mut auth = CountingAuthenticator::new(clock.clone(), 3600);
        auth.delay = std::time::Duration::from_millis(50);
        let auth = Arc::new(auth);
        let sessions = manager(auth.clone(), clock);

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(5),
            sessions.get_valid_token(),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(sessions.status().renewing);

        assert_eq!(sessions.get_valid_token().await.unwrap(), "tok-1");
        assert_eq!(auth.logins.load(Ordering::SeqCst), 1);
    }
}
