//! Session lifecycle for the admin dashboard.
//!
//! `SessionManager` owns the in-memory session, drives it through
//! `Loading -> Authenticated | Unauthenticated` and keeps the credential
//! store in step with it. State changes are published on a `watch` channel
//! so route guards and views re-evaluate whenever the session moves.
//!
//! Every transition is committed under a single lock that also carries a
//! generation counter. `check_auth` records the generation when it starts and
//! drops its result if anything else committed in the meantime, so a slow
//! startup verification can never undo a newer login or logout. The lock is
//! never held across an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthApi, SessionCheck};
use crate::models::UserProfile;

use super::credentials::{CredentialRecord, CredentialStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Current session as seen by consumers.
///
/// The user only exists inside `Authenticated`, so "authenticated without a
/// user" and "loading with a stale user" cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Authenticated(UserProfile),
    Unauthenticated,
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Loading => SessionStatus::Loading,
            SessionState::Authenticated(_) => SessionStatus::Authenticated,
            SessionState::Unauthenticated => SessionStatus::Unauthenticated,
        }
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

/// Why a login attempt did not produce a session.
///
/// `Display` is the message shown inline on the login form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("Email and password required")]
    MissingCredentials,

    /// The identity service refused and said why
    #[error("{0}")]
    Rejected(String),

    /// 2xx response without a usable token and user
    #[error("Login failed")]
    MalformedResponse,

    #[error("Unable to connect to server. Check your internet connection.")]
    Unreachable,

    #[error("Connection timed out. Please try again.")]
    TimedOut,

    #[error("Login failed: {0}")]
    Other(String),
}

impl From<ApiError> for LoginError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected(message) => LoginError::Rejected(message),
            ApiError::Unauthorized => LoginError::Rejected("Invalid email or password".to_string()),
            ApiError::InvalidResponse(_) => LoginError::MalformedResponse,
            ApiError::NetworkError(e) if e.is_timeout() => LoginError::TimedOut,
            ApiError::NetworkError(e) if e.is_decode() => LoginError::MalformedResponse,
            ApiError::NetworkError(_) => LoginError::Unreachable,
            other => LoginError::Other(other.to_string()),
        }
    }
}

/// What the stored credentials turned out to be worth
enum Verification {
    NoCredentials,
    Valid(CredentialRecord),
    Untrusted,
}

struct Inner {
    /// Bumped by every committed transition
    generation: u64,
    /// Bearer token of the live session
    token: Option<String>,
    /// State of the last commit, `Unauthenticated` before the first one
    settled: SessionState,
    /// `check_auth` calls that published `Loading` and have not finished
    checks_in_flight: usize,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            generation: 0,
            token: None,
            settled: SessionState::Unauthenticated,
            checks_in_flight: 0,
        }
    }
}

pub struct SessionManager<A, S> {
    api: A,
    store: S,
    state: watch::Sender<SessionState>,
    inner: Mutex<Inner>,
}

impl<A, S> SessionManager<A, S>
where
    A: AuthApi,
    S: CredentialStore,
{
    /// Create a manager in the `Loading` state. Call `check_auth` to resolve it.
    pub fn new(api: A, store: S) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            api,
            store,
            state,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Create a manager and run startup verification before returning it
    pub async fn initialize(api: A, store: S) -> Self {
        let manager = Self::new(api, store);
        manager.check_auth().await;
        manager
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Receiver that observes every state transition
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[cfg(test)]
    fn api(&self) -> &A {
        &self.api
    }

    /// Bearer token of the current session, for authenticated content calls
    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Verify stored credentials with the server and settle the session.
    ///
    /// Never fails and never returns `Loading`: rejected, unreachable or
    /// unreadable credentials are cleared and the session becomes
    /// `Unauthenticated`. If a login or logout committed while the server was
    /// being asked, that transition stands and its status is returned.
    ///
    /// Dropping the future before it finishes puts back the last settled
    /// state, unless another check is still running.
    pub async fn check_auth(&self) -> SessionStatus {
        let started = {
            let mut inner = self.lock();
            inner.checks_in_flight += 1;
            self.publish(SessionState::Loading);
            inner.generation
        };
        // Declared before the commit lock below, so it is dropped after it
        let _pending = PendingCheck { manager: self };

        let verification = match self.verify_stored().await {
            Ok(verification) => verification,
            Err(e) => {
                warn!(error = %e, "Session verification failed, discarding stored credentials");
                Verification::Untrusted
            }
        };

        let mut inner = self.lock();
        if inner.generation != started {
            debug!("Session changed during verification, dropping stale result");
            return inner.settled.status();
        }

        let next = match verification {
            Verification::Valid(record) => {
                debug!(user = %record.user.email, "Stored session verified");
                inner.token = Some(record.token);
                SessionState::Authenticated(record.user)
            }
            Verification::NoCredentials => {
                debug!("No stored credentials");
                inner.token = None;
                SessionState::Unauthenticated
            }
            Verification::Untrusted => {
                self.clear_store();
                inner.token = None;
                SessionState::Unauthenticated
            }
        };

        self.commit(&mut inner, next)
    }

    /// Sign in with email and password.
    ///
    /// On failure the session and the credential store are left exactly as
    /// they were, and the error's `Display` is the message to show the user.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), LoginError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        let response = match self.api.login(email, password).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Login failed");
                return Err(e.into());
            }
        };

        let record = match (response.token, response.user) {
            (Some(token), Some(user)) => CredentialRecord::new(token, user),
            (token, user) => {
                warn!(
                    has_token = token.is_some(),
                    has_user = user.is_some(),
                    "Login response missing token or user"
                );
                return Err(LoginError::MalformedResponse);
            }
        };

        if !record.is_well_formed() {
            warn!("Login response carried an empty token or incomplete user");
            return Err(LoginError::MalformedResponse);
        }

        let mut inner = self.lock();
        if let Err(e) = self.store.save(&record) {
            warn!(error = %e, "Failed to save credentials, session will not survive restart");
        }

        info!(user = %record.user.email, role = %record.user.role, "Login successful");
        inner.token = Some(record.token);
        self.commit(&mut inner, SessionState::Authenticated(record.user));
        Ok(())
    }

    /// Sign out. The remote call is best effort; local state is always cleared.
    pub async fn logout(&self) {
        let token = match self.token() {
            Some(token) => Some(token),
            None => self.store.load().ok().flatten().map(|record| record.token),
        };

        match token {
            Some(token) => {
                if let Err(e) = self.api.logout(&token).await {
                    warn!(error = %e, "Remote logout failed, clearing local session anyway");
                }
            }
            None => debug!("No session token, skipping remote logout"),
        }

        let mut inner = self.lock();
        self.clear_store();
        inner.token = None;
        self.commit(&mut inner, SessionState::Unauthenticated);
        info!("Logged out");
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn verify_stored(&self) -> Result<Verification> {
        let Some(record) = self.store.load()? else {
            return Ok(Verification::NoCredentials);
        };

        match self.api.get_session(&record.token).await? {
            SessionCheck::Valid => Ok(Verification::Valid(record)),
            SessionCheck::Rejected => {
                info!("Stored session rejected by server");
                Ok(Verification::Untrusted)
            }
        }
    }

    /// The commit lock. Never held across an `.await`.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner is plain data, still consistent after a panicking holder
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `next` as the settled state and publish it
    fn commit(&self, inner: &mut Inner, next: SessionState) -> SessionStatus {
        inner.generation += 1;
        inner.settled = next.clone();
        let status = next.status();
        self.publish(next);
        status
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
    }

    /// Publish a new state. Succeeds with or without live subscribers.
    fn publish(&self, next: SessionState) {
        self.state.send_replace(next);
    }
}

/// A `check_auth` between publishing `Loading` and finishing.
///
/// When the last one goes away while the session still shows `Loading`, the
/// check was abandoned and the last settled state is published again.
struct PendingCheck<'a, A, S>
where
    A: AuthApi,
    S: CredentialStore,
{
    manager: &'a SessionManager<A, S>,
}

impl<A, S> Drop for PendingCheck<'_, A, S>
where
    A: AuthApi,
    S: CredentialStore,
{
    fn drop(&mut self) {
        let mut inner = self.manager.lock();
        inner.checks_in_flight = inner.checks_in_flight.saturating_sub(1);

        let loading = self.manager.state.borrow().is_loading();
        if inner.checks_in_flight == 0 && loading {
            debug!("Session check abandoned, restoring last settled state");
            self.manager.publish(inner.settled.clone());
        }
    }
}
