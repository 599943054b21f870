use std::future::Future;

use crate::models::UserProfile;

use super::ApiError;

/// Body of a successful login call.
///
/// Both fields are optional on purpose: a 2xx response that lacks either one
/// is malformed and must not be mistaken for a real session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginResponse {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

/// Outcome of asking the identity service whether a token is still good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    Valid,
    /// Token is unknown, revoked or expired
    Rejected,
}

/// Remote identity service consumed by the session manager.
///
/// `ApiClient` is the HTTP implementation; tests supply stubs.
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token and user snapshot.
    ///
    /// A refusal by the service (bad password, locked account) is reported
    /// as `ApiError::Rejected` carrying the service's own message.
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<LoginResponse, ApiError>> + Send;

    /// Confirm that `token` still identifies a live session.
    fn get_session(&self, token: &str)
        -> impl Future<Output = Result<SessionCheck, ApiError>> + Send;

    /// Invalidate `token` server-side. Best effort.
    fn logout(&self, token: &str) -> impl Future<Output = Result<(), ApiError>> + Send;
}
