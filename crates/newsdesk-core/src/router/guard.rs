use tokio::sync::watch;

use crate::api::AuthApi;
use crate::auth::{CredentialStore, SessionManager, SessionState, SessionStatus};

use super::route::{Access, Route};

/// Chrome a rendered view is wrapped in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Sidebar and header of the signed-in dashboard
    Standard,
    /// No chrome (login screen)
    Bare,
}

/// Result of running a route through the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Session still resolving: show a neutral placeholder, no content, no redirect
    Placeholder,
    Render { route: Route, layout: Layout },
    /// Navigate to the route, replacing the current history entry
    Replace(Route),
}

/// Decide what to show for `route` given the session state.
pub fn evaluate(route: &Route, state: &SessionState) -> GuardOutcome {
    if state.is_loading() {
        return GuardOutcome::Placeholder;
    }

    match (route.access(), state.is_authenticated()) {
        (Access::Protected, true) => GuardOutcome::Render {
            route: route.clone(),
            layout: Layout::Standard,
        },
        (Access::Protected, false) => GuardOutcome::Replace(Route::LOGIN_ENTRY),
        (Access::Public, true) => GuardOutcome::Replace(Route::LANDING),
        (Access::Public, false) => GuardOutcome::Render {
            route: route.clone(),
            layout: Layout::Bare,
        },
    }
}

/// Admits or redirects navigation based on the live session.
///
/// Holds a subscription to the session manager it was built from; every
/// decision is recomputed from the current state, never cached.
pub struct RouteGuard {
    session: watch::Receiver<SessionState>,
}

impl RouteGuard {
    pub fn new<A, S>(manager: &SessionManager<A, S>) -> Self
    where
        A: AuthApi,
        S: CredentialStore,
    {
        Self {
            session: manager.subscribe(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.session.borrow().status()
    }

    pub fn resolve(&self, route: &Route) -> GuardOutcome {
        evaluate(route, &self.session.borrow())
    }

    /// Resolve a raw path. Unknown paths are sent to the landing route.
    pub fn resolve_path(&self, path: &str) -> GuardOutcome {
        match Route::parse(path) {
            Some(route) => self.resolve(&route),
            None => GuardOutcome::Replace(Route::LANDING),
        }
    }

    /// Wait until the session has left `Loading`, then resolve
    pub async fn settled(&mut self, route: &Route) -> GuardOutcome {
        let outcome = self
            .session
            .wait_for(|state| !state.is_loading())
            .await
            .map(|state| evaluate(route, &state));

        match outcome {
            Ok(outcome) => outcome,
            // Manager gone: the last published state is final
            Err(_) => self.resolve(route),
        }
    }

    /// Wait for the next session transition and resolve again.
    ///
    /// Returns `None` once the session manager has been dropped.
    pub async fn changed(&mut self, route: &Route) -> Option<GuardOutcome> {
        self.session.changed().await.ok()?;
        Some(self.resolve(route))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, LoginResponse, SessionCheck};
    use crate::auth::{CredentialRecord, FileCredentialStore};
    use crate::models::{Role, UserProfile};

    /// Identity service that accepts every token and login
    struct AcceptAll;

    impl AuthApi for AcceptAll {
        async fn login(&self, _email: &str, _password: &str) -> Result<LoginResponse, ApiError> {
            Ok(LoginResponse {
                token: Some("tok".to_string()),
                user: Some(editor()),
            })
        }

        async fn get_session(&self, _token: &str) -> Result<SessionCheck, ApiError> {
            Ok(SessionCheck::Valid)
        }

        async fn logout(&self, _token: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn editor() -> UserProfile {
        UserProfile {
            id: "9".to_string(),
            email: "ed@news.com".to_string(),
            username: "ed".to_string(),
            display_name: None,
            role: Role::Editor,
        }
    }

    fn render(route: Route, layout: Layout) -> GuardOutcome {
        GuardOutcome::Render { route, layout }
    }

    // -------------------------------------------------------------------------
    // evaluate
    // -------------------------------------------------------------------------

    #[test]
    fn test_protected_route() {
        let route = Route::Articles;
        assert_eq!(evaluate(&route, &SessionState::Loading), GuardOutcome::Placeholder);
        assert_eq!(
            evaluate(&route, &SessionState::Authenticated(editor())),
            render(Route::Articles, Layout::Standard)
        );
        assert_eq!(
            evaluate(&route, &SessionState::Unauthenticated),
            GuardOutcome::Replace(Route::Login)
        );
    }

    #[test]
    fn test_public_route() {
        let route = Route::Login;
        assert_eq!(evaluate(&route, &SessionState::Loading), GuardOutcome::Placeholder);
        assert_eq!(
            evaluate(&route, &SessionState::Authenticated(editor())),
            GuardOutcome::Replace(Route::Dashboard)
        );
        assert_eq!(
            evaluate(&route, &SessionState::Unauthenticated),
            render(Route::Login, Layout::Bare)
        );
    }

    // -------------------------------------------------------------------------
    // RouteGuard
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_guard_waits_for_startup_check() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path());
        store.save(&CredentialRecord::new("tok", editor())).expect("seed");

        let manager = SessionManager::new(AcceptAll, store);
        let mut guard = RouteGuard::new(&manager);

        assert_eq!(guard.status(), SessionStatus::Loading);
        assert_eq!(guard.resolve(&Route::Users), GuardOutcome::Placeholder);
        assert_eq!(guard.resolve(&Route::Login), GuardOutcome::Placeholder);

        let (outcome, _) = tokio::join!(guard.settled(&Route::Users), manager.check_auth());
        assert_eq!(outcome, render(Route::Users, Layout::Standard));
    }

    #[tokio::test]
    async fn test_guard_follows_login_and_logout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager =
            SessionManager::initialize(AcceptAll, FileCredentialStore::new(dir.path())).await;
        let mut guard = RouteGuard::new(&manager);

        assert_eq!(guard.resolve(&Route::Settings), GuardOutcome::Replace(Route::Login));
        assert_eq!(guard.resolve(&Route::Login), render(Route::Login, Layout::Bare));

        manager.login("ed@news.com", "pw").await.expect("login");
        assert_eq!(
            guard.changed(&Route::Login).await,
            Some(GuardOutcome::Replace(Route::Dashboard))
        );
        assert_eq!(guard.resolve(&Route::Settings), render(Route::Settings, Layout::Standard));

        manager.logout().await;
        assert_eq!(
            guard.changed(&Route::Settings).await,
            Some(GuardOutcome::Replace(Route::Login))
        );
    }

    #[tokio::test]
    async fn test_guard_outlives_manager() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager =
            SessionManager::initialize(AcceptAll, FileCredentialStore::new(dir.path())).await;
        let mut guard = RouteGuard::new(&manager);
        drop(manager);

        assert_eq!(guard.changed(&Route::Articles).await, None);
        assert_eq!(
            guard.settled(&Route::Articles).await,
            GuardOutcome::Replace(Route::Login)
        );
    }

    #[tokio::test]
    async fn test_resolve_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager =
            SessionManager::initialize(AcceptAll, FileCredentialStore::new(dir.path())).await;
        let guard = RouteGuard::new(&manager);

        assert_eq!(guard.resolve_path("/articles/new"), GuardOutcome::Replace(Route::Login));
        assert_eq!(guard.resolve_path("/does-not-exist"), GuardOutcome::Replace(Route::Dashboard));
    }
}
