use std::fmt;

/// Which guard variant a route sits behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Only reachable signed out (the login screen)
    Public,
    /// Only reachable signed in
    Protected,
}

/// Admin dashboard routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Articles,
    NewArticle,
    EditArticle(String),
    Categories,
    Users,
    Settings,
}

impl Route {
    /// Where unauthenticated visitors are sent
    pub const LOGIN_ENTRY: Route = Route::Login;

    /// Where signed-in visitors land by default
    pub const LANDING: Route = Route::Dashboard;

    /// Parse a dashboard path. Query strings, fragments and trailing slashes are ignored.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let route = match segments.as_slice() {
            [] | ["dashboard"] => Route::Dashboard,
            ["login"] => Route::Login,
            ["articles"] => Route::Articles,
            ["articles", "new"] => Route::NewArticle,
            ["articles", id, "edit"] => Route::EditArticle((*id).to_string()),
            ["categories"] => Route::Categories,
            ["users"] => Route::Users,
            ["settings"] => Route::Settings,
            _ => return None,
        };
        Some(route)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Dashboard => "/".to_string(),
            Route::Articles => "/articles".to_string(),
            Route::NewArticle => "/articles/new".to_string(),
            Route::EditArticle(id) => format!("/articles/{}/edit", id),
            Route::Categories => "/categories".to_string(),
            Route::Users => "/users".to_string(),
            Route::Settings => "/settings".to_string(),
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Login => Access::Public,
            _ => Access::Protected,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
