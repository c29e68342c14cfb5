//! Route table of the application shell and its access guards.
//!
//! SYSTEM CONTEXT
//! ==============
//! Pages are resolved from a path, then checked against the synchronizer's
//! state: the dashboard needs a profile, the admin area needs the `admin`
//! role. Guards never redirect while the first session check is in flight.

use std::fmt;

use crate::sync::SyncState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Dashboard,
    Tarot,
    Horoscope,
    Compatibility,
    Login,
    Register,
    Admin(AdminRoute),
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminRoute {
    /// `/admin` and `/admin/dashboard`.
    Dashboard,
    BlogPosts,
    NewPost,
    EditPost(String),
    Users,
}

/// Outcome of checking a route against the current session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// The session is still being determined; render a placeholder.
    Pending,
    Redirect(Route),
    Forbidden,
}

impl Route {
    /// Resolve a path. Query strings, fragments and trailing slashes are ignored.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Self::Home,
            ["dashboard"] => Self::Dashboard,
            ["tarot"] => Self::Tarot,
            ["horoscope"] => Self::Horoscope,
            ["compatibility"] => Self::Compatibility,
            ["login"] => Self::Login,
            ["register"] => Self::Register,
            ["admin"] | ["admin", "dashboard"] => Self::Admin(AdminRoute::Dashboard),
            ["admin", "blog"] => Self::Admin(AdminRoute::BlogPosts),
            ["admin", "blog", "new"] => Self::Admin(AdminRoute::NewPost),
            ["admin", "blog", "edit", id] => Self::Admin(AdminRoute::EditPost((*id).to_string())),
            ["admin", "users"] => Self::Admin(AdminRoute::Users),
            _ => Self::NotFound(path.to_string()),
        }
    }

    /// Canonical path for this route.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".into(),
            Self::Dashboard => "/dashboard".into(),
            Self::Tarot => "/tarot".into(),
            Self::Horoscope => "/horoscope".into(),
            Self::Compatibility => "/compatibility".into(),
            Self::Login => "/login".into(),
            Self::Register => "/register".into(),
            Self::Admin(AdminRoute::Dashboard) => "/admin".into(),
            Self::Admin(AdminRoute::BlogPosts) => "/admin/blog".into(),
            Self::Admin(AdminRoute::NewPost) => "/admin/blog/new".into(),
            Self::Admin(AdminRoute::EditPost(id)) => format!("/admin/blog/edit/{id}"),
            Self::Admin(AdminRoute::Users) => "/admin/users".into(),
            Self::NotFound(path) => path.clone(),
        }
    }

    /// Check this route against the current session state.
    #[must_use]
    pub fn access(&self, state: &SyncState) -> Access {
        match self {
            Self::Dashboard => match state.profile() {
                Some(_) => Access::Allow,
                None if state.loading() => Access::Pending,
                None => Access::Redirect(Self::Login),
            },
            Self::Admin(_) => match state.profile() {
                Some(profile) if profile.is_admin() => Access::Allow,
                Some(_) => Access::Forbidden,
                None if state.loading() => Access::Pending,
                None => Access::Redirect(Self::Login),
            },
            Self::Login | Self::Register if state.authenticated() => Access::Redirect(Self::Dashboard),
            _ => Access::Allow,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
