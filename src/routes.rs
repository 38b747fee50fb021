//! Screen routing and the access policy in front of each screen.

use crate::models::Role;
use crate::session::SessionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    SubjectSelection,
    Chat,
    Teacher,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect(Route),
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Login,
        Route::SubjectSelection,
        Route::Chat,
        Route::Teacher,
        Route::Admin,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::SubjectSelection => "/subject-selection",
            Route::Chat => "/chat",
            Route::Teacher => "/teacher",
            Route::Admin => "/admin",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        Self::ALL.into_iter().find(|r| r.path() == path)
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Login => Access::Public,
            Route::SubjectSelection => Access::Authenticated,
            Route::Chat => Access::Student,
            Route::Teacher => Access::Teacher,
            Route::Admin => Access::Admin,
        }
    }
}

/// Landing screen after login.
pub fn home_for(role: Role) -> Route {
    match role {
        Role::Admin => Route::Admin,
        Role::Teacher => Route::Teacher,
        Role::Student => Route::SubjectSelection,
    }
}

pub fn check(access: Access, session: &SessionSnapshot) -> GuardOutcome {
    let Some(role) = session.role().filter(|_| session.is_logged_in()) else {
        return match access {
            Access::Public => GuardOutcome::Allow,
            _ => GuardOutcome::Redirect(Route::Login),
        };
    };

    match (access, role) {
        (Access::Public | Access::Authenticated, _) => GuardOutcome::Allow,
        (Access::Admin, Role::Admin) => GuardOutcome::Allow,
        (Access::Admin, Role::Teacher) => GuardOutcome::Redirect(Route::Teacher),
        (Access::Admin, Role::Student) => GuardOutcome::Redirect(Route::SubjectSelection),
        (Access::Teacher, Role::Teacher | Role::Admin) => GuardOutcome::Allow,
        (Access::Teacher, Role::Student) => GuardOutcome::Redirect(Route::SubjectSelection),
        (Access::Student, Role::Student) => GuardOutcome::Allow,
        (Access::Student, other) => GuardOutcome::Redirect(home_for(other)),
    }
}

/// Follows guard redirects until a screen admits the session. Unknown paths
/// land on the session's home screen, or the login screen when logged out.
pub fn resolve(path: &str, session: &SessionSnapshot) -> Route {
    let mut route = match Route::from_path(path) {
        Some(route) => route,
        None => {
            tracing::debug!(path, "Unknown route");
            fallback(session)
        }
    };

    for _ in 0..Route::ALL.len() {
        match check(route.access(), session) {
            GuardOutcome::Allow => return route,
            GuardOutcome::Redirect(next) => route = next,
        }
    }
    Route::Login
}

pub fn fallback(session: &SessionSnapshot) -> Route {
    match session.role().filter(|_| session.is_logged_in()) {
        Some(role) => home_for(role),
        None => Route::Login,
    }
}
