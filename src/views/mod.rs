//! Screen state for every view. Each view owns its list and error state and
//! talks to the backend through the services; errors end up in the view,
//! never in the caller.

pub mod chat_area;
pub mod dashboard;
pub mod documents;
pub mod login;
pub mod message_input;
pub mod sidebar;
pub mod student;
pub mod subject_selection;
pub mod subjects;
pub mod topics;
pub mod upload;
pub mod users;

use std::collections::BTreeMap;

use crate::api::ApiError;
use crate::routes::Route;

pub use chat_area::{ChatArea, ChatState};
pub use dashboard::{Dashboard, Stats};
pub use documents::DocumentsView;
pub use login::{LoginForm, LoginView};
pub use message_input::{KeyAction, MessageInput};
pub use sidebar::{ConversationSidebar, SidebarEntry};
pub use student::StudentView;
pub use subject_selection::SubjectSelection;
pub use subjects::{SubjectForm, SubjectsView};
pub use topics::{TopicForm, TopicsView};
pub use upload::UploadForm;
pub use users::{RoleFilter, UserForm, UsersView};

/// Case-insensitive substring match over any of `fields`. An empty term
/// matches everything.
pub fn matches_search(term: &str, fields: &[&str]) -> bool {
    let term = term.trim().to_lowercase();
    term.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&term))
}

/// Loose shape check: something@domain.tld without spaces.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.contains(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Field-level validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, String>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<&str> = self.fields.values().map(String::as_str).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Message shown next to a list or form when a backend call fails.
pub fn error_message(err: &ApiError, fallback: &str) -> String {
    match err {
        ApiError::Unauthorized => "Tu sesión ha expirado. Inicia sesión de nuevo.".to_string(),
        ApiError::Network(_) => format!("{} No se pudo conectar con el servidor.", fallback),
        _ => match err.server_message() {
            Some(detail) if !detail.is_empty() => format!("{} ({})", fallback, detail),
            _ => fallback.to_string(),
        },
    }
}

/// Where to go when a call fails in a way the current screen cannot recover
/// from: a rejected token goes back to login, a missing resource to the
/// screen's fallback.
pub fn redirect_for(err: &ApiError, fallback: Route) -> Option<Route> {
    if err.is_unauthorized() {
        Some(Route::Login)
    } else if err.is_not_found() {
        Some(fallback)
    } else {
        None
    }
}

/// A destructive action waiting for the user to confirm it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub id: i64,
    pub prompt: String,
}
