use crate::models::Subject;
use crate::routes::Route;
use crate::services::UserService;

use super::error_message;

/// Lets a student pick the subject the chat is about.
pub struct SubjectSelection {
    users: UserService,
    subjects: Vec<Subject>,
    selected: Option<i64>,
    loading: bool,
    error: Option<String>,
}

impl SubjectSelection {
    pub fn new(users: UserService) -> Self {
        Self {
            users,
            subjects: Vec::new(),
            selected: None,
            loading: false,
            error: None,
        }
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn selected(&self) -> Option<&Subject> {
        self.selected
            .and_then(|id| self.subjects.iter().find(|s| s.id == id))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Loads the student's subjects, keeping only active ones. Any previous
    /// choice is cleared.
    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        self.selected = None;
        match self.users.my_subjects().await {
            Ok(subjects) => {
                self.subjects = subjects.into_iter().filter(|s| s.active).collect();
            }
            Err(e) => {
                tracing::error!("Failed to load subjects: {}", e);
                self.error = Some(error_message(&e, "Error al cargar las asignaturas."));
            }
        }
        self.loading = false;
    }

    /// Picking the current subject again deselects it; picking another one
    /// moves on to the chat.
    pub fn select(&mut self, id: i64) -> Option<Route> {
        if self.selected == Some(id) {
            self.selected = None;
            return None;
        }
        if !self.subjects.iter().any(|s| s.id == id) {
            return None;
        }
        self.selected = Some(id);
        Some(Route::Chat)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::testing::{logged_in_client, ok, ScriptedTransport};
    use crate::api::Method;
    use crate::models::Role;

    async fn loaded() -> SubjectSelection {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            "users/me/subjects",
            200,
            ok(json!([
                {"id": 1, "name": "Física", "active": true},
                {"id": 2, "name": "Latín", "active": false},
                {"id": 3, "name": "Química"}
            ])),
        );
        let mut view = SubjectSelection::new(UserService::new(
            logged_in_client(transport, Role::Student).await,
        ));
        view.load().await;
        view
    }

    #[tokio::test]
    async fn test_only_active_subjects() {
        let view = loaded().await;
        let ids: Vec<i64> = view.subjects().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_reselect_deselects() {
        let mut view = loaded().await;
        assert_eq!(view.select(1), Some(Route::Chat));
        assert_eq!(view.selected().unwrap().name, "Física");

        assert_eq!(view.select(1), None);
        assert!(view.selected().is_none());

        assert_eq!(view.select(3), Some(Route::Chat));
        assert_eq!(view.select(2), None);
        assert_eq!(view.selected().unwrap().id, 3);
    }
}
