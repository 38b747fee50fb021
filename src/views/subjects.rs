use crate::models::{Subject, SubjectCreate, SubjectUpdate, User};
use crate::routes::Route;
use crate::services::SubjectService;

use super::{error_message, matches_search, redirect_for, FormErrors, PendingDelete};

pub const DELETE_PROMPT: &str =
    "¿Está seguro de que desea eliminar esta asignatura? Esta acción no se puede deshacer.";

#[derive(Debug, Clone, Default)]
pub struct SubjectForm {
    pub name: String,
    pub code: String,
    pub description: String,
}

impl SubjectForm {
    pub fn from_subject(subject: &Subject) -> Self {
        Self {
            name: subject.name.clone(),
            code: subject.code.clone().unwrap_or_default(),
            description: subject.description_or_empty().to_string(),
        }
    }

    pub fn validate(&self) -> Result<SubjectCreate, FormErrors> {
        let mut errors = FormErrors::default();
        if self.name.trim().is_empty() {
            errors.add("name", "El nombre es obligatorio");
        }
        if self.description.trim().is_empty() {
            errors.add("description", "La descripción es obligatoria");
        }
        errors.into_result()?;

        let code = self.code.trim();
        Ok(SubjectCreate {
            name: self.name.trim().to_string(),
            code: (!code.is_empty()).then(|| code.to_string()),
            description: self.description.trim().to_string(),
        })
    }
}

/// Users of one subject being edited in the assignment dialog.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub subject_id: i64,
    pub assigned: Vec<User>,
    pub available: Vec<User>,
}

impl Assignment {
    pub fn assign(&mut self, user_id: i64) {
        if let Some(pos) = self.available.iter().position(|u| u.id == user_id) {
            let user = self.available.remove(pos);
            self.assigned.push(user);
        }
    }

    pub fn unassign(&mut self, user_id: i64) {
        if let Some(pos) = self.assigned.iter().position(|u| u.id == user_id) {
            let user = self.assigned.remove(pos);
            self.available.push(user);
        }
    }
}

pub struct SubjectsView {
    service: SubjectService,
    subjects: Vec<Subject>,
    search_term: String,
    loading: bool,
    error: Option<String>,
    pending_delete: Option<PendingDelete>,
    assignment: Option<Assignment>,
}

impl SubjectsView {
    pub fn new(service: SubjectService) -> Self {
        Self {
            service,
            subjects: Vec::new(),
            search_term: String::new(),
            loading: false,
            error: None,
            pending_delete: None,
            assignment: None,
        }
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        self.assignment.as_ref()
    }

    pub fn assignment_mut(&mut self) -> Option<&mut Assignment> {
        self.assignment.as_mut()
    }

    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        match self.service.list().await {
            Ok(subjects) => self.subjects = subjects,
            Err(e) => {
                tracing::error!("Failed to load subjects: {}", e);
                self.error = Some(error_message(&e, "Error al cargar las asignaturas."));
            }
        }
        self.loading = false;
    }

    pub fn search(&mut self, term: &str) {
        self.search_term = term.to_string();
    }

    pub fn visible(&self) -> Vec<&Subject> {
        self.subjects
            .iter()
            .filter(|s| matches_search(&self.search_term, &[s.name.as_str(), s.description_or_empty()]))
            .collect()
    }

    /// Validates before anything is sent; invalid forms never reach the backend.
    pub async fn create(&mut self, form: &SubjectForm) -> Result<(), FormErrors> {
        let request = form.validate()?;
        self.loading = true;
        self.error = None;
        match self.service.create(&request).await {
            Ok(subject) => {
                tracing::info!(subject_id = subject.id, "Subject created");
                self.subjects.push(subject);
            }
            Err(e) => {
                tracing::error!("Failed to create subject: {}", e);
                self.error = Some(error_message(&e, "Error al crear la asignatura."));
            }
        }
        self.loading = false;
        Ok(())
    }

    /// Loads one subject for editing. A missing subject sends the user back
    /// to the subject list.
    pub async fn edit(&mut self, id: i64) -> Result<SubjectForm, Option<Route>> {
        match self.service.get(id).await {
            Ok(subject) => Ok(SubjectForm::from_subject(&subject)),
            Err(e) => {
                tracing::error!("Failed to load subject {}: {}", id, e);
                let fallback = if e.is_not_found() {
                    "No se encontró la asignatura especificada"
                } else {
                    "Error al cargar la asignatura"
                };
                self.error = Some(error_message(&e, fallback));
                Err(redirect_for(&e, Route::Admin))
            }
        }
    }

    pub async fn update(&mut self, id: i64, form: &SubjectForm) -> Result<(), FormErrors> {
        let request = form.validate()?;
        let changes = SubjectUpdate {
            name: Some(request.name),
            code: request.code,
            description: Some(request.description),
            active: None,
        };
        self.error = None;
        match self.service.update(id, &changes).await {
            Ok(updated) => self.replace(updated),
            Err(e) => {
                tracing::error!("Failed to update subject {}: {}", id, e);
                self.error = Some(error_message(&e, "Error al guardar los cambios"));
            }
        }
        Ok(())
    }

    /// Flips the active flag right away and puts it back if the backend
    /// refuses.
    pub async fn toggle_active(&mut self, id: i64) {
        let Some(subject) = self.subjects.iter_mut().find(|s| s.id == id) else {
            return;
        };
        subject.active = !subject.active;
        let active = subject.active;
        self.error = None;

        match self.service.set_active(id, active).await {
            Ok(updated) => self.replace(updated),
            Err(e) => {
                tracing::error!("Failed to toggle subject {}: {}", id, e);
                if let Some(subject) = self.subjects.iter_mut().find(|s| s.id == id) {
                    subject.active = !active;
                }
                self.error = Some(error_message(&e, "Error al cambiar el estado de la asignatura."));
            }
        }
    }

    pub fn ask_delete(&mut self, id: i64) -> Option<&PendingDelete> {
        if !self.subjects.iter().any(|s| s.id == id) {
            return None;
        }
        self.pending_delete = Some(PendingDelete {
            id,
            prompt: DELETE_PROMPT.to_string(),
        });
        self.pending_delete.as_ref()
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub async fn confirm_delete(&mut self) {
        let Some(pending) = self.pending_delete.take() else {
            return;
        };
        self.error = None;
        match self.service.delete(pending.id).await {
            Ok(()) => self.subjects.retain(|s| s.id != pending.id),
            Err(e) => {
                tracing::error!("Failed to delete subject {}: {}", pending.id, e);
                self.error = Some(error_message(&e, "Error al eliminar la asignatura."));
            }
        }
    }

    pub async fn open_assignment(&mut self, subject_id: i64) {
        self.error = None;
        match self.service.users(subject_id).await {
            Ok(users) => {
                self.assignment = Some(Assignment {
                    subject_id,
                    assigned: users.assigned,
                    available: users.available,
                })
            }
            Err(e) => {
                tracing::error!("Failed to load users of subject {}: {}", subject_id, e);
                self.error = Some(error_message(&e, "Error al cargar los usuarios de la asignatura."));
            }
        }
    }

    pub fn close_assignment(&mut self) {
        self.assignment = None;
    }

    /// Sends the edited assignment and refreshes the subject's counters.
    pub async fn save_assignment(&mut self) {
        let Some(assignment) = self.assignment.take() else {
            return;
        };
        let ids = assignment.assigned.iter().map(|u| u.id).collect();
        match self.service.assign_users(assignment.subject_id, ids).await {
            Ok(saved) => {
                let assigned = if saved.is_empty() { &assignment.assigned } else { &saved };
                if let Some(subject) = self.subjects.iter_mut().find(|s| s.id == assignment.subject_id) {
                    subject.apply_assignment(assigned);
                }
            }
            Err(e) => {
                tracing::error!("Failed to save users of subject {}: {}", assignment.subject_id, e);
                self.error = Some(error_message(&e, "Error al guardar los usuarios de la asignatura."));
                self.assignment = Some(assignment);
            }
        }
    }

    fn replace(&mut self, updated: Subject) {
        match self.subjects.iter_mut().find(|s| s.id == updated.id) {
            Some(subject) => *subject = updated,
            None => self.subjects.push(updated),
        }
    }
}
