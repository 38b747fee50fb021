use crate::api::ApiError;
use crate::models::{Role, Subject, User};
use crate::services::{DocumentService, Services, SubjectService, UserService};

use super::error_message;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub students: usize,
    pub teachers: usize,
    pub admins: usize,
    pub active_subjects: usize,
    pub inactive_subjects: usize,
    pub documents: usize,
}

impl Stats {
    fn count(users: &[User], subjects: &[Subject], documents: usize) -> Self {
        let with_role = |role: Role| users.iter().filter(|u| u.role == role).count();
        let active_subjects = subjects.iter().filter(|s| s.active).count();
        Self {
            students: with_role(Role::Student),
            teachers: with_role(Role::Teacher),
            admins: with_role(Role::Admin),
            active_subjects,
            inactive_subjects: subjects.len() - active_subjects,
            documents,
        }
    }

    pub fn total_users(&self) -> usize {
        self.students + self.teachers + self.admins
    }
}

/// Landing page of the teacher and admin areas.
pub struct Dashboard {
    role: Role,
    users: UserService,
    subjects: SubjectService,
    documents: DocumentService,
    stats: Option<Stats>,
    error: Option<String>,
}

impl Dashboard {
    pub fn new(services: &Services, role: Role) -> Self {
        Self {
            role,
            users: services.users.clone(),
            subjects: services.subjects.clone(),
            documents: services.documents.clone(),
            stats: None,
            error: None,
        }
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn load(&mut self) {
        self.error = None;
        let result = match self.role {
            Role::Admin => self.load_admin().await,
            _ => self.load_teacher().await,
        };
        match result {
            Ok(stats) => self.stats = Some(stats),
            Err(e) => {
                tracing::error!("Failed to load dashboard: {}", e);
                self.error = Some(error_message(&e, "Error al cargar el panel."));
            }
        }
    }

    async fn load_admin(&self) -> Result<Stats, ApiError> {
        let (users, subjects, documents) = futures::try_join!(
            self.users.list_all(),
            self.subjects.list(),
            self.documents.list(None, None),
        )?;
        Ok(Stats::count(&users, &subjects, documents.len()))
    }

    /// Teachers only see their own subjects; students are summed from the
    /// subjects' counters.
    async fn load_teacher(&self) -> Result<Stats, ApiError> {
        let subjects = self.users.my_subjects().await?;
        let mut documents = 0;
        for subject in &subjects {
            documents += self.documents.list(Some(subject.id), None).await?.len();
        }
        let mut stats = Stats::count(&[], &subjects, documents);
        stats.students = subjects.iter().map(|s| s.student_count as usize).sum();
        Ok(stats)
    }
}
