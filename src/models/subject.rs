use serde::{Deserialize, Serialize};

use super::user::{Role, User};

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active", alias = "is_active")]
    pub active: bool,
    #[serde(default)]
    pub teacher_count: u32,
    #[serde(default)]
    pub student_count: u32,
}

impl Subject {
    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Recompute the per-role counters from an assignment list.
    pub fn apply_assignment(&mut self, assigned: &[User]) {
        self.teacher_count = assigned.iter().filter(|u| u.role == Role::Teacher).count() as u32;
        self.student_count = assigned.iter().filter(|u| u.role == Role::Student).count() as u32;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectUsers {
    #[serde(default, alias = "assignedUsers")]
    pub assigned: Vec<User>,
    #[serde(default, alias = "availableUsers")]
    pub available: Vec<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserIds {
    pub user_ids: Vec<i64>,
}
