use crate::models::{Topic, TopicCreate, TopicUpdate};
use crate::services::TopicService;

use super::{error_message, matches_search, FormErrors, PendingDelete};

pub const DELETE_PROMPT: &str =
    "¿Está seguro de que desea eliminar este tema? Esta acción no se puede deshacer.";

#[derive(Debug, Clone, Default)]
pub struct TopicForm {
    pub name: String,
    pub description: String,
}

impl TopicForm {
    pub fn from_topic(topic: &Topic) -> Self {
        Self {
            name: topic.name.clone(),
            description: topic.description.clone().unwrap_or_default(),
        }
    }

    fn validate(&self) -> Result<(String, Option<String>), FormErrors> {
        let mut errors = FormErrors::default();
        if self.name.trim().is_empty() {
            errors.add("name", "El nombre es obligatorio");
        }
        errors.into_result()?;

        let description = self.description.trim();
        Ok((
            self.name.trim().to_string(),
            (!description.is_empty()).then(|| description.to_string()),
        ))
    }
}

/// Topics of one subject.
pub struct TopicsView {
    service: TopicService,
    subject_id: i64,
    topics: Vec<Topic>,
    search_term: String,
    loading: bool,
    error: Option<String>,
    pending_delete: Option<PendingDelete>,
}

impl TopicsView {
    pub fn new(service: TopicService, subject_id: i64) -> Self {
        Self {
            service,
            subject_id,
            topics: Vec::new(),
            search_term: String::new(),
            loading: false,
            error: None,
            pending_delete: None,
        }
    }

    pub fn subject_id(&self) -> i64 {
        self.subject_id
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        match self.service.by_subject(self.subject_id).await {
            Ok(topics) => self.topics = topics,
            Err(e) => {
                tracing::error!("Failed to load topics of subject {}: {}", self.subject_id, e);
                self.error = Some(error_message(&e, "Error al cargar los temas."));
            }
        }
        self.loading = false;
    }

    pub fn search(&mut self, term: &str) {
        self.search_term = term.to_string();
    }

    pub fn visible(&self) -> Vec<&Topic> {
        self.topics
            .iter()
            .filter(|t| {
                matches_search(
                    &self.search_term,
                    &[t.name.as_str(), t.description.as_deref().unwrap_or_default()],
                )
            })
            .collect()
    }

    pub async fn create(&mut self, form: &TopicForm) -> Result<(), FormErrors> {
        let (name, description) = form.validate()?;
        let request = TopicCreate {
            name,
            description,
            subject_id: self.subject_id,
        };
        self.error = None;
        match self.service.create(&request).await {
            Ok(topic) => {
                tracing::info!(topic_id = topic.id, "Topic created");
                self.topics.push(topic);
            }
            Err(e) => {
                tracing::error!("Failed to create topic: {}", e);
                self.error = Some(error_message(&e, "Error al crear el tema."));
            }
        }
        Ok(())
    }

    pub async fn update(&mut self, id: i64, form: &TopicForm) -> Result<(), FormErrors> {
        let (name, description) = form.validate()?;
        let changes = TopicUpdate {
            name: Some(name),
            description,
            subject_id: None,
        };
        self.error = None;
        match self.service.update(id, &changes).await {
            Ok(updated) => match self.topics.iter_mut().find(|t| t.id == updated.id) {
                Some(topic) => *topic = updated,
                None => self.topics.push(updated),
            },
            Err(e) => {
                tracing::error!("Failed to update topic {}: {}", id, e);
                self.error = Some(error_message(&e, "Error al guardar los cambios"));
            }
        }
        Ok(())
    }

    pub fn ask_delete(&mut self, id: i64) -> Option<&PendingDelete> {
        if !self.topics.iter().any(|t| t.id == id) {
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
            Ok(()) => self.topics.retain(|t| t.id != pending.id),
            Err(e) => {
                tracing::error!("Failed to delete topic {}: {}", pending.id, e);
                self.error = Some(error_message(&e, "Error al eliminar el tema."));
            }
        }
    }
}
