use bytes::Bytes;

use crate::models::{Document, SubjectSummary};
use crate::services::{DocumentService, Services};

use super::{error_message, matches_search, FormErrors, PendingDelete, UploadForm};

pub const DELETE_PROMPT: &str =
    "¿Está seguro de que desea eliminar este documento? Esta acción no se puede deshacer.";

/// Document table for teachers and admins, with its upload dialog.
pub struct DocumentsView {
    service: DocumentService,
    pub upload: UploadForm,
    documents: Vec<Document>,
    subject_id: Option<i64>,
    topic_id: Option<i64>,
    search_term: String,
    summary: Option<SubjectSummary>,
    loading: bool,
    error: Option<String>,
    pending_delete: Option<PendingDelete>,
}

impl DocumentsView {
    pub fn new(services: &Services) -> Self {
        Self {
            service: services.documents.clone(),
            upload: UploadForm::new(services.documents.clone(), services.subjects.clone()),
            documents: Vec::new(),
            subject_id: None,
            topic_id: None,
            search_term: String::new(),
            summary: None,
            loading: false,
            error: None,
            pending_delete: None,
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn summary(&self) -> Option<&SubjectSummary> {
        self.summary.as_ref()
    }

    /// Narrows the list; takes effect on the next `load`.
    pub fn set_filter(&mut self, subject_id: Option<i64>, topic_id: Option<i64>) {
        if subject_id != self.subject_id {
            self.summary = None;
        }
        self.subject_id = subject_id;
        self.topic_id = topic_id;
    }

    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        match self.service.list(self.subject_id, self.topic_id).await {
            Ok(documents) => self.documents = documents,
            Err(e) => {
                tracing::error!("Failed to load documents: {}", e);
                self.error = Some(error_message(&e, "Error al cargar los documentos."));
            }
        }
        self.loading = false;
    }

    pub fn search(&mut self, term: &str) {
        self.search_term = term.to_string();
    }

    pub fn visible(&self) -> Vec<&Document> {
        self.documents
            .iter()
            .filter(|d| {
                matches_search(
                    &self.search_term,
                    &[d.title.as_str(), d.description.as_deref().unwrap_or_default()],
                )
            })
            .collect()
    }

    /// Opens the upload dialog on the current topic with the subject preselected.
    pub async fn open_upload(&mut self) {
        self.upload.open(self.topic_id);
        self.upload.subject_id = self.subject_id;
        self.upload.load_subjects().await;
    }

    /// Submits the dialog and reloads the table once the file is stored.
    pub async fn submit_upload(&mut self) -> Result<bool, FormErrors> {
        let uploaded = self.upload.submit().await?.is_some();
        if uploaded {
            self.load().await;
        }
        Ok(uploaded)
    }

    pub fn ask_delete(&mut self, id: i64) -> Option<&PendingDelete> {
        if !self.documents.iter().any(|d| d.id == id) {
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
            Ok(()) => self.documents.retain(|d| d.id != pending.id),
            Err(e) => {
                tracing::error!("Failed to delete document {}: {}", pending.id, e);
                self.error = Some(error_message(&e, "Error al eliminar el documento."));
            }
        }
    }

    pub async fn download(&mut self, id: i64) -> Option<Bytes> {
        self.fetch(id, false).await
    }

    pub async fn preview(&mut self, id: i64) -> Option<Bytes> {
        self.fetch(id, true).await
    }

    async fn fetch(&mut self, id: i64, preview: bool) -> Option<Bytes> {
        self.error = None;
        let result = if preview {
            self.service.preview(id).await
        } else {
            self.service.download(id).await
        };
        match result {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!("Failed to fetch document {}: {}", id, e);
                self.error = Some(error_message(&e, "Error al descargar el documento."));
                None
            }
        }
    }

    pub async fn load_summary(&mut self) {
        let Some(subject_id) = self.subject_id else {
            self.summary = None;
            return;
        };
        match self.service.subject_summary(subject_id).await {
            Ok(summary) => self.summary = Some(summary),
            Err(e) => {
                tracing::warn!("No summary for subject {}: {}", subject_id, e);
                self.summary = None;
            }
        }
    }
}
