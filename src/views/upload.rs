use crate::models::{Attachment, DocumentUpload, Subject, UploadReceipt};
use crate::services::{DocumentService, SubjectService};

use super::{error_message, FormErrors};

pub const MAX_FILE_MB: usize = 10;
pub const PDF_ONLY: &str = "Solo se permiten archivos PDF.";
pub const SUBMIT_ERROR: &str = "Error al subir el documento. Por favor, inténtelo de nuevo.";

pub fn too_large_message() -> String {
    format!(
        "El archivo es demasiado grande. El tamaño máximo permitido es {}MB.",
        MAX_FILE_MB
    )
}

/// Document upload dialog.
pub struct UploadForm {
    documents: DocumentService,
    subjects_service: SubjectService,
    pub title: String,
    pub description: String,
    pub subject_id: Option<i64>,
    topic_id: Option<i64>,
    file: Option<Attachment>,
    subjects: Vec<Subject>,
    visible: bool,
    uploading: bool,
    upload_error: Option<String>,
}

impl UploadForm {
    pub fn new(documents: DocumentService, subjects_service: SubjectService) -> Self {
        Self {
            documents,
            subjects_service,
            title: String::new(),
            description: String::new(),
            subject_id: None,
            topic_id: None,
            file: None,
            subjects: Vec::new(),
            visible: false,
            uploading: false,
            upload_error: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn upload_error(&self) -> Option<&str> {
        self.upload_error.as_deref()
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn file(&self) -> Option<&Attachment> {
        self.file.as_ref()
    }

    pub fn topic_id(&self) -> Option<i64> {
        self.topic_id
    }

    /// Opens an empty form, optionally bound to a topic.
    pub fn open(&mut self, topic_id: Option<i64>) {
        self.reset();
        self.topic_id = topic_id;
        self.visible = true;
    }

    pub fn close(&mut self) {
        self.visible = false;
        self.reset();
    }

    fn reset(&mut self) {
        self.title.clear();
        self.description.clear();
        self.subject_id = None;
        self.topic_id = None;
        self.file = None;
        self.upload_error = None;
    }

    pub async fn load_subjects(&mut self) {
        match self.subjects_service.list().await {
            Ok(subjects) => self.subjects = subjects,
            Err(e) => {
                tracing::error!("Failed to load subjects for upload: {}", e);
                self.subjects.clear();
                self.upload_error = Some(error_message(&e, "Error al cargar las asignaturas."));
            }
        }
    }

    /// Accepts a PDF up to the size limit. A rejected file also clears any
    /// previously selected one.
    pub fn select_file(&mut self, file: Attachment) -> Result<(), String> {
        let rejection = if !file.is_pdf() {
            Some(PDF_ONLY.to_string())
        } else if file.size() > MAX_FILE_MB * 1024 * 1024 {
            Some(too_large_message())
        } else {
            None
        };

        match rejection {
            Some(message) => {
                self.file = None;
                self.upload_error = Some(message.clone());
                Err(message)
            }
            None => {
                self.file = Some(file);
                self.upload_error = None;
                Ok(())
            }
        }
    }

    pub fn validate(&self) -> Result<DocumentUpload, FormErrors> {
        let mut errors = FormErrors::default();
        if self.title.trim().is_empty() {
            errors.add("title", "El título es obligatorio");
        }
        if self.subject_id.is_none() {
            errors.add("subject_id", "Selecciona una asignatura");
        }
        if self.file.is_none() {
            errors.add("file", "Selecciona un archivo PDF");
        }
        errors.into_result()?;

        match (self.subject_id, self.file.clone()) {
            (Some(subject_id), Some(file)) => Ok(DocumentUpload {
                title: self.title.trim().to_string(),
                description: self.description.trim().to_string(),
                subject_id,
                topic_id: self.topic_id,
                file,
            }),
            _ => Err(FormErrors::default()),
        }
    }

    /// Uploads and closes the dialog. A failed upload keeps the dialog open
    /// with its error.
    pub async fn submit(&mut self) -> Result<Option<UploadReceipt>, FormErrors> {
        let upload = self.validate()?;
        self.uploading = true;
        self.upload_error = None;

        let result = self.documents.upload(upload).await;
        self.uploading = false;

        match result {
            Ok(receipt) => {
                self.close();
                Ok(Some(receipt))
            }
            Err(e) => {
                tracing::error!("Failed to upload document: {}", e);
                self.upload_error = Some(SUBMIT_ERROR.to_string());
                Ok(None)
            }
        }
    }
}
