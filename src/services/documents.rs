use bytes::Bytes;

use crate::api::{Ack, ApiClient, ApiError, Form};
use crate::models::{Document, DocumentUpload, SubjectSummary, UploadReceipt};

#[derive(Clone)]
pub struct DocumentService {
    api: ApiClient,
}

impl DocumentService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list(&self, subject_id: Option<i64>, topic_id: Option<i64>) -> Result<Vec<Document>, ApiError> {
        self.api
            .get(
                "documents/list",
                &[
                    ("subject_id", subject_id.map(|id| id.to_string())),
                    ("topic_id", topic_id.map(|id| id.to_string())),
                ],
            )
            .await?
            .into_data()
    }

    pub async fn get(&self, id: i64) -> Result<Document, ApiError> {
        self.api.get(&format!("documents/{}", id), &[]).await?.into_data()
    }

    pub async fn upload(&self, upload: DocumentUpload) -> Result<UploadReceipt, ApiError> {
        let mut form = Form::new()
            .text("title", upload.title)
            .text("description", upload.description)
            .text("subject_id", upload.subject_id.to_string());
        if let Some(topic_id) = upload.topic_id {
            form = form.text("topic_id", topic_id.to_string());
        }
        let form = form.file("pdf_file", upload.file);

        let receipt: UploadReceipt = self.api.upload("documents/upload", form).await?.into_data()?;
        tracing::info!(document_id = receipt.document_id, "Document uploaded");
        Ok(receipt)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let _: Ack = self.api.delete(&format!("documents/{}", id)).await?;
        Ok(())
    }

    pub async fn download(&self, id: i64) -> Result<Bytes, ApiError> {
        self.api.get_bytes(&format!("documents/{}/download", id)).await
    }

    pub async fn preview(&self, id: i64) -> Result<Bytes, ApiError> {
        self.api.get_bytes(&format!("documents/{}/preview", id)).await
    }

    pub async fn subject_summary(&self, subject_id: i64) -> Result<SubjectSummary, ApiError> {
        self.api
            .get(&format!("documents/subjects/{}/summary", subject_id), &[])
            .await?
            .into_data()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::testing::{logged_in_client, ok, ScriptedTransport};
    use crate::api::{Body, Method};
    use crate::models::{Attachment, Role};

    #[tokio::test]
    async fn test_upload_form_fields() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Post, "documents/upload", 200, ok(json!({"document_id": 31})));
        let docs = DocumentService::new(logged_in_client(transport.clone(), Role::Teacher).await);

        let receipt = docs
            .upload(DocumentUpload {
                title: "Tema 1".to_string(),
                description: String::new(),
                subject_id: 2,
                topic_id: None,
                file: Attachment::new("tema1.pdf", "application/pdf", vec![0u8; 16]),
            })
            .await
            .unwrap();
        assert_eq!(receipt.document_id, 31);

        match &transport.requests()[0].body {
            Body::Multipart(form) => {
                assert_eq!(form.text_value("title"), Some("Tema 1"));
                assert_eq!(form.text_value("subject_id"), Some("2"));
                assert_eq!(form.text_value("topic_id"), None);
                assert!(form.file_value("pdf_file").is_some());
            }
            other => panic!("Expected multipart body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_download_returns_raw_bytes() {
        let transport = ScriptedTransport::new();
        transport.on_raw(Method::Get, "documents/5/download", 200, "%PDF-1.4");
        let docs = DocumentService::new(logged_in_client(transport, Role::Student).await);

        let bytes = docs.download(5).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_summary() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            "documents/subjects/2/summary",
            200,
            ok(json!({"subject_id": 2, "summary": null, "document_count": 3})),
        );
        let docs = DocumentService::new(logged_in_client(transport, Role::Teacher).await);

        let summary = docs.subject_summary(2).await.unwrap();
        assert_eq!(summary.document_count, 3);
        assert_eq!(summary.summary, "");
    }
}
