use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attachment::Attachment;
use super::timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub subject_id: Option<i64>,
    #[serde(default)]
    pub topic_id: Option<i64>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Multipart fields for `documents/upload`.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub topic_id: Option<i64>,
    pub file: Attachment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    #[serde(alias = "id")]
    pub document_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectSummary {
    pub subject_id: i64,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default, deserialize_with = "crate::models::string_or_null")]
    pub summary: String,
    #[serde(default)]
    pub document_count: u32,
}
