use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    #[serde(default, deserialize_with = "crate::models::string_or_null")]
    pub text: String,
    pub is_bot: bool,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub document_id: Option<i64>,
    #[serde(default)]
    pub document_title: Option<String>,
    #[serde(default)]
    pub subject_id: Option<i64>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// The explicit summary when the backend sent one, otherwise the newest
    /// embedded message.
    pub fn last_message_summary(&self) -> Option<LastMessage> {
        if let Some(last) = &self.last_message {
            return Some(last.clone());
        }
        self.messages
            .iter()
            .max_by_key(|m| (m.created_at, m.id))
            .map(|m| LastMessage {
                text: m.text.clone(),
                is_bot: m.is_bot,
                created_at: m.created_at,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_embedded_messages() {
        let json = r#"{
            "id": 5, "user_id": 1, "subject_id": 2,
            "messages": [
                {"id": 1, "conversation_id": 5, "text": "primera", "is_bot": false, "created_at": "2025-05-10T10:00:00"},
                {"id": 2, "conversation_id": 5, "text": "respuesta", "is_bot": true, "created_at": "2025-05-10T10:00:05"}
            ]
        }"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();
        let last = conv.last_message_summary().unwrap();
        assert_eq!(last.text, "respuesta");
        assert!(last.is_bot);
        assert!(!conv.pinned);
    }

    #[test]
    fn test_summary_absent_without_messages() {
        let conv: Conversation = serde_json::from_str(r#"{"id":1,"user_id":1}"#).unwrap();
        assert!(conv.last_message_summary().is_none());
    }
}
