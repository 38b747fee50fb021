use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::Conversation;
use super::timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    #[serde(default, deserialize_with = "crate::models::string_or_null")]
    pub text: String,
    pub is_bot: bool,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_id: Option<i64>,
    /// Set on locally constructed messages awaiting server confirmation.
    #[serde(skip)]
    pub pending: bool,
}

impl Message {
    /// Placeholder shown while a send is in flight. The negative id can never
    /// collide with a server id.
    pub fn optimistic(conversation_id: i64, text: &str) -> Self {
        let now = Utc::now();
        Self {
            id: -now.timestamp_millis().max(1),
            conversation_id,
            text: text.to_string(),
            is_bot: false,
            created_at: Some(now),
            image_id: None,
            pending: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePair {
    pub user_message: Message,
    pub bot_message: Message,
}

/// Payload for `chat/conversation`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewConversation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<i64>,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationStart {
    pub conversation: Conversation,
    #[serde(default)]
    pub bot_response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimistic_message_is_pending_user_message() {
        let msg = Message::optimistic(7, "hola");
        assert!(msg.id < 0);
        assert!(msg.pending);
        assert!(!msg.is_bot);
        assert_eq!(msg.conversation_id, 7);
    }

    #[test]
    fn test_null_text_decodes_as_empty() {
        let json = r#"{"id":1,"conversation_id":2,"text":null,"is_bot":true,"image_id":4}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.text, "");
        assert_eq!(msg.image_id, Some(4));
        assert!(!msg.pending);
    }

    #[test]
    fn test_new_conversation_omits_missing_context() {
        let payload = NewConversation {
            subject_id: Some(2),
            text: "Hola".to_string(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"subject_id":2,"text":"Hola"}"#
        );
    }
}
