use bytes::Bytes;

use crate::api::{Ack, ApiClient, ApiError, ApiResponse, Form};
use crate::models::{Attachment, Conversation, ConversationStart, Message, MessagePair, NewConversation};

#[derive(Clone)]
pub struct ChatService {
    api: ApiClient,
}

impl ChatService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn my_conversations(&self, subject_id: Option<i64>) -> Result<Vec<Conversation>, ApiError> {
        self.api
            .get(
                "chat/me/conversations",
                &[("subject_id", subject_id.map(|id| id.to_string()))],
            )
            .await?
            .into_data()
    }

    /// Opens a conversation with its first message. The backend answers with
    /// the new conversation and, usually, the tutor's first reply.
    pub async fn start_conversation(&self, request: &NewConversation) -> Result<ConversationStart, ApiError> {
        self.api.post("chat/conversation", request).await?.into_data()
    }

    pub async fn delete_conversation(&self, id: i64) -> Result<(), ApiError> {
        let _: Ack = self.api.delete(&format!("chat/conversation/{}", id)).await?;
        Ok(())
    }

    pub async fn messages(&self, conversation_id: i64) -> Result<Vec<Message>, ApiError> {
        self.api
            .get(&format!("chat/conversation/{}/messages", conversation_id), &[])
            .await?
            .into_data()
    }

    /// Sends a user message as a multipart form: `message_data` carries the
    /// JSON `{"text": ...}` and `file` the optional image.
    pub async fn send_message(
        &self,
        conversation_id: i64,
        text: &str,
        image: Option<Attachment>,
    ) -> Result<Option<MessagePair>, ApiError> {
        let message_data = serde_json::json!({ "text": text }).to_string();
        let mut form = Form::new().text("message_data", message_data);
        if let Some(image) = image {
            form = form.file("file", image);
        }
        let response: ApiResponse<MessagePair> = self
            .api
            .upload(&format!("chat/c/{}", conversation_id), form)
            .await?;
        Ok(response.data)
    }

    /// Raw bytes of an image attached to a message.
    pub async fn image(&self, image_id: i64) -> Result<Bytes, ApiError> {
        self.api.get_bytes(&format!("images/{}/file", image_id)).await
    }
}
