use bytes::Bytes;

use crate::models::{Attachment, NewConversation};
use crate::services::{ChatService, Services};
use crate::storage::Database;

use super::chat_area::SendRejected;
use super::message_input::Submission;
use super::{error_message, ChatArea, ConversationSidebar, MessageInput};

const START_ERROR: &str = "Error al iniciar la conversación";
const IMAGE_ERROR: &str = "Error al cargar la imagen.";

/// Student chat screen. Owns which conversation is active and keeps the
/// sidebar selection and the chat content in step.
pub struct StudentView {
    chat: ChatService,
    pub sidebar: ConversationSidebar,
    pub chat_area: ChatArea,
    pub input: MessageInput,
    subject_id: Option<i64>,
    document_id: Option<i64>,
    greeting: Option<String>,
    error: Option<String>,
}

impl StudentView {
    pub fn new(services: &Services, subject_id: Option<i64>) -> Self {
        let mut sidebar = ConversationSidebar::new(services.chat.clone());
        sidebar.set_subject_filter(subject_id);
        Self {
            chat: services.chat.clone(),
            sidebar,
            chat_area: ChatArea::new(services.chat.clone()),
            input: MessageInput::new(),
            subject_id,
            document_id: None,
            greeting: None,
            error: None,
        }
    }

    pub fn with_pin_store(mut self, db: Database, user_id: i64) -> Self {
        self.sidebar = self.sidebar.with_pin_store(db, user_id);
        self
    }

    /// Ties new conversations to a document of the subject.
    pub fn set_document(&mut self, document_id: Option<i64>) {
        self.document_id = document_id;
    }

    pub fn subject_id(&self) -> Option<i64> {
        self.subject_id
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The tutor's first reply to the most recently started conversation.
    pub fn greeting(&self) -> Option<&str> {
        self.greeting.as_deref()
    }

    pub async fn open(&mut self) {
        let active = self.sidebar.load_conversations().await;
        self.show(active).await;
    }

    pub async fn select(&mut self, id: i64) {
        if let Some(id) = self.sidebar.select_conversation(id) {
            if self.chat_area.conversation_id() != Some(id) {
                self.chat_area.load(id).await;
            }
        }
    }

    pub async fn pin(&mut self, id: i64) {
        self.sidebar.pin_conversation(id).await;
    }

    pub async fn delete(&mut self, id: i64) {
        let active = self.sidebar.delete_conversation(id).await;
        if active != self.chat_area.conversation_id() {
            self.show(active).await;
        }
    }

    /// Leaves the chat empty; the next message starts a new conversation.
    pub fn start_new(&mut self) {
        self.sidebar.clear_selection();
        self.chat_area.clear();
        self.greeting = None;
    }

    /// Sends whatever is in the composer.
    pub async fn submit(&mut self) -> Result<(), SendRejected> {
        let Some(Submission { text, image }) = self.input.submit() else {
            return Err(SendRejected::Empty);
        };
        self.error = None;

        if self.chat_area.conversation_id().is_none() {
            if !self.start_conversation(&text).await {
                self.input.set_text(text);
                return Ok(());
            }
            // The opening request carries text only; an image follows as a regular message.
            return match image {
                Some(image) => self.send(String::new(), Some(image)).await,
                None => Ok(()),
            };
        }

        self.send(text, image).await
    }

    /// Fetches the image attached to a message of the open conversation.
    pub async fn image(&mut self, message_id: i64) -> Option<Bytes> {
        self.error = None;
        let image_id = self
            .chat_area
            .messages()
            .iter()
            .find(|m| m.id == message_id)
            .and_then(|m| m.image_id);
        let Some(image_id) = image_id else {
            self.error = Some("Ese mensaje no tiene ninguna imagen.".to_string());
            return None;
        };

        match self.chat.image(image_id).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!("Failed to fetch image {}: {}", image_id, e);
                self.error = Some(error_message(&e, IMAGE_ERROR));
                None
            }
        }
    }

    async fn send(&mut self, text: String, image: Option<Attachment>) -> Result<(), SendRejected> {
        self.input.set_sending(true);
        let result = self.chat_area.send_message(&text, image).await;
        self.input.set_sending(false);
        result
    }

    async fn start_conversation(&mut self, text: &str) -> bool {
        let request = NewConversation {
            document_id: self.document_id,
            subject_id: self.subject_id,
            topic_id: None,
            text: text.to_string(),
        };

        match self.chat.start_conversation(&request).await {
            Ok(start) => {
                let id = start.conversation.id;
                tracing::info!(conversation_id = id, "Started conversation");
                self.greeting = start.bot_response;
                self.sidebar.add_conversation(start.conversation);
                self.chat_area.load(id).await;
                true
            }
            Err(e) => {
                tracing::error!("Failed to start conversation: {}", e);
                self.error = Some(error_message(&e, START_ERROR));
                false
            }
        }
    }

    async fn show(&mut self, conversation_id: Option<i64>) {
        match conversation_id {
            Some(id) => self.chat_area.load(id).await,
            None => self.chat_area.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::testing::{logged_in_client, ok, ScriptedTransport};
    use crate::api::{Body, Method};
    use crate::models::Role;
    use crate::views::ChatState;

    fn conversations() -> serde_json::Value {
        ok(json!([
            {"id": 1, "user_id": 1, "subject_id": 3, "created_at": "2024-05-01T10:00:00"},
            {"id": 2, "user_id": 1, "subject_id": 3, "created_at": "2024-05-02T10:00:00"}
        ]))
    }

    fn messages(conversation_id: i64) -> serde_json::Value {
        ok(json!([{
            "id": conversation_id * 10,
            "conversation_id": conversation_id,
            "text": "Hola",
            "is_bot": false,
            "created_at": "2024-05-02T10:00:00"
        }]))
    }

    async fn view(transport: std::sync::Arc<ScriptedTransport>) -> StudentView {
        let services = Services::new(logged_in_client(transport, Role::Student).await);
        StudentView::new(&services, Some(3))
    }

    #[tokio::test]
    async fn test_open_loads_first_conversation() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "chat/me/conversations", 200, conversations());
        transport.on(Method::Get, "chat/conversation/2/messages", 200, messages(2));
        let mut view = view(transport.clone()).await;

        view.open().await;
        assert_eq!(view.sidebar.active(), Some(2));
        assert_eq!(view.chat_area.conversation_id(), Some(2));
        assert_eq!(view.chat_area.messages()[0].id, 20);
        assert_eq!(
            transport.requests()[0].query,
            vec![("subject_id".to_string(), "3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_select_switches_chat() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "chat/me/conversations", 200, conversations());
        transport.on(Method::Get, "chat/conversation/2/messages", 200, messages(2));
        transport.on(Method::Get, "chat/conversation/1/messages", 200, messages(1));
        let mut view = view(transport).await;
        view.open().await;

        view.select(1).await;
        assert_eq!(view.sidebar.active(), Some(1));
        assert_eq!(view.chat_area.conversation_id(), Some(1));
        assert_eq!(view.chat_area.messages()[0].id, 10);
    }

    #[tokio::test]
    async fn test_delete_active_moves_chat() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "chat/me/conversations", 200, conversations());
        transport.on(Method::Get, "chat/conversation/2/messages", 200, messages(2));
        transport.on(Method::Get, "chat/conversation/1/messages", 200, messages(1));
        transport.on(Method::Delete, "chat/conversation/2", 200, ok(json!(null)));
        transport.on(Method::Delete, "chat/conversation/1", 200, ok(json!(null)));
        let mut view = view(transport).await;
        view.open().await;

        view.delete(2).await;
        assert_eq!(view.sidebar.active(), Some(1));
        assert_eq!(view.chat_area.conversation_id(), Some(1));

        view.delete(1).await;
        assert_eq!(view.sidebar.active(), None);
        assert_eq!(view.chat_area.state(), ChatState::Idle);
    }

    #[tokio::test]
    async fn test_first_message_starts_conversation() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "chat/me/conversations", 200, ok(json!([])));
        transport.on(
            Method::Post,
            "chat/conversation",
            200,
            ok(json!({
                "conversation": {"id": 8, "user_id": 1, "subject_id": 3, "created_at": "2024-05-03T10:00:00"},
                "bot_response": "¡Hola! Soy tu tutor."
            })),
        );
        transport.on(Method::Get, "chat/conversation/8/messages", 200, messages(8));
        let mut view = view(transport.clone()).await;
        view.open().await;
        assert!(view.sidebar.is_empty_state());

        view.input.set_text("Hola");
        view.submit().await.unwrap();

        assert_eq!(view.sidebar.active(), Some(8));
        assert_eq!(view.chat_area.conversation_id(), Some(8));
        assert_eq!(view.greeting(), Some("¡Hola! Soy tu tutor."));
        let start = transport
            .requests()
            .into_iter()
            .find(|r| r.path == "chat/conversation")
            .unwrap();
        match start.body {
            Body::Json(body) => {
                assert_eq!(body["subject_id"], 3);
                assert_eq!(body["text"], "Hola");
            }
            other => panic!("Expected JSON body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_start_keeps_text() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Post, "chat/conversation", 500, json!({"detail": "boom"}));
        let mut view = view(transport).await;

        view.input.set_text("Hola");
        view.submit().await.unwrap();
        assert!(view.error().unwrap().starts_with(START_ERROR));
        assert_eq!(view.input.text(), "Hola");
        assert!(view.chat_area.conversation_id().is_none());
    }

    #[tokio::test]
    async fn test_image_of_message() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "chat/me/conversations", 200, conversations());
        transport.on(
            Method::Get,
            "chat/conversation/2/messages",
            200,
            ok(json!([
                {"id": 20, "conversation_id": 2, "text": "Mira", "is_bot": false, "image_id": 7},
                {"id": 21, "conversation_id": 2, "text": "Veo una célula", "is_bot": true}
            ])),
        );
        transport.on_raw(Method::Get, "images/7/file", 200, "JPEG");
        let mut view = view(transport.clone()).await;
        view.open().await;

        let bytes = view.image(20).await.unwrap();
        assert_eq!(&bytes[..], b"JPEG");
        assert!(view.error().is_none());

        assert!(view.image(21).await.is_none());
        assert!(view.error().is_some());
        assert_eq!(transport.count(Method::Get, "images/7/file"), 1);
    }

    #[tokio::test]
    async fn test_image_failure_is_shown() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "chat/me/conversations", 200, conversations());
        transport.on(
            Method::Get,
            "chat/conversation/2/messages",
            200,
            ok(json!([{"id": 20, "conversation_id": 2, "text": "", "is_bot": false, "image_id": 7}])),
        );
        transport.on(Method::Get, "images/7/file", 404, json!({"detail": "Image not found"}));
        let mut view = view(transport).await;
        view.open().await;

        assert!(view.image(20).await.is_none());
        assert!(view.error().unwrap().starts_with(IMAGE_ERROR));
    }

    #[tokio::test]
    async fn test_empty_submit_sends_nothing() {
        let transport = ScriptedTransport::new();
        let mut view = view(transport.clone()).await;
        view.input.set_text("   ");
        assert_eq!(view.submit().await, Err(SendRejected::Empty));
        assert!(transport.requests().is_empty());
    }
}
