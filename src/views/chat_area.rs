use crate::api::ApiError;
use crate::models::{Attachment, Message, MessagePair};
use crate::services::ChatService;

use super::error_message;

const LOAD_ERROR: &str = "Error al cargar la conversación";
const NOT_FOUND: &str = "No se encontró la conversación";
const SEND_ERROR: &str = "Error al enviar el mensaje";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Loading,
    Loaded,
    OptimisticPending,
    Error,
}

/// Identifies one message fetch. Only the newest ticket for the active
/// conversation may change what is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    conversation_id: i64,
    generation: u64,
    refresh: bool,
}

impl LoadTicket {
    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendTicket {
    conversation_id: i64,
    optimistic_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    Empty,
    Busy,
    NoConversation,
}

pub struct ChatArea {
    chat: ChatService,
    conversation_id: Option<i64>,
    generation: u64,
    messages: Vec<Message>,
    state: ChatState,
    error: Option<String>,
    scroll_requested: bool,
}

impl ChatArea {
    pub fn new(chat: ChatService) -> Self {
        Self {
            chat,
            conversation_id: None,
            generation: 0,
            messages: Vec::new(),
            state: ChatState::Idle,
            error: None,
            scroll_requested: false,
        }
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_sending(&self) -> bool {
        self.state == ChatState::OptimisticPending
    }

    /// Returns true once after the number of displayed messages changed.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    /// Shows no conversation at all.
    pub fn clear(&mut self) {
        self.conversation_id = None;
        self.generation += 1;
        self.replace_messages(Vec::new());
        self.state = ChatState::Idle;
        self.error = None;
    }

    /// Switches to `conversation_id`: nothing of the previous conversation
    /// stays on screen while the new one loads.
    pub fn open(&mut self, conversation_id: i64) -> LoadTicket {
        self.conversation_id = Some(conversation_id);
        self.generation += 1;
        self.replace_messages(Vec::new());
        self.state = ChatState::Loading;
        self.error = None;
        LoadTicket {
            conversation_id,
            generation: self.generation,
            refresh: false,
        }
    }

    /// Applies a fetch result. Returns false when the result was stale and
    /// dropped.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<Vec<Message>, ApiError>) -> bool {
        if self.conversation_id != Some(ticket.conversation_id) || self.generation != ticket.generation {
            tracing::debug!(
                conversation_id = ticket.conversation_id,
                "Dropping stale message list"
            );
            return false;
        }

        match result {
            Ok(mut messages) => {
                messages.sort_by_key(|m| m.created_at);
                self.replace_messages(messages);
                self.state = ChatState::Loaded;
            }
            Err(e) if ticket.refresh => {
                // The send went through; keep what is shown. Entries the server never
                // echoed back stay pending until the next successful load.
                tracing::error!("Failed to refresh conversation {}: {}", ticket.conversation_id, e);
                self.error = Some(error_message(&e, LOAD_ERROR));
                self.state = ChatState::Loaded;
            }
            Err(e) => {
                tracing::error!("Failed to load conversation {}: {}", ticket.conversation_id, e);
                let fallback = if e.is_not_found() { NOT_FOUND } else { LOAD_ERROR };
                self.error = Some(error_message(&e, fallback));
                self.state = ChatState::Error;
            }
        }
        true
    }

    pub async fn load(&mut self, conversation_id: i64) {
        let ticket = self.open(conversation_id);
        let result = self.chat.messages(conversation_id).await;
        self.finish_load(ticket, result);
    }

    /// Appends the optimistic entry for a send. Nothing is appended when the
    /// send is rejected.
    pub fn begin_send(&mut self, text: &str, image: Option<&Attachment>) -> Result<SendTicket, SendRejected> {
        let conversation_id = self.conversation_id.ok_or(SendRejected::NoConversation)?;
        if text.trim().is_empty() && image.is_none() {
            return Err(SendRejected::Empty);
        }
        if matches!(self.state, ChatState::OptimisticPending | ChatState::Loading) {
            return Err(SendRejected::Busy);
        }

        let optimistic = Message::optimistic(conversation_id, text.trim());
        let optimistic_id = optimistic.id;
        let mut messages = self.messages.clone();
        messages.push(optimistic);
        self.replace_messages(messages);
        self.state = ChatState::OptimisticPending;
        self.error = None;

        Ok(SendTicket {
            conversation_id,
            optimistic_id,
        })
    }

    /// Settles a send. On success returns the ticket for the re-fetch that
    /// replaces the optimistic entry with the server's list.
    pub fn finish_send(
        &mut self,
        ticket: SendTicket,
        result: Result<Option<MessagePair>, ApiError>,
    ) -> Option<LoadTicket> {
        if self.conversation_id != Some(ticket.conversation_id) {
            tracing::debug!(conversation_id = ticket.conversation_id, "Send settled after switching away");
            return None;
        }

        match result {
            Ok(pair) => {
                if let Some(pair) = pair {
                    // Server copies stand in for the placeholder until the re-fetch lands.
                    let mut messages: Vec<Message> = self
                        .messages
                        .iter()
                        .filter(|m| m.id != ticket.optimistic_id)
                        .cloned()
                        .collect();
                    messages.push(pair.user_message);
                    messages.push(pair.bot_message);
                    self.replace_messages(messages);
                }
                self.generation += 1;
                Some(LoadTicket {
                    conversation_id: ticket.conversation_id,
                    generation: self.generation,
                    refresh: true,
                })
            }
            Err(e) => {
                tracing::error!("Failed to send message: {}", e);
                let messages = self
                    .messages
                    .iter()
                    .filter(|m| m.id != ticket.optimistic_id)
                    .cloned()
                    .collect();
                self.replace_messages(messages);
                self.error = Some(error_message(&e, SEND_ERROR));
                self.state = ChatState::Loaded;
                None
            }
        }
    }

    pub async fn send_message(&mut self, text: &str, image: Option<Attachment>) -> Result<(), SendRejected> {
        let ticket = self.begin_send(text, image.as_ref())?;
        let result = self
            .chat
            .send_message(ticket.conversation_id, text.trim(), image)
            .await;

        if let Some(refetch) = self.finish_send(ticket, result) {
            let result = self.chat.messages(refetch.conversation_id).await;
            self.finish_load(refetch, result);
        }
        Ok(())
    }

    fn replace_messages(&mut self, messages: Vec<Message>) {
        if messages.len() != self.messages.len() {
            self.scroll_requested = true;
        }
        self.messages = messages;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::testing::{logged_in_client, ok, ScriptedTransport};
    use crate::api::Method;
    use crate::models::Role;

    fn server_message(id: i64, text: &str, is_bot: bool, minute: u32) -> serde_json::Value {
        json!({
            "id": id,
            "conversation_id": 5,
            "text": text,
            "is_bot": is_bot,
            "created_at": format!("2024-05-01T10:{:02}:00", minute)
        })
    }

    async fn area(transport: std::sync::Arc<ScriptedTransport>) -> ChatArea {
        ChatArea::new(ChatService::new(logged_in_client(transport, Role::Student).await))
    }

    fn msg(id: i64, conversation_id: i64) -> Message {
        Message {
            id,
            conversation_id,
            text: format!("m{}", id),
            is_bot: false,
            created_at: None,
            image_id: None,
            pending: false,
        }
    }

    #[tokio::test]
    async fn test_stale_response_is_dropped() {
        let mut area = area(ScriptedTransport::new()).await;

        let first = area.open(1);
        let second = area.open(2);
        assert!(area.messages().is_empty());

        assert!(!area.finish_load(first, Ok(vec![msg(10, 1)])));
        assert!(area.messages().is_empty());
        assert_eq!(area.state(), ChatState::Loading);

        assert!(area.finish_load(second, Ok(vec![msg(20, 2)])));
        assert_eq!(area.messages()[0].id, 20);
        assert_eq!(area.state(), ChatState::Loaded);
    }

    #[tokio::test]
    async fn test_switch_clears_previous_messages() {
        let mut area = area(ScriptedTransport::new()).await;
        let ticket = area.open(1);
        area.finish_load(ticket, Ok(vec![msg(10, 1), msg(11, 1)]));

        area.open(2);
        assert!(area.messages().is_empty());
        assert_eq!(area.state(), ChatState::Loading);
    }

    fn history() -> serde_json::Value {
        ok(json!([
            server_message(1, "Hola", false, 0),
            server_message(2, "¡Hola! ¿Qué necesitas?", true, 1)
        ]))
    }

    #[tokio::test]
    async fn test_single_optimistic_entry_while_pending() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "chat/conversation/5/messages", 200, history());
        let mut area = area(transport.clone()).await;
        area.load(5).await;
        area.take_scroll_request();

        area.begin_send("¿Qué es un vector?", None).unwrap();
        assert_eq!(area.messages().len(), 3);
        assert_eq!(area.messages().iter().filter(|m| m.pending).count(), 1);
        assert_eq!(area.state(), ChatState::OptimisticPending);
        assert!(area.take_scroll_request());

        assert_eq!(area.begin_send("otra", None), Err(SendRejected::Busy));
        assert_eq!(area.messages().len(), 3);
        assert_eq!(transport.count(Method::Post, "chat/c/5"), 0);
    }

    #[tokio::test]
    async fn test_send_success_reconciles() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "chat/conversation/5/messages", 200, history());
        transport.on(
            Method::Get,
            "chat/conversation/5/messages",
            200,
            ok(json!([
                server_message(1, "Hola", false, 0),
                server_message(2, "¡Hola! ¿Qué necesitas?", true, 1),
                server_message(3, "¿Qué es un vector?", false, 2),
                server_message(4, "Un vector es...", true, 3)
            ])),
        );
        transport.on(Method::Post, "chat/c/5", 200, ok(json!(null)));
        let mut area = area(transport.clone()).await;
        area.load(5).await;

        area.send_message("¿Qué es un vector?", None).await.unwrap();

        assert_eq!(area.messages().len(), 4);
        assert!(area.messages().iter().all(|m| !m.pending && m.id > 0));
        assert_eq!(area.messages()[3].text, "Un vector es...");
        assert_eq!(area.state(), ChatState::Loaded);
        assert!(area.error().is_none());
        assert_eq!(transport.count(Method::Post, "chat/c/5"), 1);
        assert_eq!(transport.count(Method::Get, "chat/conversation/5/messages"), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_uses_returned_pair() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "chat/conversation/5/messages", 200, history());
        transport.fail(
            Method::Get,
            "chat/conversation/5/messages",
            ApiError::Network("connection reset".to_string()),
        );
        transport.on(
            Method::Post,
            "chat/c/5",
            200,
            ok(json!({
                "user_message": server_message(3, "¿Qué es un vector?", false, 2),
                "bot_message": server_message(4, "Un vector es...", true, 3)
            })),
        );
        let mut area = area(transport).await;
        area.load(5).await;

        area.send_message("¿Qué es un vector?", None).await.unwrap();

        let ids: Vec<i64> = area.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(area.messages().iter().all(|m| !m.pending));
        assert_eq!(area.state(), ChatState::Loaded);
        assert!(area.error().unwrap().starts_with(LOAD_ERROR));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_placeholder_pending() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "chat/conversation/5/messages", 200, history());
        transport.fail(
            Method::Get,
            "chat/conversation/5/messages",
            ApiError::Network("connection reset".to_string()),
        );
        transport.on(Method::Post, "chat/c/5", 200, ok(json!(null)));
        let mut area = area(transport).await;
        area.load(5).await;

        area.send_message("¿Qué es un vector?", None).await.unwrap();

        assert_eq!(area.messages().len(), 3);
        let placeholder = &area.messages()[2];
        assert!(placeholder.pending);
        assert!(placeholder.id < 0);
        assert_eq!(area.state(), ChatState::Loaded);
    }

    #[tokio::test]
    async fn test_send_failure_restores_list() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            "chat/conversation/5/messages",
            200,
            ok(json!([server_message(1, "Hola", false, 0)])),
        );
        transport.on(Method::Post, "chat/c/5", 500, json!({"detail": "LLM caído"}));
        let mut area = area(transport.clone()).await;
        area.load(5).await;

        area.send_message("¿Sigues ahí?", None).await.unwrap();

        assert_eq!(area.messages().len(), 1);
        assert!(area.error().unwrap().starts_with(SEND_ERROR));
        assert_eq!(area.state(), ChatState::Loaded);
        // No retry.
        assert_eq!(transport.count(Method::Post, "chat/c/5"), 1);
    }

    #[tokio::test]
    async fn test_blank_send_is_rejected() {
        let transport = ScriptedTransport::new();
        let mut area = area(transport.clone()).await;
        let ticket = area.open(5);
        area.finish_load(ticket, Ok(Vec::new()));

        assert_eq!(area.send_message("   ", None).await, Err(SendRejected::Empty));
        assert!(area.messages().is_empty());
        assert!(transport.requests().is_empty());

        let image = Attachment::new("foto.png", "image/png", vec![1u8]);
        assert!(area.begin_send("", Some(&image)).is_ok());
    }

    #[tokio::test]
    async fn test_send_without_conversation() {
        let mut area = area(ScriptedTransport::new()).await;
        assert_eq!(area.begin_send("Hola", None), Err(SendRejected::NoConversation));
    }

    #[tokio::test]
    async fn test_missing_conversation_message() {
        let transport = ScriptedTransport::new();
        let mut area = area(transport).await;

        // Unscripted routes answer 404.
        area.load(99).await;
        assert_eq!(area.state(), ChatState::Error);
        assert!(area.error().unwrap().starts_with(NOT_FOUND));
    }

    #[tokio::test]
    async fn test_send_settling_after_switch_is_ignored() {
        let mut area = area(ScriptedTransport::new()).await;
        let ticket = area.open(1);
        area.finish_load(ticket, Ok(vec![msg(10, 1)]));
        let send = area.begin_send("hola", None).unwrap();

        let other = area.open(2);
        area.finish_load(other, Ok(vec![msg(20, 2)]));
        assert!(area.finish_send(send, Ok(None)).is_none());
        assert_eq!(area.messages().len(), 1);
        assert_eq!(area.messages()[0].id, 20);
    }

    #[tokio::test]
    async fn test_messages_sorted_chronologically() {
        let mut area = area(ScriptedTransport::new()).await;
        let ticket = area.open(1);
        let mut late = msg(2, 1);
        late.created_at = chrono::DateTime::parse_from_rfc3339("2024-05-01T11:00:00Z")
            .ok()
            .map(|d| d.with_timezone(&chrono::Utc));
        let mut early = msg(3, 1);
        early.created_at = chrono::DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .ok()
            .map(|d| d.with_timezone(&chrono::Utc));
        area.finish_load(ticket, Ok(vec![late, early]));
        assert_eq!(area.messages()[0].id, 3);
    }
}
