use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};

use crate::models::Conversation;
use crate::services::ChatService;
use crate::storage::Database;

use super::error_message;

pub const EMPTY_MESSAGE: &str = "No tienes conversaciones activas";
const LOAD_ERROR: &str = "Error al cargar las conversaciones. Por favor, intenta de nuevo.";
const DELETE_ERROR: &str = "Error al eliminar la conversación.";

#[derive(Debug, Clone, PartialEq)]
pub struct SidebarEntry {
    pub conversation: Conversation,
    pub title: String,
}

impl SidebarEntry {
    pub fn new(conversation: Conversation) -> Self {
        let title = display_title(&conversation);
        Self { conversation, title }
    }

    pub fn id(&self) -> i64 {
        self.conversation.id
    }

    pub fn pinned(&self) -> bool {
        self.conversation.pinned
    }

    pub fn preview(&self) -> Option<String> {
        self.conversation
            .last_message_summary()
            .map(|m| truncate_title(&m.text))
    }
}

/// Conversation list of the student screen.
pub struct ConversationSidebar {
    chat: ChatService,
    pin_store: Option<(Database, i64)>,
    entries: Vec<SidebarEntry>,
    active: Option<i64>,
    subject_filter: Option<i64>,
    search_term: String,
    loading: bool,
    error: Option<String>,
}

impl ConversationSidebar {
    pub fn new(chat: ChatService) -> Self {
        Self {
            chat,
            pin_store: None,
            entries: Vec::new(),
            active: None,
            subject_filter: None,
            search_term: String::new(),
            loading: false,
            error: None,
        }
    }

    /// Keeps pins across restarts for `user_id`.
    pub fn with_pin_store(mut self, db: Database, user_id: i64) -> Self {
        self.pin_store = Some((db, user_id));
        self
    }

    pub fn set_subject_filter(&mut self, subject_id: Option<i64>) {
        self.subject_filter = subject_id;
    }

    pub fn subject_filter(&self) -> Option<i64> {
        self.subject_filter
    }

    pub fn entries(&self) -> &[SidebarEntry] {
        &self.entries
    }

    pub fn active(&self) -> Option<i64> {
        self.active
    }

    pub fn active_entry(&self) -> Option<&SidebarEntry> {
        self.active.and_then(|id| self.entry(id))
    }

    pub fn entry(&self, id: i64) -> Option<&SidebarEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True when the list loaded fine and has nothing in it.
    pub fn is_empty_state(&self) -> bool {
        !self.loading && self.error.is_none() && self.entries.is_empty()
    }

    /// Fetches the user's conversations and returns the active one.
    pub async fn load_conversations(&mut self) -> Option<i64> {
        self.loading = true;
        self.error = None;

        let result = self.chat.my_conversations(self.subject_filter).await;
        self.loading = false;

        match result {
            Ok(conversations) => {
                tracing::debug!(count = conversations.len(), "Loaded conversations");
                let pins = self.stored_pins().await;
                self.entries = conversations.into_iter().map(SidebarEntry::new).collect();
                self.apply_pins(&pins);
                if !self.active.is_some_and(|id| self.entry(id).is_some()) {
                    self.active = self.entries.first().map(SidebarEntry::id);
                }
            }
            Err(e) => {
                tracing::error!("Failed to load conversations: {}", e);
                self.error = Some(error_message(&e, LOAD_ERROR));
            }
        }
        self.active
    }

    pub fn select_conversation(&mut self, id: i64) -> Option<i64> {
        if self.entry(id).is_some() {
            self.active = Some(id);
            Some(id)
        } else {
            None
        }
    }

    /// Deselects everything, e.g. before starting a new conversation.
    pub fn clear_selection(&mut self) {
        self.active = None;
    }

    pub async fn pin_conversation(&mut self, id: i64) {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id() == id) else {
            return;
        };
        entry.conversation.pinned = !entry.conversation.pinned;
        let pinned = entry.conversation.pinned;
        sort_entries(&mut self.entries);

        if let Some((db, user_id)) = &self.pin_store {
            if let Err(e) = db.set_pinned(*user_id, id, pinned).await {
                tracing::warn!("Failed to persist pin for conversation {}: {}", id, e);
            }
        }
    }

    /// Deletes on the backend first; the entry only leaves the list once the
    /// backend agreed. Returns the active conversation afterwards.
    pub async fn delete_conversation(&mut self, id: i64) -> Option<i64> {
        self.error = None;
        if let Err(e) = self.chat.delete_conversation(id).await {
            tracing::error!("Failed to delete conversation {}: {}", id, e);
            self.error = Some(error_message(&e, DELETE_ERROR));
            return self.active;
        }

        self.entries.retain(|e| e.id() != id);
        if let Some((db, user_id)) = &self.pin_store {
            if let Err(e) = db.set_pinned(*user_id, id, false).await {
                tracing::warn!("Failed to clear pin for conversation {}: {}", id, e);
            }
        }
        if self.active == Some(id) {
            self.active = self.entries.first().map(SidebarEntry::id);
        }
        self.active
    }

    /// Adds a conversation created from this screen and makes it active.
    pub fn add_conversation(&mut self, conversation: Conversation) {
        let id = conversation.id;
        self.entries.retain(|e| e.id() != id);
        self.entries.push(SidebarEntry::new(conversation));
        sort_entries(&mut self.entries);
        self.active = Some(id);
    }

    pub fn apply_pins(&mut self, pins: &HashSet<i64>) {
        for entry in &mut self.entries {
            if pins.contains(&entry.id()) {
                entry.conversation.pinned = true;
            }
        }
        sort_entries(&mut self.entries);
    }

    pub fn search(&mut self, term: &str) {
        self.search_term = term.trim().to_lowercase();
    }

    /// Entries matching the current search, in display order.
    pub fn visible(&self) -> Vec<&SidebarEntry> {
        self.entries
            .iter()
            .filter(|e| {
                self.search_term.is_empty() || e.title.to_lowercase().contains(&self.search_term)
            })
            .collect()
    }

    /// Visible entries grouped under headings: pinned first, then by age.
    /// Headings are dropped while searching.
    pub fn grouped(&self, now: DateTime<Utc>) -> Vec<(&'static str, Vec<&SidebarEntry>)> {
        let visible = self.visible();
        if !self.search_term.is_empty() {
            return vec![("", visible)];
        }

        let mut groups: Vec<(&'static str, Vec<&SidebarEntry>)> = Vec::new();
        for entry in visible {
            let label = if entry.pinned() {
                "Fijadas"
            } else {
                entry
                    .conversation
                    .created_at
                    .map(|dt| date_group(&dt, &now))
                    .unwrap_or("Anteriores")
            };
            match groups.last_mut() {
                Some((current, items)) if *current == label => items.push(entry),
                _ => groups.push((label, vec![entry])),
            }
        }
        groups
    }

    async fn stored_pins(&self) -> HashSet<i64> {
        let Some((db, user_id)) = &self.pin_store else {
            return HashSet::new();
        };
        match db.pinned_conversations(*user_id).await {
            Ok(pins) => pins,
            Err(e) => {
                tracing::warn!("Failed to read pinned conversations: {}", e);
                HashSet::new()
            }
        }
    }
}

/// Title shown in the list: explicit title, then document title, then the
/// last message, then a numbered fallback.
pub fn display_title(conversation: &Conversation) -> String {
    let non_empty = |s: &Option<String>| {
        s.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    non_empty(&conversation.title)
        .or_else(|| non_empty(&conversation.document_title))
        .or_else(|| {
            conversation
                .last_message_summary()
                .map(|m| truncate_title(&m.text))
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| format!("Conversación {}", conversation.id))
}

/// `text` on one line, cut to 47 characters plus `...` when longer than 50.
pub fn truncate_title(text: &str) -> String {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() > 50 {
        let head: String = line.chars().take(47).collect();
        format!("{}...", head)
    } else {
        line
    }
}

/// Pinned first, then newest first.
pub fn sort_entries(entries: &mut [SidebarEntry]) {
    entries.sort_by(|a, b| {
        b.pinned()
            .cmp(&a.pinned())
            .then_with(|| b.conversation.created_at.cmp(&a.conversation.created_at))
            .then_with(|| b.id().cmp(&a.id()))
    });
}

fn date_group(dt: &DateTime<Utc>, now: &DateTime<Utc>) -> &'static str {
    let today = now.date_naive();
    let date = dt.date_naive();

    if date == today {
        "Hoy"
    } else if date == today.pred_opt().unwrap_or(today) {
        "Ayer"
    } else if date.iso_week() == today.iso_week() && date.year() == today.year() {
        "Esta semana"
    } else {
        "Anteriores"
    }
}
