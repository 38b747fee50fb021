use crate::models::Attachment;

pub const IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];
const IMAGE_ONLY: &str = "Solo se permiten imágenes (PNG, JPG, GIF o WEBP).";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Send,
    Newline,
    Ignore,
}

/// What the user submitted.
#[derive(Debug, Clone)]
pub struct Submission {
    pub text: String,
    pub image: Option<Attachment>,
}

/// Composer below the chat: Enter sends, Shift+Enter starts a new line.
#[derive(Debug, Default)]
pub struct MessageInput {
    text: String,
    image: Option<Attachment>,
    sending: bool,
    error: Option<String>,
}

impl MessageInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn image(&self) -> Option<&Attachment> {
        self.image.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_sending(&mut self, sending: bool) {
        self.sending = sending;
    }

    pub fn is_disabled(&self) -> bool {
        self.sending
    }

    pub fn can_send(&self) -> bool {
        !self.sending && (!self.text.trim().is_empty() || self.image.is_some())
    }

    pub fn attach(&mut self, attachment: Attachment) -> Result<(), String> {
        if !IMAGE_TYPES.contains(&attachment.mime_type.as_str()) {
            self.error = Some(IMAGE_ONLY.to_string());
            return Err(IMAGE_ONLY.to_string());
        }
        self.error = None;
        self.image = Some(attachment);
        Ok(())
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    pub fn on_key(&mut self, enter: bool, shift: bool) -> KeyAction {
        match (enter, shift) {
            (true, false) => KeyAction::Send,
            (true, true) => {
                self.text.push('\n');
                KeyAction::Newline
            }
            _ => KeyAction::Ignore,
        }
    }

    /// Takes the trimmed text and the image, leaving the composer empty.
    /// Nothing is taken when there is nothing to send or a send is running.
    pub fn submit(&mut self) -> Option<Submission> {
        if !self.can_send() {
            return None;
        }
        let text = std::mem::take(&mut self.text).trim().to_string();
        Some(Submission {
            text,
            image: self.image.take(),
        })
    }
}
