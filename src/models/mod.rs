pub mod attachment;
pub mod conversation;
pub mod document;
pub mod message;
pub mod subject;
pub mod timestamp;
pub mod topic;
pub mod user;

pub use attachment::Attachment;
pub use conversation::{Conversation, LastMessage};
pub use document::{Document, DocumentUpload, SubjectSummary, UploadReceipt};
pub use message::{ConversationStart, Message, MessagePair, NewConversation};
pub use subject::{Subject, SubjectCreate, SubjectUpdate, SubjectUsers, UserIds};
pub use topic::{Topic, TopicCreate, TopicUpdate};
pub use user::{AuthPayload, Credentials, Role, User, UserCreate, UserUpdate};

use serde::{Deserialize, Deserializer};

/// Treats a JSON `null` string as empty.
pub(crate) fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
