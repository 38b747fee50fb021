pub mod auth;
pub mod chat;
pub mod documents;
pub mod markdown;
pub mod subjects;
pub mod topics;
pub mod users;

pub use auth::AuthService;
pub use chat::ChatService;
pub use documents::DocumentService;
pub use subjects::SubjectService;
pub use topics::TopicService;
pub use users::UserService;

use crate::api::ApiClient;

/// All backend services sharing one client.
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub chat: ChatService,
    pub documents: DocumentService,
    pub subjects: SubjectService,
    pub topics: TopicService,
    pub users: UserService,
}

impl Services {
    pub fn new(api: ApiClient) -> Self {
        Self {
            auth: AuthService::new(api.clone()),
            chat: ChatService::new(api.clone()),
            documents: DocumentService::new(api.clone()),
            subjects: SubjectService::new(api.clone()),
            topics: TopicService::new(api.clone()),
            users: UserService::new(api),
        }
    }
}
