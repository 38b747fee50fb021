use crate::api::{Ack, ApiClient, ApiError};
use crate::models::{Topic, TopicCreate, TopicUpdate};

#[derive(Clone)]
pub struct TopicService {
    api: ApiClient,
}

impl TopicService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn by_subject(&self, subject_id: i64) -> Result<Vec<Topic>, ApiError> {
        self.api
            .get(&format!("topics/subject/{}", subject_id), &[])
            .await?
            .into_data()
    }

    pub async fn list(&self) -> Result<Vec<Topic>, ApiError> {
        self.api.get("topics", &[]).await?.into_data()
    }

    pub async fn get(&self, id: i64) -> Result<Topic, ApiError> {
        self.api.get(&format!("topics/{}", id), &[]).await?.into_data()
    }

    pub async fn create(&self, topic: &TopicCreate) -> Result<Topic, ApiError> {
        self.api.post("topics", topic).await?.into_data()
    }

    pub async fn update(&self, id: i64, changes: &TopicUpdate) -> Result<Topic, ApiError> {
        self.api.put(&format!("topics/{}", id), changes).await?.into_data()
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let _: Ack = self.api.delete(&format!("topics/{}", id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::testing::{logged_in_client, ok, ScriptedTransport};
    use crate::api::Method;
    use crate::models::Role;

    #[tokio::test]
    async fn test_by_subject() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            "topics/subject/2",
            200,
            ok(json!([{"id": 1, "subject_id": 2, "name": "Cinemática", "created_at": "2024-03-01 09:00:00"}])),
        );
        let topics = TopicService::new(logged_in_client(transport, Role::Teacher).await);

        let list = topics.by_subject(2).await.unwrap();
        assert_eq!(list[0].name, "Cinemática");
        assert!(list[0].created_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_data_is_an_error() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "topics/9", 200, json!({"message": "ok", "status": 200}));
        let topics = TopicService::new(logged_in_client(transport, Role::Teacher).await);

        let err = topics.get(9).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingData));
    }
}
