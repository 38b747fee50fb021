use crate::api::{Ack, ApiClient, ApiError};
use crate::models::{Subject, SubjectCreate, SubjectUpdate, SubjectUsers, User, UserIds};

#[derive(Clone)]
pub struct SubjectService {
    api: ApiClient,
}

impl SubjectService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Result<Vec<Subject>, ApiError> {
        self.api.get("subjects", &[]).await?.into_data()
    }

    pub async fn get(&self, id: i64) -> Result<Subject, ApiError> {
        self.api.get(&format!("subjects/{}", id), &[]).await?.into_data()
    }

    pub async fn create(&self, subject: &SubjectCreate) -> Result<Subject, ApiError> {
        self.api.post("subjects", subject).await?.into_data()
    }

    pub async fn update(&self, id: i64, changes: &SubjectUpdate) -> Result<Subject, ApiError> {
        self.api.put(&format!("subjects/{}", id), changes).await?.into_data()
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<Subject, ApiError> {
        let changes = SubjectUpdate {
            active: Some(active),
            ..Default::default()
        };
        self.update(id, &changes).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let _: Ack = self.api.delete(&format!("subjects/{}", id)).await?;
        Ok(())
    }

    pub async fn users(&self, id: i64) -> Result<SubjectUsers, ApiError> {
        self.api.get(&format!("subjects/{}/users", id), &[]).await?.into_data()
    }

    /// Replaces the set of users assigned to a subject.
    pub async fn assign_users(&self, id: i64, user_ids: Vec<i64>) -> Result<Vec<User>, ApiError> {
        let body = UserIds { user_ids };
        let response = self.api.put(&format!("subjects/{}/users", id), &body).await?;
        Ok(response.data.unwrap_or_default())
    }
}
