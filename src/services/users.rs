use crate::api::{Ack, ApiClient, ApiError};
use crate::models::{Role, Subject, User, UserCreate, UserUpdate};

#[derive(Clone)]
pub struct UserService {
    api: ApiClient,
}

impl UserService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list_all(&self) -> Result<Vec<User>, ApiError> {
        self.api.get("users/list", &[]).await?.into_data()
    }

    pub async fn list_by_role(&self, role: Role) -> Result<Vec<User>, ApiError> {
        self.api
            .get(&format!("users/list/{}", role.as_str()), &[])
            .await?
            .into_data()
    }

    pub async fn get(&self, id: i64) -> Result<User, ApiError> {
        self.api.get(&format!("users/{}", id), &[]).await?.into_data()
    }

    pub async fn create(&self, user: &UserCreate) -> Result<User, ApiError> {
        self.api.post("users/register", user).await?.into_data()
    }

    pub async fn update(&self, id: i64, changes: &UserUpdate) -> Result<User, ApiError> {
        self.api.put(&format!("users/{}", id), changes).await?.into_data()
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let _: Ack = self.api.delete(&format!("users/{}", id)).await?;
        Ok(())
    }

    pub async fn subjects_of(&self, id: i64) -> Result<Vec<Subject>, ApiError> {
        self.api
            .get(&format!("users/{}/subjects", id), &[])
            .await?
            .into_data()
    }

    /// Subjects the logged-in user is enrolled in or teaches.
    pub async fn my_subjects(&self) -> Result<Vec<Subject>, ApiError> {
        self.api.get("users/me/subjects", &[]).await?.into_data()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::testing::{logged_in_client, ok, ScriptedTransport};
    use crate::api::{Body, Method};

    #[tokio::test]
    async fn test_list_by_role_path() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Get,
            "users/list/teacher",
            200,
            ok(json!([{"id": 2, "email": "t@x.es", "name": "Tere", "role": "teacher"}])),
        );
        let users = UserService::new(logged_in_client(transport, Role::Admin).await);

        let teachers = users.list_by_role(Role::Teacher).await.unwrap();
        assert_eq!(teachers[0].display_name(), "Tere");
    }

    #[tokio::test]
    async fn test_update_skips_unset_fields() {
        let transport = ScriptedTransport::new();
        transport.on(
            Method::Put,
            "users/2",
            200,
            ok(json!({"id": 2, "email": "t@x.es", "role": "admin"})),
        );
        let users = UserService::new(logged_in_client(transport.clone(), Role::Admin).await);

        let changes = UserUpdate {
            role: Some(Role::Admin),
            ..Default::default()
        };
        users.update(2, &changes).await.unwrap();
        match &transport.requests()[0].body {
            Body::Json(body) => assert_eq!(body, &json!({"role": "admin"})),
            other => panic!("Expected JSON body, got {:?}", other),
        }
    }
}
