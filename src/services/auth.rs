use crate::api::{ApiClient, ApiError};
use crate::models::{AuthPayload, Credentials, User, UserCreate};

#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Exchanges credentials for a token and makes it the active session.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let payload: AuthPayload = self.api.post("auth/login", &credentials).await?.into_data()?;
        tracing::info!(user_id = payload.user.id, role = payload.user.role.as_str(), "Logged in");
        self.api
            .session()
            .establish(payload.user.clone(), payload.access_token)
            .await;
        Ok(payload.user)
    }

    pub async fn register(&self, user: &UserCreate) -> Result<User, ApiError> {
        self.api.post("users/register", user).await?.into_data()
    }

    /// Re-reads the logged-in user, e.g. after a restored session.
    pub async fn refresh_current_user(&self) -> Result<User, ApiError> {
        let user: User = self.api.get("users/me", &[]).await?.into_data()?;
        self.api.session().update_user(user.clone()).await;
        Ok(user)
    }

    pub async fn logout(&self) {
        self.api.session().logout().await;
    }
}
