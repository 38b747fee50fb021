//! The authenticated user and token, owned in one place and observed through
//! a watch channel. Mirrored to local storage when a store is attached.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::watch;

use crate::models::{Role, User};
use crate::storage::Database;

const TOKEN_KEY: &str = "auth_token";
const USER_KEY: &str = "current_user";

/// Why the last session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    LoggedOut,
    Unauthorized,
    Expired,
}

#[derive(Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    token: Option<String>,
    pub ended: Option<EndReason>,
}

impl SessionSnapshot {
    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[cfg(test)]
    pub fn for_role(role: Option<Role>) -> Self {
        Self {
            user: role.map(|role| User {
                id: 1,
                email: "test@example.com".to_string(),
                full_name: None,
                role,
                created_at: None,
            }),
            token: role.map(|_| "token".to_string()),
            ended: None,
        }
    }
}

impl std::fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("ended", &self.ended)
            .finish()
    }
}

pub struct Session {
    state: watch::Sender<SessionSnapshot>,
    store: Option<Database>,
}

impl Session {
    /// A session that lives only in memory.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self { state, store: None }
    }

    /// Rebuild the session mirrored in `store`, discarding unreadable or
    /// expired entries.
    pub async fn restore(store: Database) -> Self {
        let token = match store.get_setting(TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("Failed to read stored token: {}", e);
                None
            }
        };

        let user = match store.get_setting(USER_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<User>(&json) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("Discarding unreadable stored user: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::error!("Failed to read stored user: {}", e);
                None
            }
        };

        let (state, _) = watch::channel(SessionSnapshot::default());
        let session = Self {
            state,
            store: Some(store),
        };

        match (token, user) {
            (Some(token), Some(user)) if !is_expired(&token, Utc::now()) => {
                tracing::info!(user_id = user.id, "Restored stored session");
                session.state.send_replace(SessionSnapshot {
                    user: Some(user),
                    token: Some(token),
                    ended: None,
                });
            }
            (Some(_), Some(_)) => session.end(EndReason::Expired).await,
            (None, None) => {}
            _ => session.end(EndReason::LoggedOut).await,
        }

        session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().is_logged_in()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub async fn establish(&self, user: User, token: String) {
        if let Some(store) = &self.store {
            if let Err(e) = store.set_setting(TOKEN_KEY, &token).await {
                tracing::error!("Failed to persist token: {}", e);
            }
            self.persist_user(store, &user).await;
        }
        tracing::info!(user_id = user.id, role = user.role.as_str(), "Session established");
        self.state.send_replace(SessionSnapshot {
            user: Some(user),
            token: Some(token),
            ended: None,
        });
    }

    /// Replace the cached user after a profile refresh. Ignored when logged out.
    pub async fn update_user(&self, user: User) {
        if !self.is_logged_in() {
            return;
        }
        if let Some(store) = &self.store {
            self.persist_user(store, &user).await;
        }
        self.state.send_modify(|state| state.user = Some(user));
    }

    pub async fn logout(&self) {
        self.end(EndReason::LoggedOut).await;
    }

    /// Forced teardown, e.g. after the backend rejected the token.
    pub async fn invalidate(&self, reason: EndReason) {
        if !self.is_logged_in() {
            return;
        }
        tracing::warn!(?reason, "Session invalidated");
        self.end(reason).await;
    }

    async fn persist_user(&self, store: &Database, user: &User) {
        match serde_json::to_string(user) {
            Ok(json) => {
                if let Err(e) = store.set_setting(USER_KEY, &json).await {
                    tracing::error!("Failed to persist user: {}", e);
                }
            }
            Err(e) => tracing::error!("Failed to serialize user: {}", e),
        }
    }

    async fn end(&self, reason: EndReason) {
        if let Some(store) = &self.store {
            for key in [TOKEN_KEY, USER_KEY] {
                if let Err(e) = store.delete_setting(key).await {
                    tracing::error!("Failed to clear {}: {}", key, e);
                }
            }
        }
        self.state.send_replace(SessionSnapshot {
            user: None,
            token: None,
            ended: Some(reason),
        });
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Expiry claim of a JWT, if the token is one and carries `exp`.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// Opaque tokens are never considered expired locally.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    token_expiry(token).is_some_and(|exp| exp <= now)
}
