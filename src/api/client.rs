use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::envelope::{parse_error_message, ApiResponse};
use super::error::ApiError;
use super::form::Form;
use super::transport::{ApiRequest, Body, Method, RawResponse, Transport};
use crate::session::{EndReason, Session};

/// Thin wrapper over the REST backend: attaches the bearer token, decodes the
/// response envelope and ends the session when the backend rejects the token.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<Session>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// GET with optional query parameters; `None` values are left out.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, Option<String>)],
    ) -> Result<ApiResponse<T>, ApiError> {
        let query = query
            .iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
            .collect();
        self.send(Method::Get, path, query, Body::Empty).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, ApiError> {
        let body = to_json(body)?;
        self.send(Method::Post, path, Vec::new(), Body::Json(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, ApiError> {
        let body = to_json(body)?;
        self.send(Method::Put, path, Vec::new(), Body::Json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ApiError> {
        self.send(Method::Delete, path, Vec::new(), Body::Empty).await
    }

    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.send(Method::Post, path, Vec::new(), Body::Multipart(form)).await
    }

    /// Raw body of a GET, for file downloads that are not wrapped in the envelope.
    pub async fn get_bytes(&self, path: &str) -> Result<Bytes, ApiError> {
        let raw = self.dispatch(Method::Get, path, Vec::new(), Body::Empty).await?;
        Ok(raw.body)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Body,
    ) -> Result<ApiResponse<T>, ApiError> {
        let raw = self.dispatch(method, path, query, body).await?;

        if raw.body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(ApiResponse::empty(raw.status));
        }

        serde_json::from_slice(&raw.body).map_err(|e| {
            tracing::warn!(path, "Failed to decode response: {}", e);
            ApiError::InvalidResponse(format!("{}: {}", path, e))
        })
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Body,
    ) -> Result<RawResponse, ApiError> {
        let bearer = self.session.token();
        let had_token = bearer.is_some();
        let request_id = Uuid::new_v4();

        tracing::debug!(%request_id, method = method.as_str(), path, "API request");

        let request = ApiRequest {
            method,
            path: path.to_string(),
            query,
            body,
            bearer,
        };

        let raw = match self.transport.execute(request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(%request_id, path, "API request failed: {}", e);
                return Err(e);
            }
        };

        tracing::debug!(%request_id, status = raw.status, "API response");

        if raw.status == 401 && had_token {
            tracing::warn!(%request_id, path, "Token rejected by backend");
            self.session.invalidate(EndReason::Unauthorized).await;
            return Err(ApiError::Unauthorized);
        }

        if !raw.is_success() {
            let message = parse_error_message(raw.status, &raw.body);
            tracing::warn!(%request_id, path, status = raw.status, "API error: {}", message);
            return Err(ApiError::Status {
                status: raw.status,
                message,
            });
        }

        Ok(raw)
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::testing::{client, logged_in_client, ok, ScriptedTransport};
    use crate::api::Ack;
    use crate::models::Role;

    #[tokio::test]
    async fn test_bearer_attached_when_logged_in() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "subjects", 200, ok(json!([])));
        let api = logged_in_client(transport.clone(), Role::Admin).await;

        let resp: ApiResponse<Vec<serde_json::Value>> = api.get("subjects", &[]).await.unwrap();
        assert_eq!(resp.into_data().unwrap().len(), 0);

        let requests = transport.requests();
        assert_eq!(requests[0].bearer.as_deref(), Some("test-token"));
    }

    #[tokio::test]
    async fn test_no_bearer_when_logged_out() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "subjects", 200, ok(json!([])));
        let api = client(transport.clone());

        let _: ApiResponse<Vec<serde_json::Value>> = api.get("subjects", &[]).await.unwrap();
        assert!(transport.requests()[0].bearer.is_none());
    }

    #[tokio::test]
    async fn test_null_query_values_are_skipped() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "documents/list", 200, ok(json!([])));
        let api = client(transport.clone());

        let _: ApiResponse<Vec<serde_json::Value>> = api
            .get(
                "documents/list",
                &[("subject_id", Some("3".to_string())), ("topic_id", None)],
            )
            .await
            .unwrap();

        assert_eq!(
            transport.requests()[0].query,
            vec![("subject_id".to_string(), "3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_ends_session() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Get, "users/list", 401, json!({"detail": "Token expirado"}));
        let api = logged_in_client(transport.clone(), Role::Admin).await;
        let mut rx = api.session().subscribe();

        let err = api
            .get::<Vec<serde_json::Value>>("users/list", &[])
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!api.session().is_logged_in());
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().ended,
            Some(EndReason::Unauthorized)
        );
        // Single attempt, no retry.
        assert_eq!(transport.count(Method::Get, "users/list"), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_without_token_keeps_server_message() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Post, "auth/login", 401, json!({"detail": "Credenciales incorrectas"}));
        let api = client(transport);

        let err = api
            .post::<serde_json::Value, _>("auth/login", &json!({"email": "a@b.c"}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.server_message(), Some("Credenciales incorrectas"));
    }

    #[tokio::test]
    async fn test_server_error_carries_status_and_message() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Delete, "subjects/4", 404, json!({"detail": "Asignatura no encontrada"}));
        let api = client(transport);

        let err = api.delete::<serde_json::Value>("subjects/4").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.server_message(), Some("Asignatura no encontrada"));
    }

    #[tokio::test]
    async fn test_empty_body_is_accepted_for_acks() {
        let transport = ScriptedTransport::new();
        transport.on_raw(Method::Delete, "topics/2", 204, "");
        let api = client(transport);

        let resp: Ack = api.delete("topics/2").await.unwrap();
        assert_eq!(resp.status, 204);
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let transport = ScriptedTransport::new();
        transport.fail(Method::Get, "subjects", ApiError::Network("connection refused".into()));
        let api = client(transport);

        let err = api.get::<Vec<serde_json::Value>>("subjects", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
