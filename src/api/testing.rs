//! Scripted transport for exercising services and views without a backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use super::client::ApiClient;
use super::error::ApiError;
use super::transport::{ApiRequest, Method, RawResponse, Transport};
use crate::models::{Role, User};
use crate::session::Session;

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<Result<RawResponse, ApiError>>,
}

/// Answers requests from per-route queues. The last queued answer for a route
/// keeps being served; unscripted routes get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    log: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) {
        self.push(method, path, Ok(RawResponse {
            status,
            body: Bytes::from(body.to_string()),
        }));
    }

    pub fn on_raw(&self, method: Method, path: &str, status: u16, body: &'static str) {
        self.push(method, path, Ok(RawResponse {
            status,
            body: Bytes::from_static(body.as_bytes()),
        }));
    }

    pub fn fail(&self, method: Method, path: &str, error: ApiError) {
        self.push(method, path, Err(error));
    }

    fn push(&self, method: Method, path: &str, response: Result<RawResponse, ApiError>) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|r| r.method == method && r.path == path) {
            Some(route) => route.responses.push_back(response),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let (method, path) = (request.method, request.path.clone());
        self.log.lock().unwrap().push(request);

        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path);
        match route {
            Some(route) if route.responses.len() > 1 => route.responses.pop_front().unwrap(),
            Some(route) => route.responses.front().cloned().unwrap(),
            None => Ok(RawResponse {
                status: 404,
                body: Bytes::from(json!({"detail": format!("unscripted {}", path)}).to_string()),
            }),
        }
    }
}

pub fn ok(data: Value) -> Value {
    json!({ "data": data, "message": "ok", "status": 200 })
}

pub fn client(transport: Arc<ScriptedTransport>) -> ApiClient {
    ApiClient::new(transport, Arc::new(Session::new()))
}

pub fn test_user(role: Role) -> User {
    User {
        id: 1,
        email: "user@example.com".to_string(),
        full_name: Some("Usuario".to_string()),
        role,
        created_at: None,
    }
}

pub async fn logged_in_client(transport: Arc<ScriptedTransport>, role: Role) -> ApiClient {
    let session = Arc::new(Session::new());
    session
        .establish(test_user(role), "test-token".to_string())
        .await;
    ApiClient::new(transport, session)
}
