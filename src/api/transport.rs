use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use url::Url;

use super::error::ApiError;
use super::form::Form;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Multipart(Form),
}

#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured API root, e.g. `subjects/3`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
    pub bearer: Option<String>,
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("bearer", &self.bearer.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Moves a request over the wire. One attempt per call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ApiError>;
}

pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut normalized = base_url.trim().trim_end_matches('/').to_string();
        normalized.push('/');
        let base_url = Url::parse(&normalized)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid API URL {}: {}", base_url, e)))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid path {}: {}", path, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let url = self.endpoint(&request.path)?;

        let mut req = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Delete => self.client.delete(url),
        };

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        if let Some(token) = &request.bearer {
            req = req.bearer_auth(token);
        }

        req = match request.body {
            Body::Empty => req,
            Body::Json(value) => req.json(&value),
            Body::Multipart(form) => req.multipart(form.into_reqwest()?),
        };

        let response = req
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_api_prefix() {
        let transport = HttpTransport::new("http://localhost:8000/api/v1", None).unwrap();
        assert_eq!(
            transport.endpoint("subjects/3/users").unwrap().as_str(),
            "http://localhost:8000/api/v1/subjects/3/users"
        );
        assert_eq!(
            transport.endpoint("/chat/me/conversations").unwrap().as_str(),
            "http://localhost:8000/api/v1/chat/me/conversations"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpTransport::new("not a url", None),
            Err(ApiError::InvalidRequest(_))
        ));
    }
}
