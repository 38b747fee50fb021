use serde::de::IgnoredAny;
use serde::Deserialize;

use super::error::ApiError;

/// Uniform `{ data, message, status }` wrapper returned by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default, deserialize_with = "crate::models::string_or_null")]
    pub message: String,
    #[serde(default = "default_status")]
    pub status: u16,
}

/// Response whose payload is irrelevant (deletes, acknowledgements).
pub type Ack = ApiResponse<IgnoredAny>;

fn default_status() -> u16 {
    200
}

impl<T> ApiResponse<T> {
    pub fn empty(status: u16) -> Self {
        Self {
            data: None,
            message: String::new(),
            status,
        }
    }

    pub fn into_data(self) -> Result<T, ApiError> {
        self.data.ok_or(ApiError::MissingData)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Pull a human readable message out of an error body.
pub fn parse_error_message(status: u16, body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        let detail = parsed.detail.and_then(|d| match d {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });
        if let Some(msg) = detail.or(parsed.error).or(parsed.message) {
            if !msg.is_empty() {
                return msg;
            }
        }
    }
    format!("Request failed with status {}", status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_decodes_data() {
        let json = r#"{"data":[1,2,3],"message":"ok","status":200}"#;
        let resp: ApiResponse<Vec<i64>> = serde_json::from_str(json).unwrap();
        assert_eq!(resp.message, "ok");
        assert_eq!(resp.into_data().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_data_is_an_error() {
        let resp: ApiResponse<Vec<i64>> = serde_json::from_str(r#"{"message":null}"#).unwrap();
        assert_eq!(resp.status, 200);
        assert!(matches!(resp.into_data(), Err(ApiError::MissingData)));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Receipt {
        id: i64,
    }

    fn decode<T: serde::de::DeserializeOwned>(body: &str) -> ApiResponse<T> {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_payload_without_default() {
        let resp: ApiResponse<Receipt> = decode(r#"{"data":{"id":4}}"#);
        assert_eq!(resp.into_data().unwrap(), Receipt { id: 4 });

        let resp: ApiResponse<Receipt> = decode(r#"{"message":"sin datos"}"#);
        assert!(resp.data.is_none());
    }

    #[test]
    fn test_parse_error_message_prefers_detail() {
        assert_eq!(
            parse_error_message(404, br#"{"detail":"Asignatura no encontrada"}"#),
            "Asignatura no encontrada"
        );
        assert_eq!(
            parse_error_message(400, br#"{"data":null,"error":"bad input","status":400}"#),
            "bad input"
        );
        assert_eq!(
            parse_error_message(500, b"<html>"),
            "Request failed with status 500"
        );
    }
}
