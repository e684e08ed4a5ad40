//! Gateway-style request/response envelopes.

use serde::{Deserialize, Serialize};
use serde_json::json;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// An HTTP-style invocation. Only the raw body matters to the handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiRequest {
    #[serde(default)]
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
        }
    }

    /// A request with no body at all (read as `{}`).
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Status code plus a serialized body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: String,
    #[serde(skip)]
    pub content_type: &'static str,
}

impl ApiResponse {
    /// Serialize `value` as the body. A value that cannot be serialized turns
    /// into a 500 with the serializer's message.
    pub fn json<T: Serialize + ?Sized>(status_code: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status_code,
                body,
                content_type: CONTENT_TYPE_JSON,
            },
            Err(err) => Self::error(500, err.to_string()),
        }
    }

    /// `{"error": <message>}`.
    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            body: json!({ "error": message.into() }).to_string(),
            content_type: CONTENT_TYPE_JSON,
        }
    }

    /// Plain-string body.
    pub fn text(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            content_type: CONTENT_TYPE_TEXT,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Body parsed back into JSON, if it is JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies_are_json_objects() {
        let res = ApiResponse::error(400, "Task is required");
        assert_eq!(res.status_code, 400);
        assert_eq!(res.json_body(), Some(json!({ "error": "Task is required" })));
        assert!(!res.is_success());
    }

    #[test]
    fn text_bodies_are_left_alone() {
        let res = ApiResponse::text(200, "No messages to re-drive.");
        assert_eq!(res.body, "No messages to re-drive.");
        assert_eq!(res.content_type, CONTENT_TYPE_TEXT);
        assert!(res.is_success());
    }

    #[test]
    fn request_deserializes_without_body() {
        let req: ApiRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, ApiRequest::empty());
    }
}
