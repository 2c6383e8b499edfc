use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Unauthorized - session may have expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    #[error("Request rejected ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// 2xx response whose envelope reports `success: false`
    #[error("Request refused: {0}")]
    Refused(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err)
        }
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Human readable message: the server's `message`/`error` field when the
    /// body is JSON, otherwise the (truncated) raw body.
    fn body_message(body: &str) -> String {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
            for key in ["message", "error", "msg"] {
                if let Some(Value::String(msg)) = map.get(key) {
                    return Self::truncate_body(msg);
                }
            }
        }
        Self::truncate_body(body)
    }

    /// Field-level messages from either `{"errors": {"nim": ["..."]}}` or
    /// `{"errors": [{"field": "nim", "message": "..."}]}`.
    fn validation_fields(body: &str) -> BTreeMap<String, Vec<String>> {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return fields;
        };

        match value.get("errors") {
            Some(Value::Object(map)) => {
                for (field, messages) in map {
                    let entry = fields.entry(field.clone()).or_default();
                    match messages {
                        Value::String(m) => entry.push(m.clone()),
                        Value::Array(items) => entry.extend(
                            items.iter().filter_map(|m| m.as_str().map(str::to_string)),
                        ),
                        _ => {}
                    }
                }
            }
            Some(Value::Array(items)) => {
                for item in items {
                    let field = ["field", "path", "param"]
                        .iter()
                        .find_map(|k| item.get(*k).and_then(Value::as_str));
                    let message = ["message", "msg"]
                        .iter()
                        .find_map(|k| item.get(*k).and_then(Value::as_str));
                    if let (Some(field), Some(message)) = (field, message) {
                        fields
                            .entry(field.to_string())
                            .or_default()
                            .push(message.to_string());
                    }
                }
            }
            _ => {}
        }
        fields
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::body_message(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            400 | 422 => {
                let fields = Self::validation_fields(body);
                if status.as_u16() == 422 || !fields.is_empty() {
                    ApiError::Validation { message, fields }
                } else {
                    ApiError::Client {
                        status: status.as_u16(),
                        message,
                    }
                }
            }
            code @ 400..=499 => ApiError::Client {
                status: code,
                message,
            },
            code @ 500..=599 => ApiError::Server {
                status: code,
                message,
            },
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Validation { .. } => Some(422),
            ApiError::Client { status, .. } | ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Only server errors are worth retrying; client errors will not change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Server { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout)
    }
}
