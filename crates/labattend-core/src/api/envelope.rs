//! Canonical result envelope and response-shape normalisation.
//!
//! The backend has returned the same logical payload in several shapes over
//! time:
//!
//! - a bare array: `[{...}, {...}]`
//! - flattened under `data`: `{"success": true, "data": [{...}]}`
//! - nested under a resource key: `{"data": {"members": [{...}]}}`
//!
//! `extract_list` and `extract_one` resolve all of them without failing on a
//! shape mismatch; an unrecognised shape yields an empty/absent value.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiError;

/// Uniform result of a read operation.
///
/// Failures carry `T::default()` so callers can render without branching.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn into_result(self) -> Result<T, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self
                .message
                .unwrap_or_else(|| "Request failed".to_string()))
        }
    }
}

impl<T: Default> ApiResponse<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: T::default(),
            message: Some(message.into()),
        }
    }

    /// Fold a fallible call into the envelope, logging the failure.
    pub fn from_result(operation: &str, result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                warn!(operation = operation, error = %e, "Request failed");
                Self::failure(e.to_string())
            }
        }
    }
}

fn locate_list<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    if let Value::Array(items) = value {
        return Some(items);
    }
    let data = value.get("data");
    if let Some(Value::Array(items)) = data {
        return Some(items);
    }
    for key in keys {
        if let Some(Value::Array(items)) = data.and_then(|d| d.get(*key)) {
            return Some(items);
        }
        if let Some(Value::Array(items)) = value.get(*key) {
            return Some(items);
        }
    }
    None
}

/// Pull a list of `T` out of any of the known envelope shapes.
///
/// Items that fail to decode are skipped.
pub fn extract_list<T: DeserializeOwned>(value: &Value, keys: &[&str]) -> Vec<T> {
    let Some(items) = locate_list(value, keys) else {
        debug!(keys = ?keys, "No list found in response, using empty list");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = %e, "Skipping list item that failed to parse");
                None
            }
        })
        .collect()
}

/// Pull a single `T` out of `{data: {key: {...}}}`, `{key: {...}}`,
/// `{data: {...}}` or a bare object, in that order.
pub fn extract_one<T: DeserializeOwned>(value: &Value, keys: &[&str]) -> Option<T> {
    let data = value.get("data");
    let mut candidates: Vec<&Value> = Vec::new();
    for key in keys {
        if let Some(nested) = data.and_then(|d| d.get(*key)) {
            candidates.push(nested);
        }
        if let Some(top) = value.get(*key) {
            candidates.push(top);
        }
    }
    if let Some(d) = data {
        candidates.push(d);
    }
    candidates.push(value);

    candidates
        .into_iter()
        .filter(|c| c.is_object())
        .find_map(|c| serde_json::from_value::<T>(c.clone()).ok())
}

/// The server's human-readable `message`, if it sent one.
pub fn message(value: &Value) -> Option<String> {
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// `Some(message)` when a successful HTTP response carries an envelope
/// that declares failure.
pub fn declared_failure(value: &Value) -> Option<String> {
    match value.get("success") {
        Some(Value::Bool(false)) => {
            Some(message(value).unwrap_or_else(|| "Request was not successful".to_string()))
        }
        _ => None,
    }
}
