//! Error types shared by the API layer and the stores.
//!
//! Library errors are plain `thiserror` enums. Their `Display` text is what
//! ends up in an envelope's `message` and in a store's `error` slot, so the
//! wording is written for an operator, not for a developer.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Failure of a single admin API call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("Cannot reach admin API at {0}")]
    Connect(String),

    #[error("Connection to {0} timed out")]
    Timeout(String),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Invalid response from admin API: {0}")]
    Decode(String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ApiError {
    /// HTTP status of the failed call, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build a status error from an HTTP status and the raw response body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| extract_error_message(&json))
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty() && !trimmed.starts_with('<')).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| status_message(status));
        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

/// Client-side validation failure. Raised before any request is issued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Type DELETE to confirm this action")]
    ConfirmationMismatch,

    #[error("Start date {start} is after end date {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("At least one recipient is required")]
    NoRecipients,
}

/// Configuration could not be resolved.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Admin dashboard URL is not configured")]
    MissingUrl,

    #[error("Admin API key is not configured")]
    MissingApiKey,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Generic message for a status code without a usable body.
pub(crate) fn status_message(status: StatusCode) -> String {
    match status.as_u16() {
        400 => "Bad request".to_string(),
        401 => "API key is invalid or expired".to_string(),
        403 => "Not authorized for this admin action".to_string(),
        404 => "Admin API endpoint not found".to_string(),
        422 => "Request validation failed".to_string(),
        s if s >= 500 => format!("Admin API server error (HTTP {s})"),
        s => format!("Unexpected response from admin API (HTTP {s})"),
    }
}

/// Pick the most useful message out of an error body.
///
/// Order of preference:
/// - validation array (`detail: [{loc: [..., field], msg}]`) as `field: msg` pairs
/// - string `detail` / `message` / `error`
/// - any other `detail` object as JSON text
pub(crate) fn extract_error_message(json: &Value) -> Option<String> {
    if let Some(detail) = json.get("detail") {
        match detail {
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .filter_map(validation_pair)
                    .collect::<Vec<_>>()
                    .join(", ");
                if !joined.is_empty() {
                    return Some(joined);
                }
            }
            Value::String(s) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Value::Null => {}
            other => return Some(other.to_string()),
        }
    }

    for key in ["message", "error"] {
        match json.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Object(obj)) if !obj.is_empty() => {
                return Some(Value::Object(obj.clone()).to_string())
            }
            _ => {}
        }
    }
    None
}

fn validation_pair(item: &Value) -> Option<String> {
    let msg = item.get("msg").and_then(Value::as_str)?;
    let field = item
        .get("loc")
        .and_then(Value::as_array)
        .and_then(|loc| loc.last())
        .map(|last| match last {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    Some(match field {
        Some(field) => format!("{field}: {msg}"),
        None => msg.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_array_is_joined_as_field_pairs() {
        let body = json!({
            "detail": [
                { "loc": ["query", "title"], "msg": "field required" },
                { "loc": ["query", "type"], "msg": "value is not a valid enumeration member" }
            ]
        });
        assert_eq!(
            extract_error_message(&body).as_deref(),
            Some("title: field required, type: value is not a valid enumeration member")
        );
    }

    #[test]
    fn string_detail_wins_over_message() {
        let body = json!({ "detail": "Notification not found", "message": "ignored" });
        assert_eq!(
            extract_error_message(&body).as_deref(),
            Some("Notification not found")
        );
    }

    #[test]
    fn object_detail_is_stringified() {
        let body = json!({ "detail": { "code": 7 } });
        assert_eq!(
            extract_error_message(&body).as_deref(),
            Some(r#"{"code":7}"#)
        );
    }

    #[test]
    fn from_response_falls_back_to_status_text() {
        let err = ApiError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "Admin API server error (HTTP 500)");

        let html = ApiError::from_response(StatusCode::NOT_FOUND, "<html>nope</html>");
        assert_eq!(html.to_string(), "Admin API endpoint not found");
    }

    #[test]
    fn from_response_keeps_plain_text_body() {
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, "days must be positive");
        assert_eq!(err.to_string(), "days must be positive");
    }
}
