//! The `{success, data, message}` envelope every API wrapper returns.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> Envelope<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
        }
    }

    /// Wrap a call result. Errors become a failed envelope carrying the
    /// error's display text.
    pub fn from_result(result: Result<T, ApiError>, success_message: &str) -> Self {
        match result {
            Ok(data) => Self::ok(data, success_message),
            Err(e) => Self::fail(e.to_string()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            success: self.success,
            data: self.data.map(f),
            message: self.message,
        }
    }

    pub fn as_ref(&self) -> Envelope<&T> {
        Envelope {
            success: self.success,
            data: self.data.as_ref(),
            message: self.message.clone(),
        }
    }

    /// `Ok(data)` on success, the message otherwise. A successful envelope
    /// without data is still a success for write calls, so `data` stays an
    /// `Option`.
    pub fn into_result(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_carries_error_text_and_no_data() {
        let env: Envelope<u32> =
            Envelope::from_result(Err(ApiError::Timeout("http://localhost:8000".into())), "ok");
        assert!(!env.success);
        assert!(env.data.is_none());
        assert_eq!(env.message, "Connection to http://localhost:8000 timed out");
        assert_eq!(
            env.into_result(),
            Err("Connection to http://localhost:8000 timed out".to_string())
        );
    }

    #[test]
    fn serializes_with_null_data() {
        let env: Envelope<Vec<u8>> = Envelope::fail("nope");
        assert_eq!(
            serde_json::to_value(&env).expect("serialize"),
            serde_json::json!({ "success": false, "data": null, "message": "nope" })
        );
    }

    #[test]
    fn map_keeps_flags() {
        let env = Envelope::ok(2, "done").map(|n| n * 10);
        assert_eq!(env, Envelope::ok(20, "done"));
    }
}
