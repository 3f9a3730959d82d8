//! API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::Session;

/// Snapshot of the caller's session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    /// Session identifier (also carried by the cookie).
    pub session_id: String,
    /// Whether the session was started by this request.
    pub is_new: bool,
    /// Stored values.
    pub values: Value,
}

impl SessionResponse {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id().to_string(),
            is_new: session.is_new(),
            values: session.to_json(),
        }
    }
}

/// Request to queue a flash message.
#[derive(Debug, Clone, Deserialize)]
pub struct FlashRequest {
    /// Message category, e.g. "success" or "error".
    pub kind: String,
    /// Message text.
    pub message: String,
}

/// Flash messages consumed by a read.
#[derive(Debug, Clone, Serialize)]
pub struct FlashResponse {
    pub kind: String,
    pub messages: Vec<String>,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "RESERVED_KEY").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn reserved_key(key: &str) -> Self {
        Self::new("RESERVED_KEY", format!("Key '{}' is reserved", key))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;

    #[test]
    fn test_flash_request() {
        let json = r#"{"kind": "success", "message": "saved"}"#;
        let req: FlashRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.kind, "success");
        assert_eq!(req.message, "saved");
    }

    #[test]
    fn test_flash_request_requires_fields() {
        assert!(serde_json::from_str::<FlashRequest>(r#"{"kind": "x"}"#).is_err());
    }

    #[test]
    fn test_session_response() {
        let session = Session::new(SessionId::parse("ab12").unwrap());
        session.insert("n", 1).unwrap();

        let json = serde_json::to_value(SessionResponse::from_session(&session)).unwrap();
        assert_eq!(json["session_id"], "ab12");
        assert_eq!(json["is_new"], true);
        assert_eq!(json["values"]["n"], 1);
    }

    #[test]
    fn test_error_response_serialization() {
        let err = ErrorResponse::new("TEST_ERROR", "Test message");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("TEST_ERROR"));
        assert!(json.contains("Test message"));
        assert!(!json.contains("details"));

        let json = serde_json::to_string(&err.with_details("more")).unwrap();
        assert!(json.contains("more"));
    }
}
