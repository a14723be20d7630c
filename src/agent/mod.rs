pub mod attachment;
pub mod builder;
pub mod client;
pub mod reply;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;
pub use attachment::{Attachment, AttachmentError, AttachmentKind, FileInput};

/// Opaque key-value mapping passed through to the agent unmodified.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sync,
    Async,
}

/// Payload posted to `{base}/agent/run`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRequest {
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub with_tts: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Identifiers correlating a request with a user and a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    pub customer_id: Option<String>,
    pub session_id: Option<String>,
}

impl Correlation {
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            customer_id: None,
            session_id: Some(session_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Field-level validation failures, reported before any network call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field == field)
    }

    pub fn into_result(self) -> Result<(), AgentError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid request: {0}")]
    Validation(ValidationErrors),
    #[error("Attachment error: {0}")]
    Attachment(#[from] AttachmentError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Agent request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },
}

impl AgentError {
    /// Transport failures are the ones a caller may choose to resubmit.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AgentError::Http(_) | AgentError::Timeout(_) | AgentError::Api { .. }
        )
    }

    /// Message suitable for showing in the conversation.
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Timeout(_) => {
                "The assistant took too long to respond. Please try again.".to_string()
            }
            AgentError::Api { .. } | AgentError::Http(_) => {
                "The assistant could not be reached. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl Serialize for AgentError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_defaults() {
        let request = AgentRequest {
            message: "hi".into(),
            attachments: vec![],
            customer_id: None,
            session_id: Some("s-1".into()),
            execution_mode: ExecutionMode::default(),
            with_tts: false,
            metadata: Metadata::new(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["execution_mode"], "sync");
        assert_eq!(value["with_tts"], false);
        assert_eq!(value["session_id"], "s-1");
        assert!(value.get("customer_id").is_none());
    }

    #[test]
    fn test_validation_errors_display() {
        let mut errors = ValidationErrors::default();
        errors.add("prompt", "must not be empty");
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: prompt: must not be empty");
        assert!(!err.is_transport());
    }

    #[test]
    fn test_error_serializes_as_string() {
        let err = AgentError::Api {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            "\"API error: 502 - bad gateway\""
        );
    }
}
