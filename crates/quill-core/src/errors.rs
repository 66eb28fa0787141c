//! Error types for the chat-to-document action pipeline
//!
//! Every failure the pipeline can hit is a variant of [`QuillError`]. Failures are
//! caught where the action is attempted and rendered into an assistant message with
//! [`QuillError::user_message`], so none of them end a session or leave the ledger
//! half-updated.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::core_types::ChangeStatus;

static AUTH_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b401\b|invalid_api_key").expect("auth marker regex"));

static RATE_LIMIT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b429\b|rate_limit").expect("rate limit marker regex"));

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuillError {
    #[error("Target not found: {0}")]
    TargetNotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Authentication failed: {0}")]
    AuthError(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Transport error: {0}")]
    TransportError(String),
    #[error("Storage failure: {0}")]
    StorageFailure(String),
    #[error("Document already exists: {0}")]
    AlreadyExists(String),
    #[error("No content matching '{pattern}' in {document}")]
    PatternNotFound { pattern: String, document: String },
    #[error("Change not found: {0}")]
    ChangeNotFound(String),
    #[error("Change {id} is already {status}")]
    ChangeAlreadyResolved { id: String, status: ChangeStatus },
    #[error("A confirmation is already pending: {0}")]
    ConfirmationPending(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("I/O error: {0}")]
    IoError(String),
}

impl QuillError {
    /// Maps a free-text adapter failure onto the transport taxonomy.
    ///
    /// Adapters that only surface a message (no status code) are classified by the
    /// usual provider markers: `401`/`invalid_api_key` and `429`/`rate_limit`. Status
    /// codes only count as standalone numbers, so "4010 tokens" stays a transport error.
    pub fn classify_transport(message: impl Into<String>) -> Self {
        let message = message.into();
        if AUTH_MARKER.is_match(&message) {
            QuillError::AuthError(message)
        } else if RATE_LIMIT_MARKER.is_match(&message) {
            QuillError::RateLimited(message)
        } else {
            QuillError::TransportError(message)
        }
    }

    /// Errors that cut a model stream short regardless of what was received.
    pub fn is_terminal_stream_error(&self) -> bool {
        matches!(self, QuillError::AuthError(_) | QuillError::RateLimited(_))
    }

    /// Text shown to the user as the assistant's reply.
    pub fn user_message(&self) -> String {
        match self {
            QuillError::AuthError(_) => "API key error: The API key appears to be invalid or missing. Please check your API key in the settings.".to_string(),
            QuillError::RateLimited(_) => "Rate limit exceeded: The service is currently rate-limited. Please try again later or switch to a different model.".to_string(),
            QuillError::TransportError(msg) => {
                format!("Error: Unable to get a response from the model. {}", msg)
            }
            QuillError::TargetNotFound(msg) => format!("No target file found. {}", msg),
            QuillError::ValidationError(msg) => msg.clone(),
            QuillError::StorageFailure(msg) => format!("Failed to update the file: {}", msg),
            QuillError::AlreadyExists(name) => {
                format!("File '{}' already exists. Please choose a different name.", name)
            }
            QuillError::PatternNotFound { pattern, document } => {
                format!("Could not find content matching \"{}\" in {}.", pattern, document)
            }
            QuillError::ChangeNotFound(_) => "Change not found.".to_string(),
            QuillError::ChangeAlreadyResolved { status, .. } => {
                format!("This change has already been {}.", status)
            }
            other => format!("Sorry, an error occurred: {}", other),
        }
    }
}

impl From<std::io::Error> for QuillError {
    fn from(err: std::io::Error) -> Self {
        QuillError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for QuillError {
    fn from(err: reqwest::Error) -> Self {
        match err.status().map(|s| s.as_u16()) {
            Some(401) => QuillError::AuthError(err.to_string()),
            Some(429) => QuillError::RateLimited(err.to_string()),
            _ => QuillError::TransportError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for QuillError {
    fn from(err: serde_json::Error) -> Self {
        QuillError::ParsingError(err.to_string())
    }
}

impl From<regex::Error> for QuillError {
    fn from(err: regex::Error) -> Self {
        QuillError::ValidationError(format!("Invalid pattern: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_transport() {
        assert!(matches!(
            QuillError::classify_transport("HTTP 401 Unauthorized"),
            QuillError::AuthError(_)
        ));
        assert!(matches!(
            QuillError::classify_transport("error code: invalid_api_key"),
            QuillError::AuthError(_)
        ));
        assert!(matches!(
            QuillError::classify_transport("429 Too Many Requests"),
            QuillError::RateLimited(_)
        ));
        assert!(matches!(
            QuillError::classify_transport("connection reset"),
            QuillError::TransportError(_)
        ));
    }

    #[test]
    fn test_classify_ignores_codes_inside_numbers() {
        assert!(matches!(
            QuillError::classify_transport("you requested 4010 tokens"),
            QuillError::TransportError(_)
        ));
        assert!(matches!(
            QuillError::classify_transport("Stream interrupted after 4290 bytes"),
            QuillError::TransportError(_)
        ));
    }

    #[test]
    fn test_terminal_stream_errors() {
        assert!(QuillError::AuthError("x".into()).is_terminal_stream_error());
        assert!(QuillError::RateLimited("x".into()).is_terminal_stream_error());
        assert!(!QuillError::TransportError("x".into()).is_terminal_stream_error());
    }

    #[test]
    fn test_user_message_for_transport() {
        let err = QuillError::TransportError("socket closed".to_string());
        assert_eq!(
            err.user_message(),
            "Error: Unable to get a response from the model. socket closed"
        );
    }
}
