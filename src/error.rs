//! Error types for ChipClaw
//!
//! This module defines all error types used throughout the ChipClaw agent core.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Categorizes LLM provider HTTP failures so callers can match on the kind of
/// failure instead of inspecting strings. The agent loop never retries; the
/// classification only shapes the message the user sees.
#[derive(Debug)]
pub enum ProviderError {
    /// 401/403 - Invalid API key or authentication failure
    Auth(String),
    /// 429 - Rate limit or quota exceeded
    RateLimit(String),
    /// 402 - Payment required or billing issue
    Billing(String),
    /// 5xx - Server-side errors
    ServerError(String),
    /// 400 - Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404 - Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient.
    ///
    /// Retryable errors: RateLimit, ServerError, Timeout.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_) | ProviderError::ServerError(_) | ProviderError::Timeout(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Timeout(_) => None,
            ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for ChipClawError {
    fn from(err: ProviderError) -> Self {
        ChipClawError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for ChipClaw operations.
#[derive(Error, Debug)]
pub enum ChipClawError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider errors that carry no status classification
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured provider error with HTTP status classification.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// Channel errors (connection failures, message routing issues, etc.)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Tool execution errors (invalid parameters, execution failures, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Session persistence errors
    #[error("Session error: {0}")]
    Session(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Message bus closed unexpectedly
    #[error("Bus error: channel closed")]
    BusClosed,

    /// Resource not found (sessions, tools, files, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Security violations (path traversal attempts, workspace escapes, etc.)
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl ChipClawError {
    /// Short, stable name of the error variant.
    ///
    /// The tool registry embeds this in error-result strings so the model can
    /// tell a bad argument apart from an I/O failure.
    pub fn kind(&self) -> &'static str {
        match self {
            ChipClawError::Config(_) => "ConfigError",
            ChipClawError::Provider(_) | ChipClawError::ProviderTyped(_) => "ProviderError",
            ChipClawError::Channel(_) => "ChannelError",
            ChipClawError::Tool(_) => "ToolError",
            ChipClawError::Session(_) => "SessionError",
            ChipClawError::Io(_) => "IoError",
            ChipClawError::Json(_) => "JsonError",
            ChipClawError::Http(_) => "HttpError",
            ChipClawError::BusClosed => "BusClosed",
            ChipClawError::NotFound(_) => "NotFound",
            ChipClawError::SecurityViolation(_) => "SecurityViolation",
        }
    }
}

/// A specialized `Result` type for ChipClaw operations.
pub type Result<T> = std::result::Result<T, ChipClawError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChipClawError::Config("missing API key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API key");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ChipClawError = io_err.into();
        assert!(matches!(err, ChipClawError::Io(_)));
        assert_eq!(err.kind(), "IoError");
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(ChipClawError::Tool("x".into()).kind(), "ToolError");
        assert_eq!(ChipClawError::BusClosed.kind(), "BusClosed");
        assert_eq!(
            ChipClawError::ProviderTyped(ProviderError::Auth("x".into())).kind(),
            "ProviderError"
        );
        assert_eq!(
            ChipClawError::SecurityViolation("x".into()).kind(),
            "SecurityViolation"
        );
    }

    #[test]
    fn test_provider_error_is_retryable() {
        assert!(ProviderError::RateLimit("429".into()).is_retryable());
        assert!(ProviderError::ServerError("500".into()).is_retryable());
        assert!(ProviderError::Timeout("timeout".into()).is_retryable());

        assert!(!ProviderError::Auth("401".into()).is_retryable());
        assert!(!ProviderError::Billing("402".into()).is_retryable());
        assert!(!ProviderError::InvalidRequest("400".into()).is_retryable());
        assert!(!ProviderError::ModelNotFound("404".into()).is_retryable());
        assert!(!ProviderError::Unknown("???".into()).is_retryable());
    }

    #[test]
    fn test_provider_error_status_code() {
        assert_eq!(ProviderError::Auth("x".into()).status_code(), Some(401));
        assert_eq!(ProviderError::RateLimit("x".into()).status_code(), Some(429));
        assert_eq!(ProviderError::ModelNotFound("x".into()).status_code(), Some(404));
        assert_eq!(ProviderError::Timeout("x".into()).status_code(), None);
    }

    #[test]
    fn test_provider_typed_display() {
        let err = ChipClawError::ProviderTyped(ProviderError::Auth("invalid key".into()));
        assert_eq!(
            err.to_string(),
            "Provider error: Authentication error: invalid key"
        );
    }
}
