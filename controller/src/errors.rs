//! Error types for the release controller

use http::StatusCode;
use thiserror::Error;

/// Main error type for the release controller
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Session expired: {0}")]
    Unauthorized(String),

    #[error("Request failed ({status}): {message}")]
    Request { status: StatusCode, message: String },

    #[error("Unable to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ControllerError {
    /// Auth failures end the session instead of being shown next to an operation
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ControllerError::Unauthorized(_))
    }

    /// Message suitable for a scoped `*_error_msg` field
    pub fn display_message(&self) -> String {
        match self {
            ControllerError::Request { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}
