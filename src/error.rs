// src/error.rs

//! Unified error handling for the digest application.

use std::fmt;

use thiserror::Error;

/// Result type alias for digest operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Atom XML could not be read
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// PDF document assembly failed
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Upstream answered with something that is not a feed
    #[error("Feed error: {0}")]
    Feed(String),

    /// A single feed entry is unusable; the entry is skipped
    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    /// Upstream stayed unreachable after every retry
    #[error("Upstream unavailable after {attempts} attempts: {message}")]
    UpstreamUnavailable { attempts: u32, message: String },

    /// Digest document could not be produced
    #[error("Render error: {0}")]
    Render(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a feed error.
    pub fn feed(message: impl Into<String>) -> Self {
        Self::Feed(message.into())
    }

    /// Create a malformed-record error for the entry identified by `id`.
    pub fn malformed(id: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::MalformedRecord {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an upstream-unavailable error.
    pub fn upstream(attempts: u32, message: impl fmt::Display) -> Self {
        Self::UpstreamUnavailable {
            attempts,
            message: message.to_string(),
        }
    }

    /// Create a render error.
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    /// Whether retrying the same upstream call may succeed.
    ///
    /// Transport failures, timeouts, 429 and 5xx are transient. Other
    /// statuses and a body that is not a feed are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_record_message_names_entry() {
        let err = AppError::malformed("2401.00001", "missing title");
        assert_eq!(
            err.to_string(),
            "Malformed record 2401.00001: missing title"
        );
    }

    #[test]
    fn error_statuses_are_transient() {
        let err = AppError::Status {
            status: 503,
            url: "https://export.arxiv.org/api/query".to_string(),
        };
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "HTTP 503 from https://export.arxiv.org/api/query");
    }

    #[test]
    fn client_error_statuses_are_not_transient() {
        let status = |status| AppError::Status {
            status,
            url: "https://export.arxiv.org/api/query".to_string(),
        };
        assert!(status(429).is_transient());
        assert!(status(500).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(404).is_transient());
    }

    #[test]
    fn non_http_errors_are_not_transient() {
        assert!(!AppError::config("bad").is_transient());
        assert!(!AppError::feed("html page").is_transient());
        assert!(!AppError::upstream(3, "down").is_transient());
    }
}
