//! Structured error types for herald
//!
//! Uses thiserror for ergonomic error definitions with automatic Display
//! and Error trait implementations. Nothing here is ever surfaced to the
//! host embedder; errors are logged with their `kind()` tag and recovered.

use thiserror::Error;

/// All possible errors in herald
#[derive(Error, Debug)]
pub enum HeraldError {
    /// Subject input could not be converted to a finite integer identifier
    #[error("Invalid subject '{0}'. Expected an integer user id")]
    InvalidSubject(String),

    /// Network error talking to the backend
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend returned HTTP {0}")]
    Status(u16),

    /// Fetch exceeded the configured timeout
    #[error("Fetch timed out after {0}s")]
    Timeout(u64),

    /// Response body was not a JSON array of records
    #[error("Malformed response body: {0}")]
    MalformedBody(String),

    /// A single record in an otherwise valid batch could not be read
    #[error("Malformed notification record: {0}")]
    MalformedRecord(String),

    /// Native notification layer refused or failed the delivery
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    /// Redirect target could not be opened
    #[error("Navigation to '{target}' failed: {reason}")]
    Navigation { target: String, reason: String },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl HeraldError {
    /// Stable diagnostic tag, logged as the `kind` field of every failure event
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSubject(_) => "invalid_subject",
            Self::Transport(_) => "transport",
            Self::Status(_) => "http_status",
            Self::Timeout(_) => "timeout",
            Self::MalformedBody(_) => "malformed_body",
            Self::MalformedRecord(_) => "malformed_record",
            Self::Delivery(_) => "delivery",
            Self::Navigation { .. } => "navigation",
            Self::Config(_) => "config",
        }
    }

    /// Whether this failure means "no data this cycle" rather than a bad record
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status(_) | Self::Timeout(_) | Self::MalformedBody(_)
        )
    }
}

/// Convenience Result type using HeraldError
pub type Result<T> = std::result::Result<T, HeraldError>;
