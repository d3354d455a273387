//! Result and error types for the core library

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Decode error for document '{id}': {message}")]
    Decode { id: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a remote store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a subscription error
    pub fn subscription(msg: impl Into<String>) -> Self {
        Self::Subscription(msg.into())
    }

    /// Create a decode error for a single document
    pub fn decode(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            id: id.into(),
            message: msg.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Which operation of a sync store failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncErrorKind {
    /// Push channel terminated or errored
    Subscription,
    /// The disambiguation fetch after an empty push failed
    FallbackFetch,
    /// A manual refresh failed
    Refresh,
}

/// A failure captured at the sync store boundary.
///
/// Sync stores never return these as `Err`; they are recorded on the
/// published snapshot so consumers can render an inline indicator while
/// keeping last-known data on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            SyncErrorKind::Subscription => "subscription failed",
            SyncErrorKind::FallbackFetch => "fallback fetch failed",
            SyncErrorKind::Refresh => "refresh failed",
        };
        write!(f, "{}: {}", what, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::validation("amount must not be negative");
        assert_eq!(
            err.to_string(),
            "Validation error: amount must not be negative"
        );

        let err = Error::decode("abc", "missing field `amount`");
        assert!(err.to_string().contains("'abc'"));
    }

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::new(SyncErrorKind::Refresh, "connection reset");
        assert_eq!(err.to_string(), "refresh failed: connection reset");
    }
}
