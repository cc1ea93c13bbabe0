//! # Store Errors
//!
//! Failure shapes reported by a backing store. The executor classifies these
//! to decide whether an attempt may be retried.

use std::fmt;

use thiserror::Error;

/// Result type for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Classification of a store failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Connection refused, reset or dropped
    Connection,

    /// The call did not complete in time
    Timeout,

    /// The backend is temporarily unable to serve (5xx)
    Unavailable,

    /// Credentials missing, invalid or expired
    Authentication,

    /// Authenticated but not permitted
    Authorization,

    /// The backend refused the request (constraint violation, bad relation, ...)
    Rejected,

    /// The backend answered with something the client cannot interpret
    Malformed,
}

impl StoreErrorKind {
    /// Whether a failure of this kind may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreErrorKind::Connection | StoreErrorKind::Timeout | StoreErrorKind::Unavailable
        )
    }

    /// Get the kind as a stable string
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::Connection => "connection",
            StoreErrorKind::Timeout => "timeout",
            StoreErrorKind::Unavailable => "unavailable",
            StoreErrorKind::Authentication => "authentication",
            StoreErrorKind::Authorization => "authorization",
            StoreErrorKind::Rejected => "rejected",
            StoreErrorKind::Malformed => "malformed",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the backing store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store {kind} error: {message}")]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String,
}

impl StoreError {
    /// Create a new store error
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Authentication, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Authorization, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Rejected, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Malformed, message)
    }

    /// Map an HTTP status returned by a hosted backend onto a store error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 => StoreErrorKind::Authentication,
            403 => StoreErrorKind::Authorization,
            408 | 504 => StoreErrorKind::Timeout,
            500 | 502 | 503 => StoreErrorKind::Unavailable,
            _ => StoreErrorKind::Rejected,
        };
        Self::new(kind, message)
    }

    /// Get the failure classification
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// Get the backend's message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a later attempt may succeed
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(StoreError::connection("reset").is_transient());
        assert!(StoreError::timeout("slow").is_transient());
        assert!(StoreError::unavailable("503").is_transient());
        assert!(!StoreError::authentication("jwt expired").is_transient());
        assert!(!StoreError::rejected("duplicate key").is_transient());
        assert!(!StoreError::malformed("not json").is_transient());
    }

    #[test]
    fn test_from_status() {
        assert_eq!(StoreError::from_status(401, "x").kind(), StoreErrorKind::Authentication);
        assert_eq!(StoreError::from_status(403, "x").kind(), StoreErrorKind::Authorization);
        assert_eq!(StoreError::from_status(504, "x").kind(), StoreErrorKind::Timeout);
        assert_eq!(StoreError::from_status(503, "x").kind(), StoreErrorKind::Unavailable);
        assert_eq!(StoreError::from_status(409, "x").kind(), StoreErrorKind::Rejected);
    }

    #[test]
    fn test_display_includes_kind() {
        let err = StoreError::connection("connection reset by peer");
        assert_eq!(err.to_string(), "store connection error: connection reset by peer");
    }
}
