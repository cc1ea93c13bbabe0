//! # Query Errors
//!
//! Error taxonomy for the query executor. Validation failures are raised
//! before any store call; store failures are classified after the retry
//! envelope gives up.

use thiserror::Error;

use crate::store::{StoreError, StoreErrorKind};

/// Result type for executor operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Query executor errors
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    // ==================
    // Validation (400)
    // ==================
    /// Malformed call shape
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operator outside the set accepted by the operation
    #[error("Invalid operator '{operator}' for {operation}")]
    InvalidOperator { operator: String, operation: String },

    /// Empty or malformed column reference
    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    /// Column not present in the table's constraint schema
    #[error("Unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Null supplied for a NOT NULL column
    #[error("Column '{column}' on table '{table}' cannot be null")]
    NullViolation { table: String, column: String },

    /// Value outside a CHECK enumeration
    #[error("Value '{value}' for column '{column}' on table '{table}' violates check constraint (allowed: {})", .allowed.join(", "))]
    CheckViolation {
        table: String,
        column: String,
        value: String,
        allowed: Vec<String>,
    },

    /// Insert batch above the configured cap
    #[error("Batch of {size} rows exceeds maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// Delete without any filter
    #[error("Refusing to delete from '{table}' without filters")]
    UnsafeDelete { table: String },

    // ==================
    // Lookup (404/409)
    // ==================
    /// Single-record lookup found nothing
    #[error("No record in '{table}' with id '{id}'")]
    NotFound { table: String, id: String },

    /// Record already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================
    // Store failures
    // ==================
    /// Connection failure after exhausting retries
    #[error("Connection error during {operation}: {source}")]
    Connection {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// Timeout after exhausting retries
    #[error("Timeout during {operation}: {source}")]
    Timeout {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// Credentials rejected by the store
    #[error("Authentication failed during {operation}: {source}")]
    Authentication {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// Caller not permitted by the store
    #[error("Not authorized for {operation}: {source}")]
    Authorization {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// Any other store failure
    #[error("Operation {operation} failed after {attempts} attempt(s): {source}")]
    OperationFailed {
        operation: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// Caller cancelled the retry series
    #[error("Operation {operation} cancelled after {attempts} attempt(s)")]
    Cancelled { operation: String, attempts: u32 },
}

impl QueryError {
    /// Classify a store failure surfaced by the retry envelope
    pub fn from_store(operation: &str, attempts: u32, source: StoreError) -> Self {
        let operation = operation.to_string();
        match source.kind() {
            StoreErrorKind::Connection => QueryError::Connection { operation, source },
            StoreErrorKind::Timeout => QueryError::Timeout { operation, source },
            StoreErrorKind::Authentication => QueryError::Authentication { operation, source },
            StoreErrorKind::Authorization => QueryError::Authorization { operation, source },
            StoreErrorKind::Unavailable | StoreErrorKind::Rejected | StoreErrorKind::Malformed => {
                QueryError::OperationFailed {
                    operation,
                    attempts,
                    source,
                }
            }
        }
    }

    /// Get a stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidArgument(_) => "TABLEGATE_INVALID_ARGUMENT",
            QueryError::InvalidOperator { .. } => "TABLEGATE_INVALID_OPERATOR",
            QueryError::InvalidColumn(_) => "TABLEGATE_INVALID_COLUMN",
            QueryError::UnknownColumn { .. } => "TABLEGATE_UNKNOWN_COLUMN",
            QueryError::NullViolation { .. } => "TABLEGATE_NULL_VIOLATION",
            QueryError::CheckViolation { .. } => "TABLEGATE_CHECK_VIOLATION",
            QueryError::BatchTooLarge { .. } => "TABLEGATE_BATCH_TOO_LARGE",
            QueryError::UnsafeDelete { .. } => "TABLEGATE_UNSAFE_DELETE",
            QueryError::NotFound { .. } => "TABLEGATE_NOT_FOUND",
            QueryError::Conflict(_) => "TABLEGATE_CONFLICT",
            QueryError::Connection { .. } => "TABLEGATE_CONNECTION_ERROR",
            QueryError::Timeout { .. } => "TABLEGATE_TIMEOUT",
            QueryError::Authentication { .. } => "TABLEGATE_AUTHENTICATION_ERROR",
            QueryError::Authorization { .. } => "TABLEGATE_AUTHORIZATION_ERROR",
            QueryError::OperationFailed { .. } => "TABLEGATE_OPERATION_FAILED",
            QueryError::Cancelled { .. } => "TABLEGATE_CANCELLED",
        }
    }

    /// Get the HTTP status this error would map to
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            QueryError::InvalidArgument(_)
            | QueryError::InvalidOperator { .. }
            | QueryError::InvalidColumn(_)
            | QueryError::UnknownColumn { .. }
            | QueryError::NullViolation { .. }
            | QueryError::CheckViolation { .. }
            | QueryError::BatchTooLarge { .. }
            | QueryError::UnsafeDelete { .. } => 400,

            // 401/403
            QueryError::Authentication { .. } => 401,
            QueryError::Authorization { .. } => 403,

            QueryError::NotFound { .. } => 404,
            QueryError::Conflict(_) => 409,

            // Client closed request
            QueryError::Cancelled { .. } => 499,

            QueryError::Connection { .. } => 503,
            QueryError::Timeout { .. } => 504,
            QueryError::OperationFailed { .. } => 500,
        }
    }

    /// Whether the failure was raised before any store call
    pub fn is_validation(&self) -> bool {
        self.status_code() == 400
    }

    /// Whether retrying the whole operation later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            QueryError::Connection { .. } | QueryError::Timeout { .. } => true,
            QueryError::OperationFailed { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// The underlying store failure, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            QueryError::Connection { source, .. }
            | QueryError::Timeout { source, .. }
            | QueryError::Authentication { source, .. }
            | QueryError::Authorization { source, .. }
            | QueryError::OperationFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::InvalidArgument(err.to_string())
    }
}
