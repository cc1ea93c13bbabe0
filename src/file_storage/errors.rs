//! # File Storage Errors

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// File storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    // Argument errors
    #[error("Invalid bucket name: {0:?}")]
    InvalidBucket(String),

    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("File data cannot be empty")]
    EmptyFile,

    #[error("File paths must be a non-empty list")]
    EmptyPathList,

    #[error("File too large: {0} bytes (max: {1})")]
    FileTooLarge(u64, u64),

    // Bucket errors
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("Bucket not empty: {0}")]
    BucketNotEmpty(String),

    // Object errors
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Object already exists: {0}")]
    ObjectAlreadyExists(String),

    // Backend
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::InvalidBucket(_) => 400,
            StorageError::InvalidPath(_) => 400,
            StorageError::EmptyFile => 400,
            StorageError::EmptyPathList => 400,
            StorageError::FileTooLarge(_, _) => 413,
            StorageError::BucketNotFound(_) => 404,
            StorageError::BucketAlreadyExists(_) => 409,
            StorageError::BucketNotEmpty(_) => 409,
            StorageError::ObjectNotFound(_) => 404,
            StorageError::ObjectAlreadyExists(_) => 409,
            StorageError::Backend(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.status_code() {
            400 | 413 => "TABLEGATE_STORAGE_INVALID_ARGUMENT",
            404 => "TABLEGATE_STORAGE_NOT_FOUND",
            409 => "TABLEGATE_STORAGE_CONFLICT",
            _ => "TABLEGATE_STORAGE_BACKEND",
        }
    }
}
