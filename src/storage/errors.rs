//! # Storage Error Types
//!
//! Structured errors for object-store operations. Not-found is kept as its own
//! variant because watermark reads and idempotent moves recover from it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },

    #[error("Bucket not registered with storage backend: {bucket}")]
    BucketNotRegistered { bucket: String },

    #[error("Storage operation failed: {operation} on {bucket}: {message}")]
    Backend {
        operation: String,
        bucket: String,
        message: String,
    },

    #[error("Invalid JSON document {bucket}/{path}: {message}")]
    InvalidDocument {
        bucket: String,
        path: String,
        message: String,
    },

    #[error("Invalid object path: {path}: {reason}")]
    InvalidPath { path: String, reason: String },
}

impl StorageError {
    /// Create a not-found error
    pub fn not_found(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    /// Create an unregistered-bucket error
    pub fn bucket_not_registered(bucket: impl Into<String>) -> Self {
        Self::BucketNotRegistered {
            bucket: bucket.into(),
        }
    }

    /// Create a backend error
    pub fn backend(
        operation: impl Into<String>,
        bucket: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            operation: operation.into(),
            bucket: bucket.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-document error
    pub fn invalid_document(
        bucket: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidDocument {
            bucket: bucket.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
