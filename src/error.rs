//! # Error Handling
//!
//! Invocation-level errors. Subsystem errors are wrapped with the bucket,
//! prefix or logical key that was being processed so a failed invocation can
//! be diagnosed from its error alone.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Invalid trigger payload: {message}")]
    InvalidTrigger { message: String },

    #[error("Failed to enumerate objects in {bucket} (prefix: {}): {source}", .prefix.as_deref().unwrap_or("<none>"))]
    Enumeration {
        bucket: String,
        prefix: Option<String>,
        #[source]
        source: StorageError,
    },

    #[error("Watermark operation failed for key {key}: {source}")]
    Watermark {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to dispatch {key} from {bucket}: {source}")]
    Dispatch {
        bucket: String,
        key: String,
        #[source]
        source: MessagingError,
    },

    #[error("Failed to schedule reprocessing: {source}")]
    Reprocess {
        #[source]
        source: MessagingError,
    },

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AggregatorError {
    /// Create an invalid trigger error
    pub fn invalid_trigger(message: impl Into<String>) -> Self {
        Self::InvalidTrigger {
            message: message.into(),
        }
    }

    /// Create an enumeration error
    pub fn enumeration(bucket: impl Into<String>, prefix: Option<&str>, source: StorageError) -> Self {
        Self::Enumeration {
            bucket: bucket.into(),
            prefix: prefix.map(str::to_string),
            source,
        }
    }

    /// Create a watermark error
    pub fn watermark(key: impl Into<String>, source: StorageError) -> Self {
        Self::Watermark {
            key: key.into(),
            source,
        }
    }

    /// Create a dispatch error
    pub fn dispatch(bucket: impl Into<String>, key: impl Into<String>, source: MessagingError) -> Self {
        Self::Dispatch {
            bucket: bucket.into(),
            key: key.into(),
            source,
        }
    }

    /// Whether redelivering the same trigger can succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AggregatorError::InvalidTrigger { .. }
                | AggregatorError::Configuration(_)
                | AggregatorError::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
