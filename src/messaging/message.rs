//! # Message Structures
//!
//! Payloads published by the scheduler and the operator runtime: flush
//! dispatches to the tiered batch-process channels, delayed reinvocations,
//! and error reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ProcessTier, RunNextTask};

/// Flush dispatch consumed by the tier-specific batch-process channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProcessMessage {
    pub from_bucket: String,
    pub to_bucket: String,
    /// Logical key of the files, relative to `from_bucket`
    pub directory: String,
    /// Filenames in discovery order
    pub files: Vec<String>,
    pub tier: ProcessTier,
}

impl BatchProcessMessage {
    pub fn new(
        from_bucket: impl Into<String>,
        to_bucket: impl Into<String>,
        directory: impl Into<String>,
        files: Vec<String>,
        tier: ProcessTier,
    ) -> Self {
        Self {
            from_bucket: from_bucket.into(),
            to_bucket: to_bucket.into(),
            directory: directory.into(),
            files,
            tier,
        }
    }

    /// Full object paths of the dispatched files inside `from_bucket`
    pub fn file_paths(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|f| format!("{}/{}", self.directory, f))
            .collect()
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_json(json: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json)
    }
}

/// Metadata of a delayed message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelayMetadata {
    #[serde(default)]
    pub run_next: Vec<RunNextTask>,
}

/// Request to publish `metadata.run_next` after waiting `seconds`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayMessage {
    pub seconds: i64,
    #[serde(default)]
    pub metadata: DelayMetadata,
}

impl DelayMessage {
    /// Reinvoke `topic` with `data` after `seconds`
    pub fn reinvoke(seconds: u64, topic: impl Into<String>, data: Value) -> Self {
        Self {
            seconds: i64::try_from(seconds).unwrap_or(i64::MAX),
            metadata: DelayMetadata {
                run_next: vec![RunNextTask {
                    project: None,
                    topic: topic.into(),
                    data,
                }],
            },
        }
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Failure report published to the error topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub input_type: String,
    /// Topic the failing event arrived on
    pub origin: String,
    pub error: String,
    pub event_id: String,
    /// The payload that failed, so it can be replayed
    pub data: Value,
}

impl ErrorMessage {
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
