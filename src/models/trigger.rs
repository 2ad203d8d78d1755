//! # Trigger Payload
//!
//! The message that starts one scan. Unknown fields are preserved so a
//! self-reinvocation forwards the caller's payload with only the retry
//! counter and the staleness window changed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::threshold::{ThresholdConfig, ThresholdPayload};
use crate::error::{AggregatorError, Result};

/// A follow-up message published after an operator succeeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunNextTask {
    /// Project to publish to; the runner's configured project when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub topic: String,
    pub data: Value,
}

/// Scheduling metadata carried between chained invocations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerMetadata {
    /// Number of self-reinvocations that led to this invocation
    #[serde(default)]
    pub reprocess_time: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_next: Vec<RunNextTask>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One invocation's trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerPayload {
    /// Source bucket; the configured landing zone when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub threshold: ThresholdPayload,
    #[serde(default)]
    pub metadata: TriggerMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TriggerPayload {
    /// Decode a trigger, failing fast on a malformed payload
    pub fn parse(data: &Value) -> Result<Self> {
        serde_json::from_value(data.clone())
            .map_err(|e| AggregatorError::invalid_trigger(format!("malformed trigger payload: {e}")))
    }

    /// Validated thresholds of this trigger
    pub fn threshold_config(&self) -> Result<ThresholdConfig> {
        ThresholdConfig::from_payload(&self.threshold)
    }

    pub fn reprocess_time(&self) -> u32 {
        self.metadata.reprocess_time
    }

    /// Payload of the next self-reinvocation: the same trigger with the
    /// staleness window zeroed and the retry counter incremented. The
    /// caller's `run_next` follow-ups are not forwarded; they already ran
    /// after this invocation.
    pub fn next_reprocess_payload(&self) -> Result<Value> {
        let mut next = self.clone();
        next.threshold.minutes = Some(0);
        next.metadata.reprocess_time = next.metadata.reprocess_time.saturating_add(1);
        next.metadata.run_next.clear();
        serde_json::to_value(&next).map_err(AggregatorError::from)
    }
}
