//! # Threshold Configuration
//!
//! Per-invocation flush thresholds. The trigger carries them as a loosely
//! typed JSON object ([`ThresholdPayload`]); the scheduler only ever works with
//! the validated [`ThresholdConfig`], so a missing field fails the invocation
//! before any object is listed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{DEFAULT_REPROCESS_DELAY_SECONDS, DEFAULT_REPROCESS_MAX_TIMES};
use crate::error::{AggregatorError, Result};

/// Threshold object as it appears on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_small: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_medium: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_quantity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprocess_delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprocess_max_times: Option<u32>,
    /// Fields this scheduler does not interpret, forwarded untouched on reinvocation
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Validated thresholds for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Batches below this size go to the SMALL channel
    pub size_small: u64,
    /// Accumulated size above which a key is flushed immediately to the raw-landing bucket
    pub size_medium: u64,
    /// File count above which a key is flushed mid-scan
    pub file_quantity: usize,
    /// Age after which a retained fragment is considered stale
    pub minutes: u64,
    /// Seconds to wait before a self-reinvocation
    pub reprocess_delay: u64,
    /// Maximum number of chained self-reinvocations
    pub reprocess_max_times: u32,
}

impl ThresholdConfig {
    /// Validate a wire payload, rejecting any missing required field
    pub fn from_payload(payload: &ThresholdPayload) -> Result<Self> {
        Ok(Self {
            size_small: required(payload.size_small, "size_small")?,
            size_medium: required(payload.size_medium, "size_medium")?,
            file_quantity: required(payload.file_quantity, "file_quantity")?,
            minutes: required(payload.minutes, "minutes")?,
            reprocess_delay: payload
                .reprocess_delay
                .unwrap_or(DEFAULT_REPROCESS_DELAY_SECONDS),
            reprocess_max_times: payload
                .reprocess_max_times
                .unwrap_or(DEFAULT_REPROCESS_MAX_TIMES),
        })
    }

    /// Fragments whose oldest file was created before this instant are stale
    pub fn staleness_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let minutes = i64::try_from(self.minutes).unwrap_or(i64::MAX);
        Duration::try_minutes(minutes)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| {
        AggregatorError::invalid_trigger(format!("threshold.{field} is required"))
    })
}
