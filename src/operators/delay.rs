//! # Delay Operator
//!
//! Waits the number of seconds requested by a [`DelayMessage`], clamped to
//! `0..=MAX_DELAY_SECONDS`. Its `metadata.run_next` tasks are published by the
//! runner once the wait is over.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use super::EventOperator;
use crate::constants::MAX_DELAY_SECONDS;
use crate::error::{AggregatorError, Result};
use crate::messaging::DelayMessage;

#[derive(Debug, Clone, Copy, Default)]
pub struct DelayOperator;

impl DelayOperator {
    pub fn new() -> Self {
        Self
    }

    /// Seconds actually waited for a request of `seconds`
    pub fn effective_delay(seconds: i64) -> u64 {
        u64::try_from(seconds).unwrap_or(0).min(MAX_DELAY_SECONDS)
    }
}

#[async_trait]
impl EventOperator for DelayOperator {
    fn name(&self) -> &str {
        "delay"
    }

    async fn execute(&self, data: &Value, _topic: &str) -> Result<Value> {
        let message: DelayMessage = serde_json::from_value(data.clone())
            .map_err(|e| AggregatorError::invalid_trigger(format!("malformed delay message: {e}")))?;

        let delay = Self::effective_delay(message.seconds);
        info!(
            requested = message.seconds,
            delay_seconds = delay,
            run_next = message.metadata.run_next.len(),
            "⏳ Delaying"
        );
        tokio::time::sleep(Duration::from_secs(delay)).await;

        Ok(json!({"delayed_seconds": delay}))
    }
}
