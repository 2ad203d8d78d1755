//! # Reprocessing Scheduler
//!
//! Bounded, delayed self-reinvocation. When a scan dispatched anything and the
//! trigger's retry counter is still below `reprocess_max_times`, the same
//! trigger is sent back through the delay topic with `minutes` zeroed and the
//! counter incremented, so leftover fragments flush on the retry.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AggregatorError, Result};
use crate::messaging::{DelayMessage, MessageBus};
use crate::models::{ThresholdConfig, TriggerPayload};

pub struct ReprocessScheduler {
    bus: Arc<dyn MessageBus>,
    project: String,
    delay_topic: String,
}

impl ReprocessScheduler {
    pub fn new(bus: Arc<dyn MessageBus>, project: impl Into<String>, delay_topic: impl Into<String>) -> Self {
        Self {
            bus,
            project: project.into(),
            delay_topic: delay_topic.into(),
        }
    }

    /// The delayed reinvocation this scan calls for, if any.
    ///
    /// `reinvoke_topic` is the topic the current invocation arrived on.
    pub fn plan(
        trigger: &TriggerPayload,
        thresholds: &ThresholdConfig,
        reprocess_requested: bool,
        reinvoke_topic: &str,
    ) -> Result<Option<DelayMessage>> {
        if !reprocess_requested {
            return Ok(None);
        }

        let reprocess_time = trigger.reprocess_time();
        if reprocess_time >= thresholds.reprocess_max_times {
            debug!(
                reprocess_time = reprocess_time,
                reprocess_max_times = thresholds.reprocess_max_times,
                "Reprocess limit reached, leaving fragments for the next trigger"
            );
            return Ok(None);
        }

        let data = trigger.next_reprocess_payload()?;
        Ok(Some(DelayMessage::reinvoke(
            thresholds.reprocess_delay,
            reinvoke_topic,
            data,
        )))
    }

    /// Publish `message` to the delay topic, returning the message id
    pub async fn schedule(&self, message: &DelayMessage) -> Result<String> {
        let payload = message.to_json()?;
        let message_id = self
            .bus
            .publish(&self.project, &self.delay_topic, &payload)
            .await
            .map_err(|source| AggregatorError::Reprocess { source })?;

        info!(
            message_id = %message_id,
            delay_seconds = message.seconds,
            "🔁 Self-reinvocation scheduled"
        );
        Ok(message_id)
    }
}
