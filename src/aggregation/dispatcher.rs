//! # Dispatcher
//!
//! Turns a flush decision into exactly one message on the tier-specific
//! batch-process topic.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::TopicConfig;
use crate::logging::log_dispatch_operation;
use crate::messaging::{BatchProcessMessage, MessageBus, MessagingResult};
use crate::models::{LogicalKey, ProcessTier};

/// A dispatch that was accepted by the bus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRecord {
    pub message_id: String,
    pub topic: String,
    /// Accumulated size of the dispatched files
    pub size: u64,
    pub message: BatchProcessMessage,
}

pub struct Dispatcher {
    bus: Arc<dyn MessageBus>,
    project: String,
    topics: TopicConfig,
}

impl Dispatcher {
    pub fn new(bus: Arc<dyn MessageBus>, project: impl Into<String>, topics: TopicConfig) -> Self {
        Self {
            bus,
            project: project.into(),
            topics,
        }
    }

    /// Publish one batch-process message for `files` of `key`
    pub async fn send_to_process(
        &self,
        from_bucket: &str,
        to_bucket: &str,
        key: &LogicalKey,
        files: Vec<String>,
        size: u64,
        tier: ProcessTier,
    ) -> MessagingResult<DispatchRecord> {
        let topic = self.topics.for_tier(tier);
        let message = BatchProcessMessage::new(from_bucket, to_bucket, key.as_str(), files, tier);
        let payload = message.to_json()?;

        let message_id = self.bus.publish(&self.project, topic, &payload).await?;
        debug!(message_id = %message_id, topic = %topic, "Batch-process message published");
        log_dispatch_operation(
            key.as_str(),
            tier.as_str(),
            from_bucket,
            to_bucket,
            message.files.len(),
            size,
        );

        Ok(DispatchRecord {
            message_id,
            topic: topic.to_string(),
            size,
            message,
        })
    }
}
