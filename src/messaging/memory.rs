//! In-process message bus that records every publish.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::{MessageBus, MessagingError, MessagingResult};

/// A message captured by [`RecordingMessageBus`]
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub id: String,
    pub project: String,
    pub topic: String,
    pub payload: Value,
}

/// Message bus keeping published messages in memory, in publish order.
///
/// Topics can be armed to fail so callers can exercise publish failures.
#[derive(Debug, Default)]
pub struct RecordingMessageBus {
    published: Mutex<Vec<PublishedMessage>>,
    failing_topics: Mutex<HashSet<String>>,
}

impl RecordingMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish to `topic` fail
    pub fn fail_topic(&self, topic: impl Into<String>) {
        self.failing_topics.lock().insert(topic.into());
    }

    /// Let publishes to `topic` succeed again
    pub fn restore_topic(&self, topic: &str) {
        self.failing_topics.lock().remove(topic);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    /// Messages published to `topic`, in publish order
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.published.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.lock().is_empty()
    }

    /// Remove and return everything published so far
    pub fn drain(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut *self.published.lock())
    }
}

#[async_trait]
impl MessageBus for RecordingMessageBus {
    async fn publish(
        &self,
        project: &str,
        topic: &str,
        payload: &Value,
    ) -> MessagingResult<String> {
        if self.failing_topics.lock().contains(topic) {
            return Err(MessagingError::publish(topic, "topic armed to fail"));
        }

        let id = Uuid::new_v4().to_string();
        debug!(project = %project, topic = %topic, message_id = %id, "📤 Recorded publish");
        self.published.lock().push(PublishedMessage {
            id: id.clone(),
            project: project.to_string(),
            topic: topic.to_string(),
            payload: payload.clone(),
        });
        Ok(id)
    }
}
