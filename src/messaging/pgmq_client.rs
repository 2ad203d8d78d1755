//! # PostgreSQL Message Queue Bus (pgmq-rs)
//!
//! Message bus backed by pgmq queues: each topic is a queue of the same
//! name. The `project` argument is logged but does not select a database;
//! one bus talks to one pgmq instance.

use async_trait::async_trait;
use pgmq::PGMQueue;
use serde_json::Value;
use tracing::{debug, info};

use super::{MessageBus, MessagingError, MessagingResult};

/// pgmq-rs based message bus
#[derive(Debug, Clone)]
pub struct PgmqMessageBus {
    pgmq: PGMQueue,
}

impl PgmqMessageBus {
    /// Connect using a connection string
    pub async fn new(database_url: &str) -> MessagingResult<Self> {
        info!("🚀 Connecting to pgmq using pgmq-rs crate");

        let pgmq = PGMQueue::new(database_url.to_string())
            .await
            .map_err(|e| MessagingError::connection(e.to_string()))?;

        info!("✅ Connected to pgmq using pgmq-rs");
        Ok(Self { pgmq })
    }

    /// Create the queues backing `topics` if they don't exist
    pub async fn ensure_topics(&self, topics: &[&str]) -> MessagingResult<()> {
        for topic in topics {
            debug!("📋 Creating queue: {}", topic);
            self.pgmq
                .create(topic)
                .await
                .map_err(|e| MessagingError::publish(*topic, format!("create failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageBus for PgmqMessageBus {
    async fn publish(
        &self,
        project: &str,
        topic: &str,
        payload: &Value,
    ) -> MessagingResult<String> {
        debug!(project = %project, topic = %topic, "📤 Sending message to queue");

        let message_id = self
            .pgmq
            .send(topic, payload)
            .await
            .map_err(|e| MessagingError::publish(topic, e.to_string()))?;

        debug!(topic = %topic, message_id = message_id, "✅ Message sent to queue");
        Ok(message_id.to_string())
    }
}
