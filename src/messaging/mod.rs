//! # Messaging Module
//!
//! The message bus the scheduler publishes to: flush dispatches, delayed
//! reinvocations and error reports all go through [`MessageBus::publish`].

pub mod errors;
pub mod memory;
pub mod message;
#[cfg(feature = "pgmq")]
pub mod pgmq_client;

use async_trait::async_trait;
use serde_json::Value;

pub use errors::{MessagingError, MessagingResult};
pub use memory::{PublishedMessage, RecordingMessageBus};
pub use message::{BatchProcessMessage, DelayMessage, DelayMetadata, ErrorMessage};
#[cfg(feature = "pgmq")]
pub use pgmq_client::PgmqMessageBus;

/// Publish primitive of the message bus
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `payload` to `topic` in `project`, returning the bus-assigned message id
    async fn publish(&self, project: &str, topic: &str, payload: &Value)
        -> MessagingResult<String>;
}
