//! # Event Operators
//!
//! Units of work triggered by a message on a topic. The scan scheduler is one
//! such operator; [`DelayOperator`] closes its self-reinvocation loop, and the
//! file operators apply batch moves and deletes.
//!
//! Operators are run through [`OperatorRunner`], which publishes the
//! `metadata.run_next` follow-ups of a successful run and reports failures to
//! the error topic.

pub mod delay;
pub mod file_ops;
pub mod runner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

pub use delay::DelayOperator;
pub use file_ops::{FileDeleteOperator, FileMoveOperator};
pub use runner::OperatorRunner;

/// Operator driven by topic messages
#[async_trait]
pub trait EventOperator: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Handle the message `data` received on `topic`, returning a JSON summary
    async fn execute(&self, data: &Value, topic: &str) -> Result<Value>;
}

/// One delivered message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    pub topic: String,
    pub data: Value,
}

impl EventEnvelope {
    pub fn new(topic: impl Into<String>, data: Value) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            data,
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }
}
