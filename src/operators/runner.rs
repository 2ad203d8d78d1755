//! # Operator Runner
//!
//! Runs an [`EventOperator`] for one [`EventEnvelope`]. A successful run
//! publishes each `data.metadata.run_next` task; a failed run is reported to
//! the error topic with the failing payload and then returned to the caller.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

use super::{EventEnvelope, EventOperator};
use crate::constants::input_types;
use crate::error::{AggregatorError, Result};
use crate::logging::{log_error, log_operator_operation};
use crate::messaging::{ErrorMessage, MessageBus};
use crate::models::RunNextTask;

pub struct OperatorRunner {
    bus: Arc<dyn MessageBus>,
    project: String,
    error_topic: String,
}

impl OperatorRunner {
    pub fn new(bus: Arc<dyn MessageBus>, project: impl Into<String>, error_topic: impl Into<String>) -> Self {
        Self {
            bus,
            project: project.into(),
            error_topic: error_topic.into(),
        }
    }

    /// Execute `operator`, then chain its follow-ups or report its failure
    pub async fn run(&self, operator: &dyn EventOperator, envelope: &EventEnvelope) -> Result<Value> {
        log_operator_operation(operator.name(), &envelope.event_id, &envelope.topic, "started");

        let result = match operator.execute(&envelope.data, &envelope.topic).await {
            Ok(summary) => self.run_next(&envelope.data).await.map(|_| summary),
            Err(e) => Err(e),
        };

        match result {
            Ok(summary) => {
                log_operator_operation(operator.name(), &envelope.event_id, &envelope.topic, "completed");
                Ok(summary)
            }
            Err(e) => {
                self.report_error(operator.name(), envelope, &e).await;
                Err(e)
            }
        }
    }

    /// Publish the `metadata.run_next` tasks of `data`, returning how many were sent
    pub async fn run_next(&self, data: &Value) -> Result<usize> {
        let tasks = run_next_tasks(data)?;
        for task in &tasks {
            let project = task.project.as_deref().unwrap_or(&self.project);
            let message_id = self.bus.publish(project, &task.topic, &task.data).await?;
            debug!(project = %project, topic = %task.topic, message_id = %message_id, "➡️ run_next published");
        }
        Ok(tasks.len())
    }

    async fn report_error(&self, operator: &str, envelope: &EventEnvelope, failure: &AggregatorError) {
        log_error(operator, "execute", &failure.to_string(), Some(&envelope.topic));

        let message = ErrorMessage {
            input_type: input_types::EVENT.to_string(),
            origin: envelope.topic.clone(),
            error: failure.to_string(),
            event_id: envelope.event_id.clone(),
            data: envelope.data.clone(),
        };
        let published = match message.to_json() {
            Ok(payload) => self
                .bus
                .publish(&self.project, &self.error_topic, &payload)
                .await
                .map(|_| ()),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = published {
            error!(event_id = %envelope.event_id, error = %e, "Failed to publish error report");
        }
    }
}

/// Follow-up tasks carried in `data.metadata.run_next`
fn run_next_tasks(data: &Value) -> Result<Vec<RunNextTask>> {
    match data.pointer("/metadata/run_next") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(tasks) => serde_json::from_value(tasks.clone()).map_err(|e| {
            AggregatorError::invalid_trigger(format!("malformed metadata.run_next: {e}"))
        }),
    }
}
