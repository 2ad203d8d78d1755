//! # File Operators
//!
//! Batch delete and move over the object storage, selecting files either by
//! an explicit list or by everything under a prefix. Both are idempotent: a
//! file that is already gone is skipped.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use super::EventOperator;
use crate::error::{AggregatorError, Result};
use crate::storage::ObjectStorage;

/// Files selected in one bucket
#[derive(Debug, Clone, Deserialize)]
struct FileSelection {
    bucket: String,
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    files: Vec<String>,
}

impl FileSelection {
    async fn resolve(&self, storage: &dyn ObjectStorage) -> Result<Vec<String>> {
        let mut files = self.files.clone();
        if let Some(prefix) = &self.prefix {
            let listed = storage
                .list(&self.bucket, Some(prefix.as_str()))
                .await
                .map_err(|e| AggregatorError::enumeration(&self.bucket, Some(prefix.as_str()), e))?;
            files.extend(
                listed
                    .into_iter()
                    .filter(|record| !record.is_deleted() && !record.is_directory_placeholder())
                    .map(|record| record.name),
            );
        }
        let mut seen = HashSet::new();
        files.retain(|file| seen.insert(file.clone()));
        Ok(files)
    }

    fn validate(&self) -> Result<()> {
        if self.prefix.is_none() && self.files.is_empty() {
            return Err(AggregatorError::invalid_trigger(
                "prefix or files parameter has to be defined",
            ));
        }
        Ok(())
    }
}

fn parse<T: for<'de> Deserialize<'de>>(data: &Value, operator: &str) -> Result<T> {
    serde_json::from_value(data.clone())
        .map_err(|e| AggregatorError::invalid_trigger(format!("malformed {operator} payload: {e}")))
}

/// Deletes `{bucket, prefix?, files?}`
pub struct FileDeleteOperator {
    storage: Arc<dyn ObjectStorage>,
}

impl FileDeleteOperator {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl EventOperator for FileDeleteOperator {
    fn name(&self) -> &str {
        "file_delete"
    }

    async fn execute(&self, data: &Value, _topic: &str) -> Result<Value> {
        let selection: FileSelection = parse(data, "file delete")?;
        selection.validate()?;

        let files = selection.resolve(self.storage.as_ref()).await?;
        self.storage.delete_files(&selection.bucket, &files).await?;

        info!(bucket = %selection.bucket, count = files.len(), "🗑️ Files deleted");
        Ok(json!({"bucket": selection.bucket, "deleted": files.len()}))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MoveDestination {
    bucket: String,
    #[serde(default)]
    directory: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MoveRequest {
    origin: FileSelection,
    destination: MoveDestination,
}

/// Moves `{origin: {bucket, prefix?, files?}, destination: {bucket, directory}}`
pub struct FileMoveOperator {
    storage: Arc<dyn ObjectStorage>,
}

impl FileMoveOperator {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl EventOperator for FileMoveOperator {
    fn name(&self) -> &str {
        "file_move"
    }

    async fn execute(&self, data: &Value, _topic: &str) -> Result<Value> {
        let request: MoveRequest = parse(data, "file move")?;
        request.origin.validate()?;

        let files = request.origin.resolve(self.storage.as_ref()).await?;
        self.storage
            .move_files(
                &request.origin.bucket,
                &files,
                &request.destination.bucket,
                &request.destination.directory,
            )
            .await?;

        info!(
            from_bucket = %request.origin.bucket,
            to_bucket = %request.destination.bucket,
            directory = %request.destination.directory,
            count = files.len(),
            "🚚 Files moved"
        );
        Ok(json!({
            "from_bucket": request.origin.bucket,
            "to_bucket": request.destination.bucket,
            "moved": files.len()
        }))
    }
}
