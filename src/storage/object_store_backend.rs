//! # `object_store` Backend
//!
//! Maps bucket names onto `object_store` instances. Listing surfaces
//! `last_modified` as the creation time; the `object_store` API exposes no
//! soft-delete state, so every listed object is live.

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{moved_path, ObjectStorage, StorageError, StorageResult};
use crate::models::ObjectRecord;

/// Object storage over a registry of `bucket -> ObjectStore`
#[derive(Clone, Default)]
pub struct ObjectStoreStorage {
    stores: HashMap<String, Arc<dyn ObjectStore>>,
}

impl std::fmt::Debug for ObjectStoreStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buckets: Vec<_> = self.stores.keys().collect();
        buckets.sort();
        write!(f, "ObjectStoreStorage<{buckets:?}>")
    }
}

impl ObjectStoreStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bucket` from `store`
    pub fn with_bucket(mut self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        self.stores.insert(bucket.into(), store);
        self
    }

    /// Serve each of `buckets` from a Google Cloud Storage bucket of the same
    /// name, with credentials taken from the environment
    pub fn gcs<I, S>(buckets: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut storage = Self::new();
        for bucket in buckets {
            let bucket = bucket.into();
            let store = object_store::gcp::GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(&bucket)
                .build()
                .map_err(|e| StorageError::backend("connect", &bucket, e.to_string()))?;
            storage = storage.with_bucket(bucket, Arc::new(store));
        }
        Ok(storage)
    }

    fn store(&self, bucket: &str) -> StorageResult<&Arc<dyn ObjectStore>> {
        self.stores
            .get(bucket)
            .ok_or_else(|| StorageError::bucket_not_registered(bucket))
    }
}

fn parse_path(path: &str) -> StorageResult<Path> {
    Path::parse(path).map_err(|e| StorageError::invalid_path(path, e.to_string()))
}

fn map_error(operation: &str, bucket: &str, path: &str, err: object_store::Error) -> StorageError {
    match err {
        object_store::Error::NotFound { .. } => StorageError::not_found(bucket, path),
        other => StorageError::backend(operation, bucket, other.to_string()),
    }
}

/// Directory to list from for an arbitrary string prefix; `object_store`
/// prefixes match whole path segments only
fn listing_root(prefix: Option<&str>) -> Option<&str> {
    prefix
        .and_then(|p| p.rsplit_once('/').map(|(directory, _)| directory))
        .filter(|directory| !directory.is_empty())
}

#[async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn list(&self, bucket: &str, prefix: Option<&str>) -> StorageResult<Vec<ObjectRecord>> {
        let store = self.store(bucket)?;
        let root = listing_root(prefix).map(parse_path).transpose()?;

        let metas: Vec<_> = store
            .list(root.as_ref())
            .try_collect()
            .await
            .map_err(|e| map_error("list", bucket, prefix.unwrap_or_default(), e))?;

        let records: Vec<_> = metas
            .into_iter()
            .map(|meta| ObjectRecord::new(meta.location.to_string(), meta.size as u64, meta.last_modified))
            .filter(|record| prefix.map_or(true, |p| record.name.starts_with(p)))
            .filter(|record| !record.is_directory_placeholder())
            .collect();

        debug!(bucket = %bucket, prefix = ?prefix, count = records.len(), "Listed objects");
        Ok(records)
    }

    async fn read_json(&self, bucket: &str, path: &str) -> StorageResult<Value> {
        let store = self.store(bucket)?;
        let location = parse_path(path)?;
        let data = store
            .get(&location)
            .await
            .map_err(|e| map_error("get", bucket, path, e))?
            .bytes()
            .await
            .map_err(|e| map_error("get", bucket, path, e))?;
        serde_json::from_slice(&data)
            .map_err(|e| StorageError::invalid_document(bucket, path, e.to_string()))
    }

    async fn upload_from_memory(&self, bucket: &str, path: &str, data: Bytes) -> StorageResult<()> {
        let store = self.store(bucket)?;
        let location = parse_path(path)?;
        store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| map_error("put", bucket, path, e))?;
        Ok(())
    }

    async fn move_files(
        &self,
        from_bucket: &str,
        files: &[String],
        to_bucket: &str,
        to_directory: &str,
    ) -> StorageResult<()> {
        let source = self.store(from_bucket)?;
        let destination = self.store(to_bucket)?;

        for file in files {
            let from = parse_path(file)?;
            let to = parse_path(&moved_path(file, to_directory))?;

            let data = match source.get(&from).await {
                Ok(result) => result
                    .bytes()
                    .await
                    .map_err(|e| map_error("move", from_bucket, file, e))?,
                Err(object_store::Error::NotFound { .. }) => {
                    debug!(bucket = %from_bucket, file = %file, "Move source already gone, skipping");
                    continue;
                }
                Err(e) => return Err(map_error("move", from_bucket, file, e)),
            };

            destination
                .put(&to, PutPayload::from(data))
                .await
                .map_err(|e| map_error("move", to_bucket, file, e))?;

            if from_bucket == to_bucket && from == to {
                continue;
            }
            match source.delete(&from).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(map_error("move", from_bucket, file, e)),
            }
        }
        Ok(())
    }

    async fn delete_files(&self, bucket: &str, files: &[String]) -> StorageResult<()> {
        let store = self.store(bucket)?;
        for file in files {
            let location = parse_path(file)?;
            match store.delete(&location).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(map_error("delete", bucket, file, e)),
            }
        }
        Ok(())
    }
}
