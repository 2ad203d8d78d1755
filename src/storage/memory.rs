//! In-memory object storage over explicit records.
//!
//! Unlike the `object_store` in-memory backend, creation and deletion times are
//! set by the caller, which is what scan tests need.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::{moved_path, ObjectStorage, StorageError, StorageResult};
use crate::models::ObjectRecord;

#[derive(Debug, Clone)]
struct StoredObject {
    record: ObjectRecord,
    data: Bytes,
}

/// Buckets of objects kept in name order
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a listing entry with no content
    pub fn insert_record(&self, bucket: &str, record: ObjectRecord) {
        self.insert(bucket, record, Bytes::new());
    }

    /// Insert an object with content; its size is the content length
    pub fn put_object(
        &self,
        bucket: &str,
        path: &str,
        data: impl Into<Bytes>,
        created_at: DateTime<Utc>,
    ) {
        let data = data.into();
        let record = ObjectRecord::new(path, data.len() as u64, created_at);
        self.insert(bucket, record, data);
    }

    /// Mark an object as soft-deleted; it keeps appearing in listings
    pub fn soft_delete(&self, bucket: &str, path: &str, deleted_at: DateTime<Utc>) -> bool {
        match self
            .buckets
            .write()
            .get_mut(bucket)
            .and_then(|objects| objects.get_mut(path))
        {
            Some(object) => {
                object.record.deleted_at = Some(deleted_at);
                true
            }
            None => false,
        }
    }

    /// Whether a live (not soft-deleted) object exists at `path`
    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(path))
            .is_some_and(|object| !object.record.is_deleted())
    }

    pub fn read_bytes(&self, bucket: &str, path: &str) -> Option<Bytes> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(path))
            .filter(|object| !object.record.is_deleted())
            .map(|object| object.data.clone())
    }

    /// Live object paths of `bucket`, in name order
    pub fn paths(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|objects| {
                objects
                    .values()
                    .filter(|object| !object.record.is_deleted())
                    .map(|object| object.record.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn insert(&self, bucket: &str, record: ObjectRecord, data: Bytes) {
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(record.name.clone(), StoredObject { record, data });
    }

    fn take_live(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        let mut buckets = self.buckets.write();
        let objects = buckets.get_mut(bucket)?;
        if objects.get(path)?.record.is_deleted() {
            return None;
        }
        objects.remove(path)
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn list(&self, bucket: &str, prefix: Option<&str>) -> StorageResult<Vec<ObjectRecord>> {
        let buckets = self.buckets.read();
        let records = buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .values()
                    .filter(|object| prefix.map_or(true, |p| object.record.name.starts_with(p)))
                    .map(|object| object.record.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn read_json(&self, bucket: &str, path: &str) -> StorageResult<Value> {
        let data = self
            .read_bytes(bucket, path)
            .ok_or_else(|| StorageError::not_found(bucket, path))?;
        serde_json::from_slice(&data)
            .map_err(|e| StorageError::invalid_document(bucket, path, e.to_string()))
    }

    async fn upload_from_memory(&self, bucket: &str, path: &str, data: Bytes) -> StorageResult<()> {
        self.put_object(bucket, path, data, Utc::now());
        Ok(())
    }

    async fn move_files(
        &self,
        from_bucket: &str,
        files: &[String],
        to_bucket: &str,
        to_directory: &str,
    ) -> StorageResult<()> {
        for file in files {
            match self.take_live(from_bucket, file) {
                Some(object) => {
                    let destination = moved_path(file, to_directory);
                    let mut record = object.record;
                    record.name = destination;
                    self.insert(to_bucket, record, object.data);
                }
                None => debug!(bucket = %from_bucket, file = %file, "Move source already gone, skipping"),
            }
        }
        Ok(())
    }

    async fn delete_files(&self, bucket: &str, files: &[String]) -> StorageResult<()> {
        let mut buckets = self.buckets.write();
        if let Some(objects) = buckets.get_mut(bucket) {
            for file in files {
                objects.remove(file);
            }
        }
        Ok(())
    }
}
