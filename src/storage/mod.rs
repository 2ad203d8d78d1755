//! # Object Storage
//!
//! The object-store operations the scheduler consumes: listing with
//! creation/deletion metadata, JSON document reads and writes for the
//! watermark store, and idempotent move/delete keyed by explicit file lists.
//!
//! Two implementations are provided:
//!
//! - [`ObjectStoreStorage`] over the `object_store` crate (GCS, local, in-memory)
//! - [`InMemoryStorage`] over explicit records with controllable timestamps

pub mod errors;
pub mod memory;
pub mod object_store_backend;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::models::ObjectRecord;

pub use errors::{StorageError, StorageResult};
pub use memory::InMemoryStorage;
pub use object_store_backend::ObjectStoreStorage;

/// Object-store operations used by the scheduler and the file operators
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// List every object under `prefix`, in store-native order
    async fn list(&self, bucket: &str, prefix: Option<&str>) -> StorageResult<Vec<ObjectRecord>>;

    /// Read and decode a JSON document; a missing document is [`StorageError::NotFound`]
    async fn read_json(&self, bucket: &str, path: &str) -> StorageResult<Value>;

    /// Write `data` to `path`, replacing any existing object
    async fn upload_from_memory(&self, bucket: &str, path: &str, data: Bytes) -> StorageResult<()>;

    /// Move `files` (full paths) into `to_directory` of `to_bucket`, keeping filenames.
    /// A file that is already gone is skipped.
    async fn move_files(
        &self,
        from_bucket: &str,
        files: &[String],
        to_bucket: &str,
        to_directory: &str,
    ) -> StorageResult<()>;

    /// Delete `files` (full paths); a file that is already gone is skipped
    async fn delete_files(&self, bucket: &str, files: &[String]) -> StorageResult<()>;
}

/// Destination path of `file` when moved into `to_directory`
pub(crate) fn moved_path(file: &str, to_directory: &str) -> String {
    let filename = file.rsplit('/').next().unwrap_or(file);
    let directory = to_directory.trim_end_matches('/');
    if directory.is_empty() {
        filename.to_string()
    } else {
        format!("{directory}/{filename}")
    }
}
