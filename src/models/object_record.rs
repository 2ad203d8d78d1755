//! # Object Records
//!
//! Immutable listing entries sourced from the object store, and the logical
//! key (destination table directory) derived from each object's path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One object as reported by the object-store listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Full object path inside the bucket (e.g. `dataset/table/file.json`)
    pub name: String,
    /// Object size in bytes
    pub size: u64,
    /// Creation time reported by the store
    pub created_at: DateTime<Utc>,
    /// Soft-delete time; a deleted object is never accumulated
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ObjectRecord {
    pub fn new(name: impl Into<String>, size: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size,
            created_at,
            deleted_at: None,
        }
    }

    /// Mark the record as soft-deleted at `deleted_at`
    pub fn with_deleted_at(mut self, deleted_at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(deleted_at);
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Directory placeholders (`dataset/table/`) carry no data
    pub fn is_directory_placeholder(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Split the object path into its logical key and filename.
    ///
    /// Returns `None` for directory placeholders and for objects sitting at the
    /// bucket root, which belong to no destination table.
    ///
    /// ```
    /// use batch_aggregator::models::ObjectRecord;
    /// use chrono::Utc;
    ///
    /// let record = ObjectRecord::new("sales/orders/part-0001.json", 10, Utc::now());
    /// let (key, filename) = record.split_key().unwrap();
    /// assert_eq!(key.as_str(), "sales/orders");
    /// assert_eq!(filename, "part-0001.json");
    /// ```
    pub fn split_key(&self) -> Option<(LogicalKey, &str)> {
        if self.is_directory_placeholder() {
            return None;
        }
        let (directory, filename) = self.name.rsplit_once('/')?;
        if directory.is_empty() || filename.is_empty() {
            return None;
        }
        Some((LogicalKey::new(directory), filename))
    }
}

/// Slash-delimited path prefix identifying one destination table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalKey(String);

impl LogicalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full object path of `filename` under this key
    pub fn object_path(&self, filename: &str) -> String {
        format!("{}/{}", self.0, filename)
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}
