//! # Watermark Store
//!
//! Per-key "scanned up to" markers persisted as small JSON documents in the
//! document-db bucket:
//!
//! ```json
//! {"processed_at": "20240301115600", "boundary": ["part-07.json"], "retained": ["part-03.json"]}
//! ```
//!
//! `processed_at` has second precision. `boundary` names the objects already
//! examined within that second, so objects landing later in the same second
//! are still picked up; a document without it settles the whole second.
//! `retained` names the fragment the final check held back, which the next
//! scan folds again regardless of its age.
//!
//! A store instance lives for one invocation and caches every key it has read
//! or written, so a key is read from the object store at most once per scan.

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::config::AggregatorConfig;
use crate::constants::WATERMARK_TIMESTAMP_FORMAT;
use crate::error::{AggregatorError, Result};
use crate::models::LogicalKey;
use crate::storage::{ObjectStorage, StorageError};

/// Persisted watermark document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkDocument {
    pub processed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retained: Vec<String>,
}

impl WatermarkDocument {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_watermark(&self.processed_at)
    }
}

/// Render a watermark with second precision, truncating sub-second parts
pub fn format_watermark(timestamp: DateTime<Utc>) -> String {
    timestamp.format(WATERMARK_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_watermark(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, WATERMARK_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// In-memory view of one key's watermark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    processed_at: DateTime<Utc>,
    /// `None` when every object of the `processed_at` second is settled
    boundary: Option<BTreeSet<String>>,
    retained: BTreeSet<String>,
}

impl Watermark {
    /// Watermark of a key that was never scanned
    pub fn none() -> Self {
        Self::through(DateTime::<Utc>::MIN_UTC)
    }

    /// Everything created up to and including the second of `timestamp` is settled
    pub fn through(timestamp: DateTime<Utc>) -> Self {
        Self {
            processed_at: timestamp.trunc_subsecs(0),
            boundary: None,
            retained: BTreeSet::new(),
        }
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }

    /// Filenames held back by the last final check
    pub fn retained(&self) -> impl Iterator<Item = &str> {
        self.retained.iter().map(String::as_str)
    }

    /// Whether the object `filename` created at `created_at` still needs to be
    /// folded
    pub fn admits(&self, filename: &str, created_at: DateTime<Utc>) -> bool {
        if self.retained.contains(filename) {
            return true;
        }
        let second = created_at.trunc_subsecs(0);
        if second != self.processed_at {
            return second > self.processed_at;
        }
        match &self.boundary {
            Some(examined) => !examined.contains(filename),
            None => false,
        }
    }

    /// Watermark after a scan that examined `examined` (the names folded in
    /// its newest second, `latest`) and held back `retained`. Never moves
    /// backwards.
    pub fn advance<'a>(
        &self,
        latest: DateTime<Utc>,
        examined: impl IntoIterator<Item = &'a String>,
        retained: impl IntoIterator<Item = String>,
    ) -> Self {
        let latest = latest.trunc_subsecs(0);
        let (processed_at, boundary) = if latest > self.processed_at {
            (latest, Some(examined.into_iter().cloned().collect::<BTreeSet<_>>()))
        } else if latest == self.processed_at {
            let boundary = self.boundary.as_ref().map(|previous| {
                previous
                    .iter()
                    .cloned()
                    .chain(examined.into_iter().cloned())
                    .collect::<BTreeSet<_>>()
            });
            (self.processed_at, boundary)
        } else {
            (self.processed_at, self.boundary.clone())
        };

        Self {
            processed_at,
            boundary,
            retained: retained.into_iter().collect(),
        }
    }

    fn from_document(document: WatermarkDocument) -> Option<Self> {
        Some(Self {
            processed_at: document.timestamp()?,
            boundary: document.boundary.map(|names| names.into_iter().collect()),
            retained: document.retained.into_iter().collect(),
        })
    }

    fn to_document(&self) -> WatermarkDocument {
        WatermarkDocument {
            processed_at: format_watermark(self.processed_at),
            boundary: self
                .boundary
                .as_ref()
                .map(|names| names.iter().cloned().collect()),
            retained: self.retained.iter().cloned().collect(),
        }
    }
}

pub struct WatermarkStore {
    storage: Arc<dyn ObjectStorage>,
    config: Arc<AggregatorConfig>,
    cache: HashMap<LogicalKey, Watermark>,
    reads: usize,
}

impl WatermarkStore {
    pub fn new(storage: Arc<dyn ObjectStorage>, config: Arc<AggregatorConfig>) -> Self {
        Self {
            storage,
            config,
            cache: HashMap::new(),
            reads: 0,
        }
    }

    /// Watermark of `key`, or [`Watermark::none`] when none was ever written
    pub async fn get(&mut self, key: &LogicalKey) -> Result<&Watermark> {
        if !self.cache.contains_key(key) {
            let watermark = self.read(key).await?;
            self.cache.insert(key.clone(), watermark);
        }
        Ok(&self.cache[key])
    }

    async fn read(&mut self, key: &LogicalKey) -> Result<Watermark> {
        let bucket = &self.config.buckets.document_db;
        let path = self.config.watermark_path(key);
        self.reads += 1;

        match self.storage.read_json(bucket, &path).await {
            Ok(value) => {
                let document: WatermarkDocument = serde_json::from_value(value).map_err(|e| {
                    AggregatorError::watermark(
                        key.as_str(),
                        StorageError::invalid_document(bucket, &path, e.to_string()),
                    )
                })?;
                let processed_at = document.processed_at.clone();
                Watermark::from_document(document).ok_or_else(|| {
                    AggregatorError::watermark(
                        key.as_str(),
                        StorageError::invalid_document(
                            bucket,
                            &path,
                            format!("unparsable processed_at '{processed_at}'"),
                        ),
                    )
                })
            }
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "No watermark yet, scanning full history");
                Ok(Watermark::none())
            }
            Err(e) => Err(AggregatorError::watermark(key.as_str(), e)),
        }
    }

    /// Persist `watermark` for `key`, overwriting the previous document
    pub async fn put(&mut self, key: &LogicalKey, watermark: Watermark) -> Result<()> {
        let bucket = &self.config.buckets.document_db;
        let path = self.config.watermark_path(key);
        let document = watermark.to_document();
        let data = serde_json::to_vec(&document)?;

        self.storage
            .upload_from_memory(bucket, &path, Bytes::from(data))
            .await
            .map_err(|e| AggregatorError::watermark(key.as_str(), e))?;

        debug!(
            key = %key,
            processed_at = %document.processed_at,
            retained = document.retained.len(),
            "Watermark committed"
        );
        self.cache.insert(key.clone(), watermark);
        Ok(())
    }

    /// Store reads performed so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}
