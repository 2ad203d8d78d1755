//! # Table Accumulator
//!
//! Per-invocation running aggregates, one per logical key. This is the only
//! place where size, file count and age state is mutated during a scan.
//!
//! Besides the live accumulators, [`TableAccumulators`] tracks two pieces of
//! invocation-local bookkeeping:
//!
//! - the partially-processed set: keys flushed mid-scan whose accumulator was reset
//! - per key, the newest second folded and the files folded within it, from
//!   which the key's next watermark is derived

use chrono::{DateTime, SubsecRound, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::watermark::Watermark;
use crate::models::{LogicalKey, ObjectRecord};

/// Running aggregate of the not-yet-flushed files of one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAccumulator {
    size: u64,
    files: Vec<String>,
    min_created_at: DateTime<Utc>,
    max_created_at: DateTime<Utc>,
}

impl TableAccumulator {
    /// Accumulator seeded from a single object
    pub fn seeded(filename: impl Into<String>, record: &ObjectRecord) -> Self {
        Self {
            size: record.size,
            files: vec![filename.into()],
            min_created_at: record.created_at,
            max_created_at: record.created_at,
        }
    }

    pub(crate) fn add(&mut self, filename: impl Into<String>, record: &ObjectRecord) {
        self.size = self.size.saturating_add(record.size);
        self.files.push(filename.into());
        self.min_created_at = self.min_created_at.min(record.created_at);
        self.max_created_at = self.max_created_at.max(record.created_at);
    }

    /// Total size in bytes of the accumulated files
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Filenames in discovery order
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn min_created_at(&self) -> DateTime<Utc> {
        self.min_created_at
    }

    pub fn max_created_at(&self) -> DateTime<Utc> {
        self.max_created_at
    }

    pub fn into_files(self) -> Vec<String> {
        self.files
    }
}

/// What one invocation folded for a key, flushed and retained files alike
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedKey {
    latest: DateTime<Utc>,
    examined: BTreeSet<String>,
}

impl ScannedKey {
    fn new(filename: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            latest: created_at.trunc_subsecs(0),
            examined: BTreeSet::from([filename.to_string()]),
        }
    }

    fn observe(&mut self, filename: &str, created_at: DateTime<Utc>) {
        let second = created_at.trunc_subsecs(0);
        if second > self.latest {
            self.latest = second;
            self.examined.clear();
        }
        if second == self.latest {
            self.examined.insert(filename.to_string());
        }
    }

    /// Newest `created_at` folded, truncated to the second
    pub fn latest(&self) -> DateTime<Utc> {
        self.latest
    }

    /// Files folded within the [`latest`](Self::latest) second
    pub fn examined(&self) -> &BTreeSet<String> {
        &self.examined
    }
}

/// All accumulators of one invocation, keyed and iterated in key order
#[derive(Debug, Default)]
pub struct TableAccumulators {
    tables: BTreeMap<LogicalKey, TableAccumulator>,
    partially_processed: BTreeSet<LogicalKey>,
    scanned: BTreeMap<LogicalKey, ScannedKey>,
    seen: HashSet<String>,
}

impl TableAccumulators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `record` into the accumulator of `key`.
    ///
    /// The record is ignored when it is soft-deleted, already covered by
    /// `watermark`, or was already folded in this invocation. Returns the
    /// updated accumulator when the record was taken.
    pub fn accumulate(
        &mut self,
        key: &LogicalKey,
        filename: &str,
        record: &ObjectRecord,
        watermark: &Watermark,
    ) -> Option<&TableAccumulator> {
        if record.is_deleted() || !watermark.admits(filename, record.created_at) {
            return None;
        }
        if !self.seen.insert(record.name.clone()) {
            return None;
        }

        self.scanned
            .entry(key.clone())
            .and_modify(|scanned| scanned.observe(filename, record.created_at))
            .or_insert_with(|| ScannedKey::new(filename, record.created_at));

        let accumulator = self
            .tables
            .entry(key.clone())
            .and_modify(|acc| acc.add(filename, record))
            .or_insert_with(|| TableAccumulator::seeded(filename, record));
        Some(accumulator)
    }

    pub fn get(&self, key: &LogicalKey) -> Option<&TableAccumulator> {
        self.tables.get(key)
    }

    /// Reset the accumulator of `key` after a mid-scan flush and mark the key
    /// partially processed. Returns the flushed aggregate.
    pub fn reset_partial(&mut self, key: &LogicalKey) -> Option<TableAccumulator> {
        let flushed = self.tables.remove(key)?;
        self.partially_processed.insert(key.clone());
        Some(flushed)
    }

    /// Remove the accumulator of `key` after its end-of-scan flush
    pub fn take(&mut self, key: &LogicalKey) -> Option<TableAccumulator> {
        self.tables.remove(key)
    }

    pub fn is_partially_processed(&self, key: &LogicalKey) -> bool {
        self.partially_processed.contains(key)
    }

    /// Every key with at least one folded object, in key order
    pub fn scanned(&self) -> impl Iterator<Item = (&LogicalKey, &ScannedKey)> {
        self.scanned.iter()
    }

    /// Number of objects folded in this invocation
    pub fn folded_objects(&self) -> usize {
        self.seen.len()
    }
}
