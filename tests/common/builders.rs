//! Fixtures and builders shared by the integration tests.

#![allow(dead_code)] // Not every test file uses every fixture

use batch_aggregator::config::{AggregatorConfig, BucketConfig};
use batch_aggregator::messaging::RecordingMessageBus;
use batch_aggregator::models::ObjectRecord;
use batch_aggregator::storage::InMemoryStorage;
use batch_aggregator::BatchAggregationScheduler;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

pub const LANDING: &str = "landing";
pub const RAW: &str = "raw";
pub const DOCS: &str = "docs";
pub const DETECT_TOPIC: &str = "batch-detect";

/// Fixed reference time of every scan in the tests
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    now() - Duration::minutes(minutes)
}

pub fn test_config() -> AggregatorConfig {
    AggregatorConfig {
        environment: "test".to_string(),
        project: "analytics".to_string(),
        buckets: BucketConfig {
            landing_zone: LANDING.to_string(),
            raw: RAW.to_string(),
            document_db: DOCS.to_string(),
        },
        document_db_root: "watermarks".to_string(),
        ..AggregatorConfig::default()
    }
}

/// Storage, bus and scheduler wired together over in-memory collaborators
pub struct Harness {
    pub storage: Arc<InMemoryStorage>,
    pub bus: Arc<RecordingMessageBus>,
    pub scheduler: BatchAggregationScheduler,
    pub config: Arc<AggregatorConfig>,
}

impl Harness {
    pub fn new() -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let bus = Arc::new(RecordingMessageBus::new());
        let config = Arc::new(test_config());
        let scheduler = BatchAggregationScheduler::new(storage.clone(), bus.clone(), config.clone());
        Self {
            storage,
            bus,
            scheduler,
            config,
        }
    }

    /// Add a landing object of `size` bytes created `minutes` before [`now`]
    pub fn object(&self, name: &str, size: u64, minutes: i64) -> &Self {
        self.storage
            .insert_record(LANDING, ObjectRecord::new(name, size, minutes_ago(minutes)));
        self
    }

    pub fn record(&self, record: ObjectRecord) -> &Self {
        self.storage.insert_record(LANDING, record);
        self
    }

    /// Stored watermark document of `key`, if any
    pub fn watermark_document(&self, key: &str) -> Option<Value> {
        let bytes = self.storage.read_bytes(DOCS, &format!("watermarks/{key}.json"))?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Builder for trigger payloads
pub struct TriggerBuilder {
    bucket: Option<String>,
    prefix: Option<String>,
    size_small: u64,
    size_medium: u64,
    file_quantity: usize,
    minutes: u64,
    reprocess_delay: Option<u64>,
    reprocess_max_times: Option<u32>,
    reprocess_time: u32,
}

impl TriggerBuilder {
    /// Thresholds `{size_small: 500, size_medium: 1000, file_quantity: 5, minutes: 30}`
    pub fn new() -> Self {
        Self {
            bucket: None,
            prefix: None,
            size_small: 500,
            size_medium: 1000,
            file_quantity: 5,
            minutes: 30,
            reprocess_delay: None,
            reprocess_max_times: None,
            reprocess_time: 0,
        }
    }

    pub fn with_bucket(mut self, bucket: &str) -> Self {
        self.bucket = Some(bucket.to_string());
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn with_minutes(mut self, minutes: u64) -> Self {
        self.minutes = minutes;
        self
    }

    pub fn with_file_quantity(mut self, file_quantity: usize) -> Self {
        self.file_quantity = file_quantity;
        self
    }

    pub fn with_reprocess(mut self, delay: u64, max_times: u32) -> Self {
        self.reprocess_delay = Some(delay);
        self.reprocess_max_times = Some(max_times);
        self
    }

    pub fn with_reprocess_time(mut self, reprocess_time: u32) -> Self {
        self.reprocess_time = reprocess_time;
        self
    }

    pub fn build(self) -> Value {
        let mut threshold = json!({
            "size_small": self.size_small,
            "size_medium": self.size_medium,
            "file_quantity": self.file_quantity,
            "minutes": self.minutes,
        });
        if let Some(delay) = self.reprocess_delay {
            threshold["reprocess_delay"] = json!(delay);
        }
        if let Some(max_times) = self.reprocess_max_times {
            threshold["reprocess_max_times"] = json!(max_times);
        }

        let mut trigger = json!({
            "threshold": threshold,
            "metadata": {"reprocess_time": self.reprocess_time},
        });
        if let Some(bucket) = self.bucket {
            trigger["bucket"] = json!(bucket);
        }
        if let Some(prefix) = self.prefix {
            trigger["prefix"] = json!(prefix);
        }
        trigger
    }
}
