//! # Aggregator Configuration
//!
//! Static deployment configuration: which project to publish in, which
//! buckets play which role, and which topics back each processing tier.
//! Flush thresholds are not configured here; they travel with each trigger.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use batch_aggregator::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new("config").load()?;
//! let small_topic = &config.topics.batch_process_small;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};

use crate::models::{LogicalKey, ProcessTier};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AggregatorConfig {
    /// Deployment environment (development, test, production)
    pub environment: String,

    /// Message bus project all topics live in
    pub project: String,

    /// Bucket roles
    pub buckets: BucketConfig,

    /// Path prefix of watermark documents inside `buckets.document_db`
    #[serde(default)]
    pub document_db_root: String,

    /// Topic names
    pub topics: TopicConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BucketConfig {
    /// Default source bucket when a trigger names none
    pub landing_zone: String,
    /// Raw landing bucket receiving medium-size flushes
    pub raw: String,
    /// Bucket holding watermark documents
    pub document_db: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TopicConfig {
    pub batch_process_small: String,
    pub batch_process_medium: String,
    pub batch_process_large: String,
    /// Delay operator topic used for self-reinvocation
    pub delay: String,
    /// Topic receiving failure reports
    pub error: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            batch_process_small: "batch-process-small".to_string(),
            batch_process_medium: "batch-process-medium".to_string(),
            batch_process_large: "batch-process-large".to_string(),
            delay: "delay".to_string(),
            error: "error".to_string(),
        }
    }
}

impl TopicConfig {
    /// Channel serving `tier`
    pub fn for_tier(&self, tier: ProcessTier) -> &str {
        match tier {
            ProcessTier::Small => &self.batch_process_small,
            ProcessTier::Medium => &self.batch_process_medium,
            ProcessTier::Large => &self.batch_process_large,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            project: String::new(),
            buckets: BucketConfig::default(),
            document_db_root: String::new(),
            topics: TopicConfig::default(),
        }
    }
}

impl AggregatorConfig {
    /// Reject configurations that would fail at publish or upload time
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("project", &self.project),
            ("buckets.landing_zone", &self.buckets.landing_zone),
            ("buckets.raw", &self.buckets.raw),
            ("buckets.document_db", &self.buckets.document_db),
            ("topics.batch_process_small", &self.topics.batch_process_small),
            ("topics.batch_process_medium", &self.topics.batch_process_medium),
            ("topics.batch_process_large", &self.topics.batch_process_large),
            ("topics.delay", &self.topics.delay),
            ("topics.error", &self.topics.error),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(field, "aggregator"));
            }
        }

        if self.document_db_root.starts_with('/') {
            return Err(ConfigurationError::invalid_value(
                "document_db_root",
                self.document_db_root.clone(),
                "must be relative to the document db bucket",
            ));
        }
        Ok(())
    }

    /// Path of the watermark document of `key`
    pub fn watermark_path(&self, key: &LogicalKey) -> String {
        let root = self.document_db_root.trim_end_matches('/');
        let extension = crate::constants::WATERMARK_DOCUMENT_EXTENSION;
        if root.is_empty() {
            format!("{key}.{extension}")
        } else {
            format!("{root}/{key}.{extension}")
        }
    }

    /// JSON view of the configuration for logs and the validator CLI
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
