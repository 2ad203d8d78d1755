#![allow(clippy::doc_markdown)] // Allow technical terms like GCS, pgmq in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Batch Aggregator
//!
//! Incremental batch aggregation scheduler for object-store ingestion.
//!
//! ## Overview
//!
//! Producers write a continuous stream of small objects into an object store,
//! one directory per destination table. Loading thousands of tiny files into
//! a warehouse is slow and expensive, so this crate decides, across stateless
//! and possibly overlapping invocations, when a directory has accumulated
//! enough data to be merged and dispatched.
//!
//! ## Architecture
//!
//! Each invocation lists a prefix, folds the objects newer than each key's
//! watermark into per-key accumulators, flushes keys that cross their size or
//! file-count thresholds to size-tiered topics, persists the new watermarks,
//! and schedules a bounded delayed self-reinvocation so leftover fragments
//! keep converging.
//!
//! ## Module Organization
//!
//! - [`aggregation`] - Accumulator, threshold policy, watermarks, dispatcher and scan driver
//! - [`storage`] - Object-store interface and adapters
//! - [`messaging`] - Message bus interface, payloads and adapters
//! - [`operators`] - Event operator runtime (runner, delay, file operators)
//! - [`models`] - Object records, logical keys, thresholds and trigger payloads
//! - [`config`] - Environment-aware configuration loading
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging initialisation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_aggregator::aggregation::BatchAggregationScheduler;
//! use batch_aggregator::config::ConfigLoader;
//! use batch_aggregator::messaging::RecordingMessageBus;
//! use batch_aggregator::operators::{EventEnvelope, OperatorRunner};
//! use batch_aggregator::storage::ObjectStoreStorage;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! batch_aggregator::logging::init_structured_logging();
//! let config = Arc::new(ConfigLoader::new("config").load()?);
//!
//! let storage = Arc::new(ObjectStoreStorage::gcs([
//!     config.buckets.landing_zone.clone(),
//!     config.buckets.document_db.clone(),
//! ])?);
//! let bus = Arc::new(RecordingMessageBus::new());
//!
//! let scheduler = BatchAggregationScheduler::new(storage, bus.clone(), config.clone());
//! let runner = OperatorRunner::new(bus, config.project.clone(), config.topics.error.clone());
//!
//! let envelope = EventEnvelope::new(
//!     "batch-detect",
//!     json!({"threshold": {"size_small": 500, "size_medium": 1000, "file_quantity": 5, "minutes": 30}}),
//! );
//! runner.run(&scheduler, &envelope).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod aggregation;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod operators;
pub mod storage;

pub use aggregation::{BatchAggregationScheduler, ScanOutcome};
pub use config::{AggregatorConfig, ConfigLoader};
pub use error::{AggregatorError, Result};
pub use messaging::{MessageBus, MessagingError};
pub use models::{LogicalKey, ObjectRecord, ProcessTier, ThresholdConfig, TriggerPayload};
pub use operators::{EventEnvelope, EventOperator, OperatorRunner};
pub use storage::{ObjectStorage, StorageError};
