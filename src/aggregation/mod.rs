//! # Incremental Batch Aggregation
//!
//! The scan pipeline that coalesces small objects into warehouse-sized
//! batches across stateless, possibly overlapping invocations.
//!
//! ## Components
//!
//! - [`accumulator`]: per-key running aggregates and partial-flush bookkeeping
//! - [`policy`]: pure inline and end-of-scan flush decisions
//! - [`watermark`]: per-key "scanned up to" markers in the document-db bucket,
//!   including the fragment held back for the next scan
//! - [`dispatcher`]: tier-specific batch-process messages
//! - [`reprocess`]: bounded delayed self-reinvocation
//! - [`scheduler`]: the scan driver tying the above together
//!
//! ## Example
//!
//! ```rust,no_run
//! use batch_aggregator::aggregation::BatchAggregationScheduler;
//! use batch_aggregator::config::ConfigLoader;
//! use batch_aggregator::messaging::RecordingMessageBus;
//! use batch_aggregator::storage::InMemoryStorage;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ConfigLoader::new("config").load()?);
//! let scheduler = BatchAggregationScheduler::new(
//!     Arc::new(InMemoryStorage::new()),
//!     Arc::new(RecordingMessageBus::new()),
//!     config,
//! );
//!
//! let trigger = json!({
//!     "prefix": "sales/",
//!     "threshold": {"size_small": 500, "size_medium": 1000, "file_quantity": 5, "minutes": 30}
//! });
//! let outcome = scheduler.execute_at(&trigger, "batch-detect", chrono::Utc::now()).await?;
//! println!("dispatched {} batches", outcome.dispatches.len());
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod dispatcher;
pub mod policy;
pub mod reprocess;
pub mod scheduler;
pub mod watermark;

pub use accumulator::{ScannedKey, TableAccumulator, TableAccumulators};
pub use dispatcher::{DispatchRecord, Dispatcher};
pub use policy::{final_decision, inline_decision, Destination, FlushDecision};
pub use reprocess::ReprocessScheduler;
pub use scheduler::{BatchAggregationScheduler, ScanOutcome, WatermarkUpdate};
pub use watermark::{format_watermark, parse_watermark, Watermark, WatermarkDocument, WatermarkStore};
