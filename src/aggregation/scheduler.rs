//! # Batch Aggregation Scheduler
//!
//! Drives one scan invocation:
//!
//! 1. decode and validate the trigger
//! 2. list the source prefix
//! 3. fold each object into its key's accumulator (watermark-filtered),
//!    flushing inline when a key outgrows its thresholds
//! 4. per key in key order: final flush check, then watermark commit when
//!    the key's marker changed
//! 5. schedule a delayed self-reinvocation when anything was dispatched
//!
//! Everything the scan did is returned as a [`ScanOutcome`]. An error aborts
//! the invocation; watermarks already committed for earlier keys stay.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::accumulator::{ScannedKey, TableAccumulator, TableAccumulators};
use super::dispatcher::{DispatchRecord, Dispatcher};
use super::policy::{final_decision, inline_decision, FlushDecision};
use super::reprocess::ReprocessScheduler;
use super::watermark::{format_watermark, WatermarkStore};
use crate::config::AggregatorConfig;
use crate::error::{AggregatorError, Result};
use crate::logging::log_scan_operation;
use crate::messaging::{DelayMessage, MessageBus};
use crate::models::{LogicalKey, ProcessTier, ThresholdConfig, TriggerPayload};
use crate::operators::EventOperator;
use crate::storage::ObjectStorage;

/// Watermark written at the end of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatermarkUpdate {
    pub key: LogicalKey,
    pub processed_at: DateTime<Utc>,
    /// Files held back for the next scan
    pub retained: Vec<String>,
}

/// Everything one scan did
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    pub bucket: String,
    pub prefix: Option<String>,
    pub objects_listed: usize,
    pub objects_accumulated: usize,
    pub dispatches: Vec<DispatchRecord>,
    pub watermarks: Vec<WatermarkUpdate>,
    /// Set by any dispatch
    pub reprocess_requested: bool,
    pub reprocess_scheduled: Option<DelayMessage>,
}

impl ScanOutcome {
    fn record_dispatch(&mut self, record: DispatchRecord) {
        self.dispatches.push(record);
        self.reprocess_requested = true;
    }

    /// Dispatches made for `key`, in dispatch order
    pub fn dispatches_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a DispatchRecord> {
        self.dispatches
            .iter()
            .filter(move |record| record.message.directory == key)
    }

    pub fn is_noop(&self) -> bool {
        self.dispatches.is_empty() && self.watermarks.is_empty() && self.reprocess_scheduled.is_none()
    }
}

/// Per-invocation scan state threaded through the phases
struct Scan<'a> {
    bucket: &'a str,
    thresholds: ThresholdConfig,
    accumulators: TableAccumulators,
    watermarks: WatermarkStore,
    outcome: ScanOutcome,
}

pub struct BatchAggregationScheduler {
    storage: Arc<dyn ObjectStorage>,
    config: Arc<AggregatorConfig>,
    dispatcher: Dispatcher,
    reprocess: ReprocessScheduler,
}

impl BatchAggregationScheduler {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        bus: Arc<dyn MessageBus>,
        config: Arc<AggregatorConfig>,
    ) -> Self {
        let dispatcher = Dispatcher::new(bus.clone(), config.project.clone(), config.topics.clone());
        let reprocess = ReprocessScheduler::new(bus, config.project.clone(), config.topics.delay.clone());
        Self {
            storage,
            config,
            dispatcher,
            reprocess,
        }
    }

    /// Run one scan for the trigger `data` received on `topic`, with `now` as
    /// the reference time of the staleness window
    pub async fn execute_at(&self, data: &Value, topic: &str, now: DateTime<Utc>) -> Result<ScanOutcome> {
        let trigger = TriggerPayload::parse(data)?;
        let thresholds = trigger.threshold_config()?;
        let bucket = trigger
            .bucket
            .clone()
            .unwrap_or_else(|| self.config.buckets.landing_zone.clone());
        let prefix = trigger.prefix.as_deref();

        log_scan_operation("scan", &bucket, prefix, trigger.reprocess_time(), "started", None);

        let records = self
            .storage
            .list(&bucket, prefix)
            .await
            .map_err(|e| AggregatorError::enumeration(&bucket, prefix, e))?;

        let mut scan = Scan {
            bucket: &bucket,
            thresholds,
            accumulators: TableAccumulators::new(),
            watermarks: WatermarkStore::new(self.storage.clone(), self.config.clone()),
            outcome: ScanOutcome {
                bucket: bucket.clone(),
                prefix: trigger.prefix.clone(),
                objects_listed: records.len(),
                ..ScanOutcome::default()
            },
        };

        for record in &records {
            let Some((key, filename)) = record.split_key() else {
                debug!(object = %record.name, "Skipping object outside any table directory");
                continue;
            };

            let watermark = scan.watermarks.get(&key).await?;
            let Some(accumulator) = scan.accumulators.accumulate(&key, filename, record, watermark) else {
                continue;
            };

            if let FlushDecision::Flush { tier, destination } = inline_decision(accumulator, &scan.thresholds) {
                if let Some(flushed) = scan.accumulators.reset_partial(&key) {
                    let to_bucket = destination.bucket(scan.bucket, &self.config.buckets.raw);
                    self.flush(&mut scan.outcome, scan.bucket, to_bucket, &key, flushed, tier)
                        .await?;
                }
            }
        }
        scan.outcome.objects_accumulated = scan.accumulators.folded_objects();

        self.finish_keys(&mut scan, now).await?;

        let reprocess_requested = scan.outcome.reprocess_requested;
        let mut outcome = scan.outcome;
        if let Some(message) = ReprocessScheduler::plan(&trigger, &thresholds, reprocess_requested, topic)? {
            self.reprocess.schedule(&message).await?;
            outcome.reprocess_scheduled = Some(message);
        }

        let details = format!(
            "listed={} accumulated={} dispatched={} watermarks={}",
            outcome.objects_listed,
            outcome.objects_accumulated,
            outcome.dispatches.len(),
            outcome.watermarks.len()
        );
        log_scan_operation(
            "scan",
            &bucket,
            prefix,
            trigger.reprocess_time(),
            "completed",
            Some(&details),
        );
        Ok(outcome)
    }

    /// Final flush check and watermark commit, one key at a time in key order
    async fn finish_keys(&self, scan: &mut Scan<'_>, now: DateTime<Utc>) -> Result<()> {
        let scanned: Vec<(LogicalKey, ScannedKey)> = scan
            .accumulators
            .scanned()
            .map(|(key, scanned)| (key.clone(), scanned.clone()))
            .collect();

        for (key, scanned) in scanned {
            let decision = match scan.accumulators.get(&key) {
                Some(accumulator) => final_decision(
                    accumulator,
                    scan.accumulators.is_partially_processed(&key),
                    &scan.thresholds,
                    now,
                ),
                None => FlushDecision::NoOp,
            };

            let retained = match decision {
                FlushDecision::Flush { tier, destination } => {
                    if let Some(remainder) = scan.accumulators.take(&key) {
                        let to_bucket = destination.bucket(scan.bucket, &self.config.buckets.raw);
                        self.flush(&mut scan.outcome, scan.bucket, to_bucket, &key, remainder, tier)
                            .await?;
                    }
                    Vec::new()
                }
                FlushDecision::NoOp => match scan.accumulators.get(&key) {
                    Some(retained) => {
                        debug!(
                            key = %key,
                            files = retained.file_count(),
                            size = retained.size(),
                            "Fragment retained for a later invocation"
                        );
                        retained.files().to_vec()
                    }
                    None => Vec::new(),
                },
            };

            let previous = scan.watermarks.get(&key).await?;
            let next = previous.advance(scanned.latest(), scanned.examined(), retained.iter().cloned());
            if &next == previous {
                debug!(key = %key, "Watermark unchanged");
                continue;
            }

            let processed_at = next.processed_at();
            scan.watermarks.put(&key, next).await?;
            debug!(key = %key, processed_at = %format_watermark(processed_at), "Key finished");
            scan.outcome.watermarks.push(WatermarkUpdate {
                key,
                processed_at,
                retained,
            });
        }
        Ok(())
    }

    async fn flush(
        &self,
        outcome: &mut ScanOutcome,
        from_bucket: &str,
        to_bucket: &str,
        key: &LogicalKey,
        accumulator: TableAccumulator,
        tier: ProcessTier,
    ) -> Result<()> {
        let size = accumulator.size();
        let record = self
            .dispatcher
            .send_to_process(from_bucket, to_bucket, key, accumulator.into_files(), size, tier)
            .await
            .map_err(|e| {
                warn!(key = %key, bucket = %from_bucket, error = %e, "Dispatch failed, aborting scan");
                AggregatorError::dispatch(from_bucket, key.as_str(), e)
            })?;
        outcome.record_dispatch(record);
        Ok(())
    }
}

#[async_trait]
impl EventOperator for BatchAggregationScheduler {
    fn name(&self) -> &str {
        "batch_aggregation_scheduler"
    }

    async fn execute(&self, data: &Value, topic: &str) -> Result<Value> {
        let outcome = self.execute_at(data, topic, Utc::now()).await?;
        info!(
            bucket = %outcome.bucket,
            dispatches = outcome.dispatches.len(),
            reprocess_scheduled = outcome.reprocess_scheduled.is_some(),
            "✅ Scan finished"
        );
        Ok(serde_json::to_value(&outcome)?)
    }
}
