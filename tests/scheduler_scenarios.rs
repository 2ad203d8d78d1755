//! End-to-end scan scenarios over in-memory storage and a recording bus.

mod common;

use async_trait::async_trait;
use batch_aggregator::aggregation::format_watermark;
use batch_aggregator::messaging::BatchProcessMessage;
use batch_aggregator::models::{ObjectRecord, ProcessTier};
use batch_aggregator::storage::{ObjectStorage, StorageError, StorageResult};
use batch_aggregator::{AggregatorError, BatchAggregationScheduler};
use bytes::Bytes;
use chrono::Duration;
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn dispatched(harness: &Harness, topic: &str) -> Vec<BatchProcessMessage> {
    harness
        .bus
        .published_to(topic)
        .into_iter()
        .map(|message| BatchProcessMessage::from_json(message.payload).unwrap())
        .collect()
}

#[tokio::test]
async fn test_scenario_a_medium_flush_to_raw_landing() {
    let harness = Harness::new();
    harness
        .object("sales/orders/part-01.json", 600, 5)
        .object("sales/orders/part-02.json", 500, 4);

    let outcome = harness
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();

    assert_eq!(outcome.dispatches.len(), 1);
    let messages = dispatched(&harness, "batch-process-medium");
    assert_eq!(
        messages,
        vec![BatchProcessMessage::new(
            LANDING,
            RAW,
            "sales/orders",
            vec!["part-01.json".to_string(), "part-02.json".to_string()],
            ProcessTier::Medium,
        )]
    );
    assert_eq!(outcome.dispatches[0].size, 1100);
    assert!(outcome.reprocess_requested);
}

#[tokio::test]
async fn test_scenario_b_small_flush_on_file_quantity() {
    let harness = Harness::new();
    for (i, size) in [50, 50, 50, 50, 100, 100].into_iter().enumerate() {
        harness.object(&format!("sales/orders/part-{i:02}.json"), size, 5);
    }

    let outcome = harness
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();

    let messages = dispatched(&harness, "batch-process-small");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].from_bucket, LANDING);
    assert_eq!(messages[0].to_bucket, LANDING);
    assert_eq!(messages[0].files.len(), 6);
    assert_eq!(messages[0].files[0], "part-00.json");
    assert_eq!(outcome.dispatches[0].size, 400);
}

#[tokio::test]
async fn test_scenario_c_medium_flush_on_file_quantity_stays_in_bucket() {
    let harness = Harness::new();
    for i in 0..6 {
        harness.object(&format!("sales/orders/part-{i:02}.json"), 100, 5);
    }

    harness
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();

    let messages = dispatched(&harness, "batch-process-medium");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].to_bucket, LANDING);
    assert_eq!(messages[0].tier, ProcessTier::Medium);
    assert!(harness.bus.published_to("batch-process-small").is_empty());
}

#[tokio::test]
async fn test_scenario_d_under_all_thresholds_waits() {
    let harness = Harness::new();
    for i in 0..3 {
        harness.object(&format!("sales/orders/part-{i:02}.json"), 150, 5);
    }

    let outcome = harness
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();

    assert!(outcome.dispatches.is_empty());
    assert!(!outcome.reprocess_requested);
    assert!(harness.bus.is_empty());
    assert_eq!(outcome.objects_accumulated, 3);
    assert_eq!(outcome.watermarks.len(), 1);
}

#[tokio::test]
async fn test_single_file_never_flushes_in_final_check() {
    let harness = Harness::new();
    harness.object("sales/orders/part-00.json", 10, 600);

    let outcome = harness
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();

    assert!(outcome.dispatches.is_empty());
    assert!(harness.bus.is_empty());
}

#[tokio::test]
async fn test_single_file_key_becomes_eligible_with_more_files() {
    let harness = Harness::new();
    harness
        .object("sales/orders/part-00.json", 10, 20)
        .object("sales/orders/part-01.json", 10, 10);

    let trigger = TriggerBuilder::new().with_file_quantity(1).build();
    let outcome = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();

    assert_eq!(outcome.dispatches.len(), 1);
    assert_eq!(outcome.dispatches[0].message.files.len(), 2);
    assert_eq!(outcome.dispatches[0].message.tier, ProcessTier::Small);
}

#[tokio::test]
async fn test_staleness_boundary() {
    let fresh = Harness::new();
    fresh
        .object("sales/orders/part-00.json", 10, 29)
        .object("sales/orders/part-01.json", 10, 10);
    let outcome = fresh
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();
    assert!(outcome.dispatches.is_empty());

    let stale = Harness::new();
    stale
        .object("sales/orders/part-00.json", 10, 31)
        .object("sales/orders/part-01.json", 10, 10);
    let outcome = stale
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();
    assert_eq!(outcome.dispatches.len(), 1);
    assert_eq!(outcome.dispatches[0].message.to_bucket, LANDING);
    assert_eq!(outcome.dispatches[0].message.tier, ProcessTier::Small);
}

#[tokio::test]
async fn test_partially_processed_remainder_is_force_flushed() {
    let harness = Harness::new();
    for i in 0..7 {
        harness.object(&format!("sales/orders/part-{i:02}.json"), 10, 1);
    }

    let outcome = harness
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();

    let messages = dispatched(&harness, "batch-process-small");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].files.len(), 6);
    assert_eq!(messages[1].files, vec!["part-06.json"]);
    assert_eq!(outcome.dispatches_for("sales/orders").count(), 2);
}

#[tokio::test]
async fn test_keys_are_independent() {
    let harness = Harness::new();
    harness
        .object("sales/orders/part-00.json", 900, 5)
        .object("hr/people/part-00.json", 200, 5)
        .object("sales/orders/part-01.json", 200, 5)
        .object("hr/people/part-01.json", 200, 5);

    let outcome = harness
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();

    assert_eq!(outcome.dispatches.len(), 1);
    assert_eq!(outcome.dispatches[0].message.directory, "sales/orders");
    let keys: Vec<_> = outcome.watermarks.iter().map(|w| w.key.as_str()).collect();
    assert_eq!(keys, vec!["hr/people", "sales/orders"]);
}

#[tokio::test]
async fn test_deleted_objects_are_ignored() {
    let harness = Harness::new();
    harness
        .object("sales/orders/part-00.json", 600, 5)
        .record(
            ObjectRecord::new("sales/orders/part-01.json", 500, minutes_ago(4))
                .with_deleted_at(minutes_ago(1)),
        );

    let outcome = harness
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();

    assert_eq!(outcome.objects_listed, 2);
    assert_eq!(outcome.objects_accumulated, 1);
    assert!(outcome.dispatches.is_empty());
}

#[tokio::test]
async fn test_watermark_is_persisted_and_filters_next_scan() {
    let harness = Harness::new();
    harness
        .object("sales/orders/part-00.json", 600, 5)
        .object("sales/orders/part-01.json", 500, 4);
    let trigger = TriggerBuilder::new().build();

    harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();

    assert_eq!(
        harness.watermark_document("sales/orders"),
        Some(json!({
            "processed_at": format_watermark(minutes_ago(4)),
            "boundary": ["part-01.json"]
        }))
    );
    assert_eq!(format_watermark(minutes_ago(4)), "20240301115600");

    harness.object("sales/orders/part-02.json", 700, 1);
    harness.bus.drain();
    let outcome = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();

    assert_eq!(outcome.objects_accumulated, 1);
    assert!(outcome.dispatches.is_empty());
    assert_eq!(outcome.watermarks[0].processed_at, minutes_ago(1));
}

#[tokio::test]
async fn test_rescan_without_new_objects_is_noop() {
    let harness = Harness::new();
    for i in 0..3 {
        harness.object(&format!("sales/orders/part-{i:02}.json"), 150, 5);
    }
    let trigger = TriggerBuilder::new().build();

    harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();
    let watermark = harness.watermark_document("sales/orders");

    let outcome = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();

    // the held-back fragment is looked at again but nothing changes
    assert!(outcome.is_noop());
    assert_eq!(outcome.objects_accumulated, 3);
    assert!(harness.bus.is_empty());
    assert_eq!(harness.watermark_document("sales/orders"), watermark);
}

#[tokio::test]
async fn test_rescan_with_subsecond_timestamps_is_noop() {
    let harness = Harness::new();
    harness
        .record(ObjectRecord::new(
            "sales/orders/part-00.json",
            10,
            minutes_ago(40) + Duration::milliseconds(250),
        ))
        .record(ObjectRecord::new(
            "sales/orders/part-01.json",
            10,
            minutes_ago(40) + Duration::milliseconds(750),
        ));
    let trigger = TriggerBuilder::new().build();

    let first = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();
    assert_eq!(first.dispatches.len(), 1);
    let watermark = harness.watermark_document("sales/orders");
    harness.bus.drain();

    let second = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();

    assert!(second.is_noop());
    assert_eq!(second.objects_accumulated, 0);
    assert!(harness.bus.is_empty());
    assert_eq!(harness.watermark_document("sales/orders"), watermark);
}

#[tokio::test]
async fn test_late_arrival_in_watermark_second_is_not_lost() {
    let harness = Harness::new();
    let second = minutes_ago(40);
    harness
        .record(ObjectRecord::new("sales/orders/part-00.json", 10, second))
        .record(ObjectRecord::new(
            "sales/orders/part-01.json",
            10,
            second + Duration::milliseconds(300),
        ));
    let trigger = TriggerBuilder::new().build();
    harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();

    harness.record(ObjectRecord::new(
        "sales/orders/part-02.json",
        10,
        second + Duration::milliseconds(900),
    ));
    let outcome = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();
    assert_eq!(outcome.objects_accumulated, 1);
    assert!(outcome.dispatches.is_empty());
    assert_eq!(outcome.watermarks[0].retained, vec!["part-02.json"]);

    harness.object("sales/orders/part-03.json", 10, 1);
    let outcome = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();
    assert_eq!(outcome.dispatches.len(), 1);
    assert_eq!(
        outcome.dispatches[0].message.files,
        vec!["part-02.json", "part-03.json"]
    );
}

#[tokio::test]
async fn test_retained_fragment_is_dispatched_once_stale() {
    let harness = Harness::new();
    for i in 0..3 {
        harness.object(&format!("sales/orders/part-{i:02}.json"), 150, 5);
    }
    let trigger = TriggerBuilder::new().build();

    let first = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();
    assert!(first.dispatches.is_empty());
    assert_eq!(first.watermarks[0].retained.len(), 3);

    let later = now() + Duration::hours(2);
    let second = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, later)
        .await
        .unwrap();
    assert_eq!(second.objects_accumulated, 3);
    assert_eq!(second.dispatches.len(), 1);
    assert_eq!(
        second.dispatches[0].message.files,
        vec!["part-00.json", "part-01.json", "part-02.json"]
    );
    assert!(second.watermarks[0].retained.is_empty());

    let third = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, later)
        .await
        .unwrap();
    assert!(third.is_noop());
    assert_eq!(third.objects_accumulated, 0);
}

#[tokio::test]
async fn test_retry_without_staleness_window_flushes_earlier_remainder() {
    let harness = Harness::new();
    harness
        .object("sales/refunds/part-00.json", 10, 5)
        .object("sales/refunds/part-01.json", 10, 3);

    let first = harness
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap();
    assert!(first.dispatches.is_empty());

    let retry = TriggerBuilder::new()
        .with_minutes(0)
        .with_reprocess_time(1)
        .build();
    let outcome = harness
        .scheduler
        .execute_at(&retry, DETECT_TOPIC, now())
        .await
        .unwrap();

    assert_eq!(outcome.dispatches.len(), 1);
    assert_eq!(
        outcome.dispatches[0].message.files,
        vec!["part-00.json", "part-01.json"]
    );
    assert_eq!(outcome.dispatches[0].message.tier, ProcessTier::Small);
}

#[tokio::test]
async fn test_lone_file_joins_next_arrival_once_stale() {
    let harness = Harness::new();
    harness.object("sales/orders/part-00.json", 10, 5);
    let trigger = TriggerBuilder::new().build();

    let first = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();
    assert!(first.dispatches.is_empty());

    // alone it still waits, even past the staleness window
    let later = now() + Duration::hours(1);
    let second = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, later)
        .await
        .unwrap();
    assert!(second.dispatches.is_empty());

    harness.object("sales/orders/part-01.json", 10, -59);
    let third = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, later)
        .await
        .unwrap();
    assert_eq!(third.dispatches.len(), 1);
    assert_eq!(
        third.dispatches[0].message.files,
        vec!["part-00.json", "part-01.json"]
    );
}

#[tokio::test]
async fn test_malformed_trigger_writes_nothing() {
    let harness = Harness::new();
    harness.object("sales/orders/part-00.json", 5000, 5);

    let err = harness
        .scheduler
        .execute_at(
            &json!({"threshold": {"size_small": 500, "size_medium": 1000, "file_quantity": 5}}),
            DETECT_TOPIC,
            now(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AggregatorError::InvalidTrigger { .. }));
    assert!(!err.is_retryable());
    assert!(harness.bus.is_empty());
    assert!(harness.storage.paths(DOCS).is_empty());
}

#[tokio::test]
async fn test_inline_dispatch_failure_commits_no_watermark() {
    let harness = Harness::new();
    harness.bus.fail_topic("batch-process-medium");
    harness
        .object("hr/people/part-00.json", 10, 5)
        .object("sales/orders/part-00.json", 600, 5)
        .object("sales/orders/part-01.json", 500, 4);

    let err = harness
        .scheduler
        .execute_at(&TriggerBuilder::new().build(), DETECT_TOPIC, now())
        .await
        .unwrap_err();

    match err {
        AggregatorError::Dispatch { bucket, key, .. } => {
            assert_eq!(bucket, LANDING);
            assert_eq!(key, "sales/orders");
        }
        other => panic!("expected dispatch error, got {other:?}"),
    }
    assert!(harness.storage.paths(DOCS).is_empty());
}

#[tokio::test]
async fn test_final_dispatch_failure_keeps_earlier_keys() {
    let harness = Harness::new();
    harness.bus.fail_topic("batch-process-small");
    harness
        .object("alpha/t/part-00.json", 300, 60)
        .object("alpha/t/part-01.json", 300, 60)
        .object("beta/t/part-00.json", 10, 60)
        .object("beta/t/part-01.json", 10, 60);
    let trigger = TriggerBuilder::new().build();

    let err = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap_err();
    assert!(matches!(err, AggregatorError::Dispatch { ref key, .. } if key == "beta/t"));
    assert!(err.is_retryable());
    assert!(harness.watermark_document("alpha/t").is_some());
    assert!(harness.watermark_document("beta/t").is_none());

    harness.bus.restore_topic("batch-process-small");
    let outcome = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();
    assert_eq!(outcome.dispatches.len(), 1);
    assert_eq!(outcome.dispatches[0].message.directory, "beta/t");
}

#[tokio::test]
async fn test_bucket_and_prefix_from_trigger() {
    let harness = Harness::new();
    harness.storage.insert_record(
        "archive",
        ObjectRecord::new("sales/orders/part-00.json", 2000, minutes_ago(5)),
    );
    harness.object("sales/orders/part-00.json", 2000, 5);
    harness.storage.insert_record(
        "archive",
        ObjectRecord::new("hr/people/part-00.json", 2000, minutes_ago(5)),
    );

    let trigger = TriggerBuilder::new()
        .with_bucket("archive")
        .with_prefix("sales/")
        .build();
    let outcome = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();

    assert_eq!(outcome.bucket, "archive");
    assert_eq!(outcome.objects_listed, 1);
    assert_eq!(outcome.dispatches[0].message.from_bucket, "archive");
    assert_eq!(outcome.dispatches[0].message.to_bucket, RAW);
}

#[tokio::test]
async fn test_reprocess_scheduled_through_delay_topic() {
    let harness = Harness::new();
    harness
        .object("sales/orders/part-00.json", 600, 5)
        .object("sales/orders/part-01.json", 500, 4);

    let trigger = TriggerBuilder::new().with_reprocess(90, 2).build();
    let outcome = harness
        .scheduler
        .execute_at(&trigger, DETECT_TOPIC, now())
        .await
        .unwrap();

    assert!(outcome.reprocess_scheduled.is_some());
    let delayed = harness.bus.published_to("delay");
    assert_eq!(delayed.len(), 1);
    let payload = &delayed[0].payload;
    assert_eq!(payload["seconds"], json!(90));
    let task = &payload["metadata"]["run_next"][0];
    assert_eq!(task["topic"], json!(DETECT_TOPIC));
    assert_eq!(task["data"]["threshold"]["minutes"], json!(0));
    assert_eq!(task["data"]["threshold"]["size_medium"], json!(1000));
    assert_eq!(task["data"]["metadata"]["reprocess_time"], json!(1));
}

#[tokio::test]
async fn test_reprocess_loop_terminates_after_max_times() {
    let harness = Harness::new();
    let max_times = 3;
    let mut trigger = TriggerBuilder::new().with_reprocess(60, max_times).build();
    let mut reinvocations = 0;
    let mut dispatched_files = Vec::new();

    // a fragment too small and too fresh for the first scan
    harness
        .object("sales/refunds/part-00.json", 10, 5)
        .object("sales/refunds/part-01.json", 10, 4);

    for round in 0..10i64 {
        harness
            .object(&format!("sales/orders/round-{round:02}-a.json"), 600, 30 - round)
            .object(&format!("sales/orders/round-{round:02}-b.json"), 500, 30 - round);

        let outcome = harness
            .scheduler
            .execute_at(&trigger, DETECT_TOPIC, now())
            .await
            .unwrap();
        assert_eq!(outcome.dispatches_for("sales/orders").count(), 1);
        let refunds = outcome.dispatches_for("sales/refunds").count();
        assert_eq!(refunds, usize::from(round == 1));

        for record in &outcome.dispatches {
            for file in &record.message.files {
                dispatched_files.push(format!("{}/{file}", record.message.directory));
            }
        }

        match outcome.reprocess_scheduled {
            Some(message) => {
                reinvocations += 1;
                trigger = message.metadata.run_next[0].data.clone();
            }
            None => break,
        }
    }

    assert_eq!(reinvocations, max_times);
    assert_eq!(harness.bus.published_to("delay").len(), max_times as usize);

    // every landed file went out exactly once
    let mut landed = harness.storage.paths(LANDING);
    landed.sort();
    dispatched_files.sort();
    assert_eq!(dispatched_files, landed);
}

#[tokio::test]
async fn test_no_reprocess_without_dispatch() {
    let harness = Harness::new();
    harness.object("sales/orders/part-00.json", 10, 5);

    let outcome = harness
        .scheduler
        .execute_at(&TriggerBuilder::new().with_reprocess(60, 5).build(), DETECT_TOPIC, now())
        .await
        .unwrap();

    assert!(outcome.reprocess_scheduled.is_none());
    assert!(harness.bus.published_to("delay").is_empty());
}

/// Storage whose listing always fails
struct UnavailableStorage;

#[async_trait]
impl ObjectStorage for UnavailableStorage {
    async fn list(&self, bucket: &str, _prefix: Option<&str>) -> StorageResult<Vec<ObjectRecord>> {
        Err(StorageError::backend("list", bucket, "503 Service Unavailable"))
    }

    async fn read_json(&self, bucket: &str, path: &str) -> StorageResult<Value> {
        Err(StorageError::not_found(bucket, path))
    }

    async fn upload_from_memory(&self, _bucket: &str, _path: &str, _data: Bytes) -> StorageResult<()> {
        Ok(())
    }

    async fn move_files(
        &self,
        _from_bucket: &str,
        _files: &[String],
        _to_bucket: &str,
        _to_directory: &str,
    ) -> StorageResult<()> {
        Ok(())
    }

    async fn delete_files(&self, _bucket: &str, _files: &[String]) -> StorageResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_enumeration_failure_names_bucket_and_prefix() {
    let harness = Harness::new();
    let scheduler = BatchAggregationScheduler::new(
        Arc::new(UnavailableStorage),
        harness.bus.clone(),
        harness.config.clone(),
    );

    let err = scheduler
        .execute_at(&TriggerBuilder::new().with_prefix("sales/").build(), DETECT_TOPIC, now())
        .await
        .unwrap_err();

    assert!(matches!(err, AggregatorError::Enumeration { .. }));
    let message = err.to_string();
    assert!(message.contains(LANDING));
    assert!(message.contains("sales/"));
    assert!(harness.bus.is_empty());
}
