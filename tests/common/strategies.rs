//! Proptest strategies for listings and thresholds.

#![allow(dead_code)]

use batch_aggregator::models::{ObjectRecord, ThresholdConfig};
use chrono::Duration;
use proptest::prelude::*;

use super::builders::now;

/// One generated object: `(size, seconds before now, soft-deleted)`
pub type ObjectSpec = (u64, i64, bool);

pub fn object_spec_strategy() -> impl Strategy<Value = ObjectSpec> {
    (0u64..2_000, 0i64..7_200, prop::bool::weighted(0.1))
}

pub fn object_specs_strategy() -> impl Strategy<Value = Vec<ObjectSpec>> {
    prop::collection::vec(object_spec_strategy(), 0..40)
}

/// Records of one table directory, named `<stem>-<index>.json` in generation order
pub fn records_for(key: &str, stem: &str, specs: &[ObjectSpec]) -> Vec<ObjectRecord> {
    specs
        .iter()
        .enumerate()
        .map(|(i, (size, age, deleted))| {
            let record = ObjectRecord::new(format!("{key}/{stem}-{i:04}.json"), *size, now() - Duration::seconds(*age));
            if *deleted {
                record.with_deleted_at(now())
            } else {
                record
            }
        })
        .collect()
}

/// Thresholds with `size_small <= size_medium`
pub fn threshold_strategy() -> impl Strategy<Value = ThresholdConfig> {
    (1u64..1_500, 0u64..1_500, 1usize..10, 0u64..120).prop_map(
        |(size_small, extra, file_quantity, minutes)| ThresholdConfig {
            size_small,
            size_medium: size_small + extra,
            file_quantity,
            minutes,
            reprocess_delay: 60,
            reprocess_max_times: 0,
        },
    )
}
