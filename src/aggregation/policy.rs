//! # Threshold Policy
//!
//! Pure flush decisions over an accumulator and the invocation thresholds.
//!
//! The policy runs twice per key:
//!
//! - **inline**, after every fold, catching keys that outgrow `size_medium`
//!   or `file_quantity` mid-scan
//! - **final**, once per key still holding files when the listing is consumed,
//!   applying the `minutes` staleness window
//!
//! Neither check ever selects [`ProcessTier::Large`].

use chrono::{DateTime, Utc};

use super::accumulator::TableAccumulator;
use crate::models::{ProcessTier, ThresholdConfig};

/// Where flushed files are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Stay in the bucket they were listed from
    SourceBucket,
    /// The configured raw landing bucket
    RawLanding,
}

impl Destination {
    /// Concrete bucket for a flush out of `source`
    pub fn bucket<'a>(&self, source: &'a str, raw_landing: &'a str) -> &'a str {
        match self {
            Destination::SourceBucket => source,
            Destination::RawLanding => raw_landing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    NoOp,
    Flush {
        tier: ProcessTier,
        destination: Destination,
    },
}

impl FlushDecision {
    pub fn is_flush(&self) -> bool {
        matches!(self, FlushDecision::Flush { .. })
    }
}

/// Mid-scan decision, evaluated right after a fold
pub fn inline_decision(accumulator: &TableAccumulator, thresholds: &ThresholdConfig) -> FlushDecision {
    if accumulator.size() > thresholds.size_medium {
        return FlushDecision::Flush {
            tier: ProcessTier::Medium,
            destination: Destination::RawLanding,
        };
    }

    if accumulator.file_count() > thresholds.file_quantity {
        return FlushDecision::Flush {
            tier: ProcessTier::for_size(accumulator.size(), thresholds.size_small),
            destination: Destination::SourceBucket,
        };
    }

    FlushDecision::NoOp
}

/// End-of-scan decision for a key that still holds files.
///
/// A lone file of a key that was not flushed mid-scan always waits. Otherwise
/// the key flushes when it was partially processed this invocation or when
/// its oldest file is older than `now - minutes`.
pub fn final_decision(
    accumulator: &TableAccumulator,
    partially_processed: bool,
    thresholds: &ThresholdConfig,
    now: DateTime<Utc>,
) -> FlushDecision {
    if accumulator.file_count() == 0 {
        return FlushDecision::NoOp;
    }

    if accumulator.file_count() == 1 && !partially_processed {
        return FlushDecision::NoOp;
    }

    let stale = accumulator.min_created_at() < thresholds.staleness_cutoff(now);
    if partially_processed || stale {
        return FlushDecision::Flush {
            tier: ProcessTier::for_size(accumulator.size(), thresholds.size_small),
            destination: Destination::SourceBucket,
        };
    }

    FlushDecision::NoOp
}
