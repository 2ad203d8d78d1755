//! # Data Model
//!
//! Typed representations of everything that crosses a boundary: listed
//! objects, logical keys, processing tiers and the per-invocation trigger.

pub mod object_record;
pub mod threshold;
pub mod tier;
pub mod trigger;

pub use object_record::{LogicalKey, ObjectRecord};
pub use threshold::{ThresholdConfig, ThresholdPayload};
pub use tier::ProcessTier;
pub use trigger::{RunNextTask, TriggerMetadata, TriggerPayload};
