//! # System Constants
//!
//! Fixed defaults and wire-level constants shared by the scheduler, the
//! watermark store and the event operators.

/// Delay applied to a self-reinvocation when the trigger does not set `reprocess_delay`
pub const DEFAULT_REPROCESS_DELAY_SECONDS: u64 = 60;

/// Number of self-reinvocations allowed when the trigger does not set `reprocess_max_times`
pub const DEFAULT_REPROCESS_MAX_TIMES: u32 = 0;

/// Upper bound honoured by the delay operator for a single wait
pub const MAX_DELAY_SECONDS: u64 = 500;

/// `chrono` format of the persisted `processed_at` watermark value
pub const WATERMARK_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Extension of the per-key watermark document
pub const WATERMARK_DOCUMENT_EXTENSION: &str = "json";

/// Values reported in the `input_type` field of error messages
pub mod input_types {
    pub const EVENT: &str = "event";
    pub const FILE: &str = "file";
}

/// Environment variables consulted by logging and configuration
pub mod env {
    pub const ENVIRONMENT: &str = "AGGREGATOR_ENV";
    pub const FALLBACK_ENVIRONMENT: &str = "APP_ENV";
    pub const CONFIG_PREFIX: &str = "AGGREGATOR";
    pub const CONFIG_SEPARATOR: &str = "__";
}
