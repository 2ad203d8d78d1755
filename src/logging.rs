//! # Structured Logging Module
//!
//! Environment-aware structured logging for scan invocations. Development and
//! test builds log human-readable lines at debug level; production logs JSON
//! at info level. `RUST_LOG` overrides the level when set.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::env;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let console = if environment == "production" {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Another subscriber may already be installed (tests, embedding host)
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var(env::ENVIRONMENT)
        .or_else(|_| std::env::var(env::FALLBACK_ENVIRONMENT))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for a scan invocation
pub fn log_scan_operation(
    operation: &str,
    bucket: &str,
    prefix: Option<&str>,
    reprocess_time: u32,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        bucket = %bucket,
        prefix = prefix,
        reprocess_time = reprocess_time,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔍 SCAN_OPERATION"
    );
}

/// Log structured data for a flush dispatch
pub fn log_dispatch_operation(
    key: &str,
    tier: &str,
    from_bucket: &str,
    to_bucket: &str,
    file_count: usize,
    size: u64,
) {
    tracing::info!(
        key = %key,
        tier = %tier,
        from_bucket = %from_bucket,
        to_bucket = %to_bucket,
        file_count = file_count,
        size = size,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 DISPATCH_OPERATION"
    );
}

/// Log structured data for an operator run
pub fn log_operator_operation(operator: &str, event_id: &str, topic: &str, status: &str) {
    tracing::info!(
        operator = %operator,
        event_id = %event_id,
        topic = %topic,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "⚙️ OPERATOR_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
