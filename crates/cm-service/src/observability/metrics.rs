//! Metrics definitions for the change-management service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `cm_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `operation`: `create`, `cancel`
//! - `status`: `success`, `error`, `timeout`, or an outcome action
//! - `kind`: critical error codes (`STORE_WRITE_ERROR`, `STORE_INIT_ERROR`,
//!   `RESOLVER_INIT_ERROR`)
//!
//! Customer codes and change ids are never used as labels.

use crate::errors::CmError;
use crate::models::OutcomeAction;
use metrics::{counter, histogram};
use std::time::Duration;

/// Record one per-customer outcome.
///
/// Metric: `cm_meeting_operations_total`
/// Labels: `operation`, `status`
pub fn record_meeting_operation(operation: &'static str, action: OutcomeAction) {
    counter!("cm_meeting_operations_total",
        "operation" => operation,
        "status" => action_label(action)
    )
    .increment(1);
}

/// Record a provider request.
///
/// Metric: `cm_provider_request_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_provider_request(operation: &'static str, error: Option<&CmError>, duration: Duration) {
    histogram!("cm_provider_request_duration_seconds",
        "operation" => operation,
        "status" => request_status(error)
    )
    .record(duration.as_secs_f64());
}

/// Record a retry of a transient provider failure.
///
/// Metric: `cm_provider_retries_total`
/// Labels: `operation`
pub fn record_provider_retry(operation: &'static str) {
    counter!("cm_provider_retries_total", "operation" => operation).increment(1);
}

/// Record a critical failure.
///
/// Metric: `cm_critical_failures_total`
/// Labels: `kind`
pub fn record_critical_failure(kind: &'static str) {
    counter!("cm_critical_failures_total", "kind" => kind).increment(1);
}

/// Record the number of customers in one orchestration call.
///
/// Metric: `cm_batch_customers`
/// Labels: `operation`
#[allow(clippy::cast_precision_loss)]
pub fn record_batch_size(operation: &'static str, customers: usize) {
    histogram!("cm_batch_customers", "operation" => operation).record(customers as f64);
}

fn request_status(error: Option<&CmError>) -> &'static str {
    match error {
        None => "success",
        Some(CmError::Timeout(_)) => "timeout",
        Some(_) => "error",
    }
}

fn action_label(action: OutcomeAction) -> &'static str {
    match action {
        OutcomeAction::Created => "created",
        OutcomeAction::AlreadyScheduled => "already_scheduled",
        OutcomeAction::Cancelled => "cancelled",
        OutcomeAction::NotScheduled => "not_scheduled",
        OutcomeAction::DryRun => "dry_run",
        OutcomeAction::Skipped => "skipped",
        OutcomeAction::Failed => "failed",
    }
}
