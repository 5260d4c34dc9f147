//! Observability for the change-management service.
//!
//! Provides metrics definitions and the critical-failure reporter. Critical
//! failures are logged under the `cm.critical` target so operators can
//! filter them apart from routine per-customer failures.

pub mod metrics;

use crate::errors::CmError;
use tracing::error;

/// Kind label for credential resolver initialization failures.
pub const RESOLVER_INIT_ERROR: &str = "RESOLVER_INIT_ERROR";

/// Log a critical store failure and count it.
///
/// `meeting_id` names a meeting that exists upstream but could not be
/// recorded, when there is one.
pub fn report_critical(error: &CmError, meeting_id: Option<&str>) {
    error!(
        target: "cm.critical",
        critical = true,
        error_code = error.error_code(),
        meeting_id = meeting_id.unwrap_or(""),
        error = %error,
        "CRITICAL: metadata store failure"
    );
    metrics::record_critical_failure(error.error_code());
}

/// Log a critical credential resolver initialization failure and count it.
pub fn report_resolver_init_failure(error: &CmError) {
    error!(
        target: "cm.critical",
        critical = true,
        error_code = RESOLVER_INIT_ERROR,
        error = %error,
        "CRITICAL: credential resolver initialization failed"
    );
    metrics::record_critical_failure(RESOLVER_INIT_ERROR);
}
