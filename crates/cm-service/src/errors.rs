//! Change-management service error types.
//!
//! Per-customer failures (credentials, provider, timeouts) are folded into a
//! `MeetingOutcome` by the orchestrator. Store failures are critical: a
//! write-back failure is attached to the returned `BatchResult`, and a store
//! failure before any provider call is returned as an `Err`.

use thiserror::Error;

/// Change-management service error type.
///
/// Classification:
/// - Validation, NotFound, Malformed: bad input, never retried
/// - UnknownCustomer, Credential: isolated to one customer
/// - ProviderTransient: retried with backoff before being recorded as failed
/// - ProviderTerminal, Timeout: recorded as failed, not retried
/// - StoreInit, StoreWrite: critical, propagated to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CmError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed metadata at {location}: {reason}")]
    Malformed { location: String, reason: String },

    #[error("Unknown customer: {0}")]
    UnknownCustomer(String),

    #[error("Credential error for customer {customer}: {reason}")]
    Credential { customer: String, reason: String },

    #[error("Meeting provider unavailable: {0}")]
    ProviderTransient(String),

    #[error("Meeting provider rejected request: {0}")]
    ProviderTerminal(String),

    #[error("Operation timed out after {0}s")]
    Timeout(u64),

    #[error("Store initialization failed: {0}")]
    StoreInit(String),

    #[error("Store write failed for change {change_id} at {location}: {reason}")]
    StoreWrite {
        location: String,
        change_id: String,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CmError {
    /// Whether a bounded retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CmError::ProviderTransient(_))
    }

    /// Whether this error must be escalated as a critical condition.
    pub fn is_critical(&self) -> bool {
        matches!(self, CmError::StoreInit(_) | CmError::StoreWrite { .. })
    }

    /// Stable code used in outcomes, logs and metrics labels.
    pub fn error_code(&self) -> &'static str {
        match self {
            CmError::Validation(_) => "VALIDATION_ERROR",
            CmError::NotFound(_) => "NOT_FOUND",
            CmError::Malformed { .. } => "MALFORMED",
            CmError::UnknownCustomer(_) => "UNKNOWN_CUSTOMER",
            CmError::Credential { .. } => "CREDENTIAL_ERROR",
            CmError::ProviderTransient(_) => "PROVIDER_TRANSIENT",
            CmError::ProviderTerminal(_) => "PROVIDER_TERMINAL",
            CmError::Timeout(_) => "TIMEOUT",
            CmError::StoreInit(_) => "STORE_INIT_ERROR",
            CmError::StoreWrite { .. } => "STORE_WRITE_ERROR",
            CmError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            CmError::Validation(_) | CmError::NotFound(_) | CmError::Malformed { .. } => 2,
            CmError::StoreInit(_) | CmError::StoreWrite { .. } => 3,
            _ => 1,
        }
    }
}
