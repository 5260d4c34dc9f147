//! Change-management models.
//!
//! Contains the change record persisted in the metadata store and the
//! per-customer outcome types aggregated by the orchestrator.

use crate::errors::CmError;
use chrono::{DateTime, Utc};
use common::types::{ChangeId, CustomerCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timezone used when a change record does not name one.
pub const DEFAULT_TIMEZONE: &str = "UTC";

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_meeting_required() -> bool {
    true
}

/// Identifier and join link of a meeting created upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub meeting_id: String,
    pub join_url: String,
    /// Mailbox the meeting was created in; needed to cancel it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
}

/// One change request, as stored under `archive/` and `customers/<code>/`.
///
/// Fields this service does not understand are kept in `extra` and written
/// back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub change_id: ChangeId,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Customers targeted by the change.
    #[serde(default)]
    pub customers: Vec<CustomerCode>,

    #[serde(default = "default_meeting_required")]
    pub meeting_required: bool,

    /// Overrides `title` as the meeting subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_start: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_end: Option<DateTime<Utc>>,

    /// IANA timezone name shown to recipients.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Meeting recipients. Customer copies carry that customer's list.
    #[serde(default)]
    pub attendees: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_organizer: Option<String>,

    /// Archive only: every meeting created for this change, by customer.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub customer_meetings: BTreeMap<CustomerCode, MeetingDetails>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChangeRecord {
    /// Create an empty record for a change.
    pub fn new(change_id: ChangeId) -> Self {
        Self {
            change_id,
            title: String::new(),
            description: String::new(),
            customers: Vec::new(),
            meeting_required: true,
            meeting_title: None,
            meeting_start: None,
            meeting_end: None,
            timezone: default_timezone(),
            attendees: Vec::new(),
            meeting_id: None,
            join_url: None,
            meeting_organizer: None,
            customer_meetings: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Returns the recorded meeting, if both halves of the pair are present.
    pub fn meeting(&self) -> Option<MeetingDetails> {
        match (&self.meeting_id, &self.join_url) {
            (Some(meeting_id), Some(join_url)) => Some(MeetingDetails {
                meeting_id: meeting_id.clone(),
                join_url: join_url.clone(),
                organizer: self.meeting_organizer.clone(),
            }),
            _ => None,
        }
    }

    /// Sets both `meeting_id` and `join_url`.
    pub fn set_meeting(&mut self, details: &MeetingDetails) {
        self.meeting_id = Some(details.meeting_id.clone());
        self.join_url = Some(details.join_url.clone());
        self.meeting_organizer.clone_from(&details.organizer);
    }

    /// Clears both `meeting_id` and `join_url`.
    pub fn clear_meeting(&mut self) {
        self.meeting_id = None;
        self.join_url = None;
        self.meeting_organizer = None;
    }

    /// Records a customer's meeting in the archive map and makes it the
    /// top-level meeting.
    pub fn record_customer_meeting(&mut self, customer: &CustomerCode, details: &MeetingDetails) {
        self.customer_meetings
            .insert(customer.clone(), details.clone());
        self.set_meeting(details);
    }

    /// Removes a customer's cancelled meeting from the archive.
    ///
    /// If the top-level pair referenced the cancelled meeting it is replaced
    /// by another still-recorded meeting, or cleared when none remain.
    pub fn forget_customer_meeting(&mut self, customer: &CustomerCode, meeting_id: &str) {
        if self
            .customer_meetings
            .get(customer)
            .is_some_and(|m| m.meeting_id == meeting_id)
        {
            self.customer_meetings.remove(customer);
        }

        if self.meeting_id.as_deref() == Some(meeting_id) {
            match self.customer_meetings.values().next().cloned() {
                Some(remaining) => self.set_meeting(&remaining),
                None => self.clear_meeting(),
            }
        }
    }

    /// Checks that `meeting_id` and `join_url` are either both present or
    /// both absent.
    pub fn has_consistent_meeting_pair(&self) -> bool {
        self.meeting_id.is_some() == self.join_url.is_some()
    }
}

/// Where the orchestrator gets the source record of a change.
#[derive(Debug, Clone)]
pub enum MetadataRef {
    /// Load the archive copy of a stored change.
    Stored(ChangeId),
    /// Use a record supplied by the caller (e.g. read from a file).
    Inline(Box<ChangeRecord>),
}

impl MetadataRef {
    /// Change id the reference points at.
    pub fn change_id(&self) -> &ChangeId {
        match self {
            MetadataRef::Stored(id) => id,
            MetadataRef::Inline(record) => &record.change_id,
        }
    }
}

/// Request sent to the meeting provider for one customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRequest {
    /// Idempotency key; retries of one create share it.
    pub transaction_id: String,
    pub organizer: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: String,
}

/// What happened for one customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeAction {
    /// A new meeting was created and written back.
    Created,
    /// A meeting was already recorded and `force_update` was off.
    AlreadyScheduled,
    /// The meeting was cancelled upstream and cleared from metadata.
    Cancelled,
    /// Nothing to cancel.
    NotScheduled,
    /// Dry run: the action that would have been taken was logged only.
    DryRun,
    /// The change does not require a meeting.
    Skipped,
    /// The operation failed for this customer.
    Failed,
}

/// Result of one create or cancel attempt for one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingOutcome {
    pub customer_code: CustomerCode,
    pub success: bool,
    pub action: OutcomeAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MeetingOutcome {
    /// Successful outcome without meeting details.
    pub fn succeeded(customer_code: CustomerCode, action: OutcomeAction) -> Self {
        Self {
            customer_code,
            success: true,
            action,
            meeting_id: None,
            join_url: None,
            error_code: None,
            error: None,
        }
    }

    /// Successful outcome carrying the meeting it concerns.
    pub fn with_meeting(
        customer_code: CustomerCode,
        action: OutcomeAction,
        meeting: MeetingDetails,
    ) -> Self {
        Self {
            meeting_id: Some(meeting.meeting_id),
            join_url: Some(meeting.join_url),
            ..Self::succeeded(customer_code, action)
        }
    }

    /// Failed outcome.
    pub fn failed(customer_code: CustomerCode, error: &CmError) -> Self {
        Self {
            customer_code,
            success: false,
            action: OutcomeAction::Failed,
            meeting_id: None,
            join_url: None,
            error_code: Some(error.error_code().to_string()),
            error: Some(error.to_string()),
        }
    }
}

/// Aggregated outcome of a multi-customer call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<MeetingOutcome>,
    /// First write-back failure (in input order). The outcomes of every
    /// other customer are still valid.
    #[serde(skip)]
    pub critical: Option<CmError>,
}

impl BatchResult {
    /// Build a batch from outcomes, keeping their order.
    pub fn from_outcomes(results: Vec<MeetingOutcome>) -> Self {
        let successful = results.iter().filter(|o| o.success).count();
        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
            critical: None,
        }
    }

    /// Attach a critical store failure.
    #[must_use]
    pub fn with_critical(mut self, critical: Option<CmError>) -> Self {
        self.critical = critical;
        self
    }

    /// Critical store failure hit during write-back, if any.
    pub fn critical(&self) -> Option<&CmError> {
        self.critical.as_ref()
    }

    /// Outcome for one customer.
    pub fn outcome(&self, customer: &CustomerCode) -> Option<&MeetingOutcome> {
        self.results.iter().find(|o| &o.customer_code == customer)
    }

    /// Render the boundary response shape.
    ///
    /// `success` is true when nothing failed or at least one customer
    /// succeeded; partial success is reported through `summary.failed`.
    pub fn to_response(&self, change_id: &ChangeId) -> BatchResponse {
        BatchResponse {
            success: self.failed == 0 || self.successful > 0,
            change_id: change_id.clone(),
            upload_results: self.results.clone(),
            summary: BatchSummary {
                total: self.total,
                successful: self.successful,
                failed: self.failed,
            },
            critical_error: self.critical.as_ref().map(|e| CriticalError {
                code: e.error_code().to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Counts reported alongside per-customer results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Response body handed to the upload boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub success: bool,
    pub change_id: ChangeId,
    pub upload_results: Vec<MeetingOutcome>,
    pub summary: BatchSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_error: Option<CriticalError>,
}

/// Critical failure reported next to the per-customer results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalError {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn code(raw: &str) -> CustomerCode {
        CustomerCode::parse(raw).unwrap()
    }

    fn details(id: &str) -> MeetingDetails {
        MeetingDetails {
            meeting_id: id.to_string(),
            join_url: format!("https://meet.example.com/{id}"),
            organizer: Some("changes@example.com".to_string()),
        }
    }

    fn record() -> ChangeRecord {
        ChangeRecord::new(ChangeId::parse("CHG-1700000000-abc123").unwrap())
    }

    #[test]
    fn test_deserialize_minimal_record_uses_defaults() {
        let json = r#"{"change_id": "CHG-1700000000-abc123"}"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();

        assert!(record.meeting_required);
        assert_eq!(record.timezone, "UTC");
        assert!(record.customers.is_empty());
        assert!(record.meeting().is_none());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let json = r#"{
            "change_id": "CHG-1700000000-abc123",
            "customers": ["HTS"],
            "implementation_plan": "rolling restart",
            "approvals": {"cab": true}
        }"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.customers, vec![code("hts")]);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["implementation_plan"], "rolling restart");
        assert_eq!(value["approvals"]["cab"], true);
    }

    #[test]
    fn test_meeting_pair_is_set_and_cleared_together() {
        let mut record = record();
        record.set_meeting(&details("m-1"));
        assert_eq!(record.meeting(), Some(details("m-1")));
        assert!(record.has_consistent_meeting_pair());

        record.clear_meeting();
        assert!(record.meeting().is_none());
        assert!(record.meeting_id.is_none() && record.join_url.is_none());
    }

    #[test]
    fn test_partial_pair_is_inconsistent() {
        let mut record = record();
        record.meeting_id = Some("m-1".to_string());
        assert!(!record.has_consistent_meeting_pair());
        assert!(record.meeting().is_none());
    }

    #[test]
    fn test_forget_customer_meeting_falls_back_to_remaining() {
        let mut archive = record();
        archive.record_customer_meeting(&code("hts"), &details("m-1"));
        archive.record_customer_meeting(&code("htsnonprod"), &details("m-2"));
        assert_eq!(archive.meeting_id.as_deref(), Some("m-2"));

        archive.forget_customer_meeting(&code("htsnonprod"), "m-2");
        assert_eq!(archive.meeting(), Some(details("m-1")));

        archive.forget_customer_meeting(&code("hts"), "m-1");
        assert!(archive.meeting().is_none());
        assert!(archive.customer_meetings.is_empty());
    }

    #[test]
    fn test_forget_ignores_mismatched_meeting() {
        let mut archive = record();
        archive.record_customer_meeting(&code("hts"), &details("m-1"));

        archive.forget_customer_meeting(&code("hts"), "m-other");
        assert_eq!(archive.customer_meetings.len(), 1);
        assert_eq!(archive.meeting(), Some(details("m-1")));
    }

    #[test]
    fn test_batch_result_counts() {
        let batch = BatchResult::from_outcomes(vec![
            MeetingOutcome::with_meeting(code("hts"), OutcomeAction::Created, details("m-1")),
            MeetingOutcome::failed(code("htsnonprod"), &CmError::ProviderTerminal("400".into())),
            MeetingOutcome::succeeded(code("other"), OutcomeAction::AlreadyScheduled),
        ]);

        assert_eq!(batch.total, 3);
        assert_eq!(batch.successful, 2);
        assert_eq!(batch.failed, 1);
        assert_eq!(
            batch.outcome(&code("htsnonprod")).unwrap().error_code.as_deref(),
            Some("PROVIDER_TERMINAL")
        );
    }

    #[test]
    fn test_response_shape() {
        let change_id = ChangeId::parse("CHG-1700000000-abc123").unwrap();
        let batch = BatchResult::from_outcomes(vec![
            MeetingOutcome::with_meeting(code("hts"), OutcomeAction::Created, details("m-1")),
            MeetingOutcome::failed(code("htsnonprod"), &CmError::Timeout(60)),
        ]);

        let json = serde_json::to_value(batch.to_response(&change_id)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["changeId"], "CHG-1700000000-abc123");
        assert_eq!(json["summary"]["total"], 2);
        assert_eq!(json["summary"]["successful"], 1);
        assert_eq!(json["summary"]["failed"], 1);
        assert_eq!(json["uploadResults"][0]["customerCode"], "hts");
        assert_eq!(json["uploadResults"][0]["meetingId"], "m-1");
        assert_eq!(json["uploadResults"][1]["action"], "failed");
        assert_eq!(json["uploadResults"][1]["errorCode"], "TIMEOUT");
        assert!(json.get("criticalError").is_none());
    }

    #[test]
    fn test_response_keeps_results_next_to_critical_error() {
        let change_id = ChangeId::parse("CHG-1700000000-abc123").unwrap();
        let store_error = CmError::StoreWrite {
            location: "customers/htsnonprod/CHG-1700000000-abc123.json".to_string(),
            change_id: change_id.to_string(),
            reason: "disk full".to_string(),
        };
        let batch = BatchResult::from_outcomes(vec![
            MeetingOutcome::with_meeting(code("hts"), OutcomeAction::Created, details("m-1")),
            MeetingOutcome::failed(code("htsnonprod"), &store_error),
        ])
        .with_critical(Some(store_error.clone()));

        assert_eq!(batch.critical(), Some(&store_error));

        let json = serde_json::to_value(batch.to_response(&change_id)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["uploadResults"][0]["meetingId"], "m-1");
        assert_eq!(json["criticalError"]["code"], "STORE_WRITE_ERROR");
        assert!(json["criticalError"]["message"]
            .as_str()
            .unwrap()
            .contains("customers/htsnonprod"));
    }

    #[test]
    fn test_response_all_failed_is_unsuccessful() {
        let change_id = ChangeId::parse("CHG-1700000000-abc123").unwrap();
        let batch = BatchResult::from_outcomes(vec![MeetingOutcome::failed(
            code("hts"),
            &CmError::UnknownCustomer("hts".into()),
        )]);

        assert!(!batch.to_response(&change_id).success);
    }
}
