//! Multi-customer meeting orchestration.
//!
//! For one change, creates (or cancels) a meeting per targeted customer and
//! writes the meeting identifiers back into the customer copy and the
//! archive copy of the change record.
//!
//! Per-customer units run concurrently, bounded by a semaphore. Each unit's
//! provider phase (credential resolution plus the provider call and its
//! retries) carries its own deadline. Write-back happens after the provider
//! phase and is never abandoned halfway, so a created meeting is always
//! either recorded or reported as a critical store failure.
//!
//! The archive record is shared by all customers of a change. It is read
//! once before any provider call, so an unreadable archive fails the call
//! before meetings exist upstream; its updates are then serialized with a
//! mutex.
//!
//! Create requests carry a transaction id unique to the customer and the
//! call, which lets the provider collapse a retried create into the event
//! it already accepted.

use crate::errors::CmError;
use crate::models::{
    BatchResult, ChangeRecord, MeetingDetails, MeetingOutcome, MeetingRequest, MetadataRef,
    OutcomeAction,
};
use crate::observability::{self, metrics};
use crate::repositories::{MetadataStore, StoreLocation};
use crate::services::credentials::CredentialResolver;
use crate::services::meeting_client::RetryPolicy;
use chrono::{DateTime, Utc};
use common::types::{ChangeId, CustomerCode};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Default number of customers processed concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Default deadline for one customer's provider phase.
pub const DEFAULT_CUSTOMER_TIMEOUT: Duration = Duration::from_secs(60);

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_concurrency: usize,
    pub customer_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            customer_timeout: DEFAULT_CUSTOMER_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Input of a multi-customer create.
#[derive(Debug, Clone)]
pub struct CreateInviteRequest {
    /// Customers to target. Empty means "the customers named in the record".
    pub customer_codes: Vec<CustomerCode>,
    pub topic_name: String,
    pub metadata: MetadataRef,
    /// Mailbox the meetings are created in.
    pub sender: String,
    pub dry_run: bool,
    pub force_update: bool,
}

/// Input of the legacy single-customer create.
#[derive(Debug, Clone)]
pub struct LegacyInviteRequest {
    pub customer_code: CustomerCode,
    pub topic_name: String,
    pub metadata: MetadataRef,
    pub sender: String,
    pub dry_run: bool,
    pub force_update: bool,
}

/// Customers targeted by a change: the record's list, or `fallback` when
/// the record names none. Order is kept and duplicates are dropped.
pub fn extract_customer_codes(record: &ChangeRecord, fallback: &[CustomerCode]) -> Vec<CustomerCode> {
    let source = if record.customers.is_empty() {
        fallback
    } else {
        &record.customers
    };
    dedup_codes(source)
}

/// Translate a legacy single-customer request into a multi-customer one.
///
/// `source` is the already-loaded change record the legacy request points
/// at; it is passed on inline so it is not read twice.
pub fn adapt_legacy_request(legacy: LegacyInviteRequest, source: ChangeRecord) -> CreateInviteRequest {
    let customer_codes = extract_customer_codes(&source, std::slice::from_ref(&legacy.customer_code));
    CreateInviteRequest {
        customer_codes,
        topic_name: legacy.topic_name,
        metadata: MetadataRef::Inline(Box::new(source)),
        sender: legacy.sender,
        dry_run: legacy.dry_run,
        force_update: legacy.force_update,
    }
}

fn dedup_codes(codes: &[CustomerCode]) -> Vec<CustomerCode> {
    let mut seen = HashSet::new();
    codes
        .iter()
        .filter(|code| seen.insert((*code).clone()))
        .cloned()
        .collect()
}

/// Trim, drop empties, and de-duplicate case-insensitively keeping the
/// first spelling.
fn dedup_recipients(attendees: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    attendees
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty() && seen.insert(a.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Customer copy seeded from the source record when none exists yet.
fn seed_customer_copy(source: &ChangeRecord) -> ChangeRecord {
    let mut copy = source.clone();
    copy.clear_meeting();
    copy.customer_meetings.clear();
    copy
}

/// Meeting content shared by every customer of one change.
#[derive(Debug, Clone)]
struct MeetingContent {
    organizer: String,
    subject: String,
    body: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timezone: String,
}

impl MeetingContent {
    fn from_record(record: &ChangeRecord, topic_name: &str, sender: &str) -> Result<Self, CmError> {
        let topic_name = topic_name.trim();
        if topic_name.is_empty() {
            return Err(CmError::Validation("topic name is required".to_string()));
        }
        let organizer = sender.trim();
        if organizer.is_empty() {
            return Err(CmError::Validation("sender identity is required".to_string()));
        }

        let (start, end) = match (record.meeting_start, record.meeting_end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(CmError::Validation(format!(
                    "change {} has no meeting start/end",
                    record.change_id
                )))
            }
        };
        if end <= start {
            return Err(CmError::Validation(format!(
                "change {} meeting ends before it starts",
                record.change_id
            )));
        }

        let title = record
            .meeting_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&record.title);
        let body = if record.description.trim().is_empty() {
            format!("Change: {}", record.change_id)
        } else {
            format!("{}\n\nChange: {}", record.description.trim(), record.change_id)
        };

        Ok(Self {
            organizer: organizer.to_string(),
            subject: format!("{topic_name}: {title} ({})", record.change_id),
            body,
            start,
            end,
            timezone: record.timezone.clone(),
        })
    }

    fn request(&self, recipients: Vec<String>, transaction_id: String) -> MeetingRequest {
        MeetingRequest {
            transaction_id,
            organizer: self.organizer.clone(),
            recipients,
            subject: self.subject.clone(),
            body: self.body.clone(),
            start: self.start,
            end: self.end,
            timezone: self.timezone.clone(),
        }
    }
}

/// Serialized updates of the archive record of a change.
struct ArchiveWriter {
    store: Arc<dyn MetadataStore>,
    location: StoreLocation,
    /// Archive as read before fan-out, then as last written.
    current: Mutex<ChangeRecord>,
}

impl ArchiveWriter {
    fn new(store: Arc<dyn MetadataStore>, archive: ChangeRecord) -> Self {
        Self {
            store,
            location: StoreLocation::Archive(archive.change_id.clone()),
            current: Mutex::new(archive),
        }
    }

    /// Apply `apply` to the archive and write it. The in-memory state only
    /// advances when the write succeeded.
    async fn update<F>(&self, apply: F) -> Result<(), CmError>
    where
        F: FnOnce(&mut ChangeRecord) + Send,
    {
        let mut current = self.current.lock().await;

        let mut next = current.clone();
        apply(&mut next);
        self.store.write(&self.location, &next).await?;
        *current = next;
        Ok(())
    }
}

/// State shared by the per-customer units of one call.
struct UnitContext {
    resolver: Arc<dyn CredentialResolver>,
    store: Arc<dyn MetadataStore>,
    archive: ArchiveWriter,
    source: ChangeRecord,
    /// Distinguishes the provider transactions of this call from earlier ones.
    call_id: String,
    retry: RetryPolicy,
    customer_timeout: Duration,
}

impl UnitContext {
    fn change_id(&self) -> &ChangeId {
        &self.source.change_id
    }

    fn customer_location(&self, customer: &CustomerCode) -> StoreLocation {
        StoreLocation::Customer(customer.clone(), self.change_id().clone())
    }

    /// Idempotency key of one customer's create; stable across retries.
    fn transaction_id(&self, customer: &CustomerCode) -> String {
        format!("{}-{customer}-{}", self.change_id(), self.call_id)
    }

    /// The customer's copy of the record; `None` if it does not exist yet.
    async fn read_customer_copy(
        &self,
        customer: &CustomerCode,
    ) -> Result<Option<ChangeRecord>, CmError> {
        match self.store.read(&self.customer_location(customer)).await {
            Ok(record) => Ok(Some(record)),
            Err(CmError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Runs the provider phase under the per-customer deadline.
    async fn with_deadline<T, Fut>(&self, phase: Fut) -> Result<T, CmError>
    where
        Fut: std::future::Future<Output = Result<T, CmError>>,
    {
        tokio::time::timeout(self.customer_timeout, phase)
            .await
            .map_err(|_| CmError::Timeout(self.customer_timeout.as_secs()))?
    }
}

/// Result of one per-customer unit.
struct UnitResult {
    outcome: MeetingOutcome,
    /// Store failure that must reach the caller.
    critical: Option<CmError>,
}

impl UnitResult {
    fn done(outcome: MeetingOutcome) -> Self {
        Self {
            outcome,
            critical: None,
        }
    }

    fn failed(ctx: &UnitContext, customer: &CustomerCode, error: &CmError) -> Self {
        warn!(
            target: "cm.services.orchestrator",
            change_id = %ctx.change_id(),
            customer_code = %customer,
            error_code = error.error_code(),
            error = %error,
            "Customer operation failed"
        );
        Self::done(MeetingOutcome::failed(customer.clone(), error))
    }

    fn store_failure(customer: &CustomerCode, error: CmError, meeting_id: Option<&str>) -> Self {
        observability::report_critical(&error, meeting_id);
        Self {
            outcome: MeetingOutcome::failed(customer.clone(), &error),
            critical: Some(error),
        }
    }
}

/// Drives multi-customer meeting creation and cancellation.
pub struct MeetingOrchestrator {
    resolver: Arc<dyn CredentialResolver>,
    store: Arc<dyn MetadataStore>,
    settings: OrchestratorSettings,
}

impl MeetingOrchestrator {
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        store: Arc<dyn MetadataStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            resolver,
            store,
            settings,
        }
    }

    /// Create a meeting for every targeted customer of a change.
    ///
    /// Per-customer failures are reported in the returned batch and never
    /// stop other customers. A write-back failure is logged as critical and
    /// returned in [`BatchResult::critical`] next to every outcome.
    ///
    /// # Errors
    ///
    /// Returned before any provider call:
    ///
    /// - `CmError::Validation` for an empty customer set, missing topic or
    ///   sender, or an invalid meeting window
    /// - `CmError::NotFound` / `CmError::Malformed` if the source record or
    ///   the stored archive cannot be loaded
    #[instrument(skip_all, fields(change_id = %request.metadata.change_id(), dry_run = request.dry_run, force_update = request.force_update))]
    pub async fn create_multi_customer_meeting_invite(
        &self,
        request: CreateInviteRequest,
    ) -> Result<BatchResult, CmError> {
        let (source, archive) = self.load_create_records(&request.metadata).await?;
        let customers = if request.customer_codes.is_empty() {
            extract_customer_codes(&source, &[])
        } else {
            dedup_codes(&request.customer_codes)
        };
        if customers.is_empty() {
            return Err(CmError::Validation(format!(
                "change {} targets no customers",
                source.change_id
            )));
        }
        metrics::record_batch_size("create", customers.len());

        info!(
            target: "cm.services.orchestrator",
            change_id = %source.change_id,
            customers = customers.len(),
            dry_run = request.dry_run,
            force_update = request.force_update,
            "Creating meetings"
        );

        if !source.meeting_required {
            info!(
                target: "cm.services.orchestrator",
                change_id = %source.change_id,
                "Change does not require a meeting"
            );
            let outcomes = customers
                .into_iter()
                .map(|c| MeetingOutcome::succeeded(c, OutcomeAction::Skipped))
                .collect();
            return Ok(self.finish("create", &source.change_id, outcomes));
        }

        let content = Arc::new(MeetingContent::from_record(
            &source,
            &request.topic_name,
            &request.sender,
        )?);
        let ctx = Arc::new(self.unit_context(source, archive));
        let dry_run = request.dry_run;
        let force_update = request.force_update;

        let batch = self
            .fan_out("create", &ctx, customers, move |ctx, customer| {
                let content = Arc::clone(&content);
                async move {
                    create_for_customer(&ctx, &customer, &content, dry_run, force_update).await
                }
            })
            .await;
        Ok(batch)
    }

    /// Cancel the meeting of every targeted customer of a change.
    ///
    /// Metadata is cleared only after the provider confirmed the cancel.
    /// Write-back failures are reported as for
    /// [`Self::create_multi_customer_meeting_invite`].
    ///
    /// # Errors
    ///
    /// Same classes as [`Self::create_multi_customer_meeting_invite`].
    #[instrument(skip_all, fields(change_id = %metadata.change_id()))]
    pub async fn cancel_multi_customer_meeting(
        &self,
        customer_codes: Vec<CustomerCode>,
        metadata: MetadataRef,
    ) -> Result<BatchResult, CmError> {
        let source = self.load_cancel_source(metadata).await?;
        let customers = if customer_codes.is_empty() {
            extract_customer_codes(&source, &[])
        } else {
            dedup_codes(&customer_codes)
        };
        if customers.is_empty() {
            return Err(CmError::Validation(format!(
                "change {} targets no customers",
                source.change_id
            )));
        }
        metrics::record_batch_size("cancel", customers.len());

        info!(
            target: "cm.services.orchestrator",
            change_id = %source.change_id,
            customers = customers.len(),
            "Cancelling meetings"
        );

        let ctx = Arc::new(self.unit_context(source.clone(), source));
        let batch = self
            .fan_out("cancel", &ctx, customers, |ctx, customer| async move {
                cancel_for_customer(&ctx, &customer).await
            })
            .await;
        Ok(batch)
    }

    /// Legacy single-customer entry point.
    ///
    /// Targets every customer named in the record, falling back to
    /// `customer_code` only when the record names none.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_multi_customer_meeting_invite`].
    #[deprecated(note = "use create_multi_customer_meeting_invite")]
    pub async fn create_meeting_invite(
        &self,
        legacy: LegacyInviteRequest,
    ) -> Result<BatchResult, CmError> {
        warn!(
            target: "cm.deprecated",
            customer_code = %legacy.customer_code,
            "create_meeting_invite is deprecated; use create_multi_customer_meeting_invite"
        );
        let source = self.load_source(&legacy.metadata).await?;
        let request = adapt_legacy_request(legacy, source);
        self.create_multi_customer_meeting_invite(request).await
    }

    async fn load_source(&self, metadata: &MetadataRef) -> Result<ChangeRecord, CmError> {
        match metadata {
            MetadataRef::Stored(change_id) => {
                self.store
                    .read(&StoreLocation::Archive(change_id.clone()))
                    .await
            }
            MetadataRef::Inline(record) => Ok((**record).clone()),
        }
    }

    /// The stored archive; `None` if it does not exist yet.
    async fn read_archive(&self, change_id: &ChangeId) -> Result<Option<ChangeRecord>, CmError> {
        match self.store.read(&StoreLocation::Archive(change_id.clone())).await {
            Ok(archive) => Ok(Some(archive)),
            Err(CmError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Source record of a create plus the archive its write-back starts
    /// from. An inline source falls back to itself when no archive exists.
    async fn load_create_records(
        &self,
        metadata: &MetadataRef,
    ) -> Result<(ChangeRecord, ChangeRecord), CmError> {
        match metadata {
            MetadataRef::Stored(_) => {
                let archive = self.load_source(metadata).await?;
                Ok((archive.clone(), archive))
            }
            MetadataRef::Inline(record) => {
                let source = (**record).clone();
                let archive = self
                    .read_archive(&source.change_id)
                    .await?
                    .unwrap_or_else(|| source.clone());
                Ok((source, archive))
            }
        }
    }

    /// Cancellation prefers the stored archive, which knows every meeting
    /// created for the change.
    async fn load_cancel_source(&self, metadata: MetadataRef) -> Result<ChangeRecord, CmError> {
        match metadata {
            MetadataRef::Stored(_) => self.load_source(&metadata).await,
            MetadataRef::Inline(record) => Ok(self
                .read_archive(&record.change_id)
                .await?
                .unwrap_or(*record)),
        }
    }

    fn unit_context(&self, source: ChangeRecord, archive: ChangeRecord) -> UnitContext {
        UnitContext {
            resolver: Arc::clone(&self.resolver),
            store: Arc::clone(&self.store),
            archive: ArchiveWriter::new(Arc::clone(&self.store), archive),
            source,
            call_id: Uuid::new_v4().simple().to_string(),
            retry: self.settings.retry,
            customer_timeout: self.settings.customer_timeout,
        }
    }

    /// Run one unit per customer and gather outcomes in input order.
    async fn fan_out<F, Fut>(
        &self,
        operation: &'static str,
        ctx: &Arc<UnitContext>,
        customers: Vec<CustomerCode>,
        unit: F,
    ) -> BatchResult
    where
        F: Fn(Arc<UnitContext>, CustomerCode) -> Fut,
        Fut: std::future::Future<Output = UnitResult> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (index, customer) in customers.iter().enumerate() {
            let sem = Arc::clone(&semaphore);
            let work = unit(Arc::clone(ctx), customer.clone());
            let customer = customer.clone();

            join_set.spawn(async move {
                let result = match sem.acquire().await {
                    Ok(_permit) => work.await,
                    Err(_) => UnitResult::done(MeetingOutcome::failed(
                        customer,
                        &CmError::Internal("semaphore closed".to_string()),
                    )),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<MeetingOutcome>> = vec![None; customers.len()];
        let mut criticals: Vec<(usize, CmError)> = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(error) = result.critical {
                        criticals.push((index, error));
                    }
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(result.outcome);
                    }
                }
                Err(e) => {
                    warn!(target: "cm.services.orchestrator", error = %e, "Customer task aborted");
                }
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(customers)
            .map(|(slot, customer)| {
                slot.unwrap_or_else(|| {
                    MeetingOutcome::failed(customer, &CmError::Internal("task aborted".to_string()))
                })
            })
            .collect();

        criticals.sort_by_key(|(index, _)| *index);
        let critical = criticals.into_iter().next().map(|(_, error)| error);

        self.finish(operation, ctx.change_id(), outcomes)
            .with_critical(critical)
    }

    fn finish(
        &self,
        operation: &'static str,
        change_id: &ChangeId,
        outcomes: Vec<MeetingOutcome>,
    ) -> BatchResult {
        for outcome in &outcomes {
            metrics::record_meeting_operation(operation, outcome.action);
        }
        let batch = BatchResult::from_outcomes(outcomes);
        info!(
            target: "cm.services.orchestrator",
            change_id = %change_id,
            operation = operation,
            total = batch.total,
            successful = batch.successful,
            failed = batch.failed,
            "Batch complete"
        );
        batch
    }
}

async fn create_for_customer(
    ctx: &UnitContext,
    customer: &CustomerCode,
    content: &MeetingContent,
    dry_run: bool,
    force_update: bool,
) -> UnitResult {
    let mut copy = match ctx.read_customer_copy(customer).await {
        Ok(Some(copy)) => copy,
        Ok(None) => seed_customer_copy(&ctx.source),
        Err(e) => return UnitResult::failed(ctx, customer, &e),
    };

    if !force_update {
        if let Some(existing) = copy.meeting() {
            info!(
                target: "cm.services.orchestrator",
                change_id = %ctx.change_id(),
                customer_code = %customer,
                meeting_id = %existing.meeting_id,
                "Meeting already scheduled"
            );
            return UnitResult::done(MeetingOutcome::with_meeting(
                customer.clone(),
                OutcomeAction::AlreadyScheduled,
                existing,
            ));
        }
    }

    let recipients = dedup_recipients(&copy.attendees);
    if recipients.is_empty() {
        let error = CmError::Validation(format!("customer {customer} has no recipients"));
        return UnitResult::failed(ctx, customer, &error);
    }

    if dry_run {
        info!(
            target: "cm.services.orchestrator",
            change_id = %ctx.change_id(),
            customer_code = %customer,
            recipients = recipients.len(),
            subject = %content.subject,
            "Dry run: would create meeting"
        );
        return UnitResult::done(MeetingOutcome::succeeded(
            customer.clone(),
            OutcomeAction::DryRun,
        ));
    }

    let request = content.request(recipients, ctx.transaction_id(customer));
    let created = ctx
        .with_deadline(async {
            let provider = ctx.resolver.resolve(customer).await?;
            ctx.retry
                .run("create", || provider.create_meeting(&request))
                .await
        })
        .await;
    let details = match created {
        Ok(details) => details,
        Err(e) => return UnitResult::failed(ctx, customer, &e),
    };

    info!(
        target: "cm.services.orchestrator",
        change_id = %ctx.change_id(),
        customer_code = %customer,
        meeting_id = %details.meeting_id,
        "Meeting created"
    );

    // Archive first: it is authoritative and lets cancel find the meeting
    // even if the customer copy is never written.
    if let Err(e) = ctx
        .archive
        .update(|archive| archive.record_customer_meeting(customer, &details))
        .await
    {
        return UnitResult::store_failure(customer, e, Some(&details.meeting_id));
    }

    copy.set_meeting(&details);
    if let Err(e) = ctx.store.write(&ctx.customer_location(customer), &copy).await {
        return UnitResult::store_failure(customer, e, Some(&details.meeting_id));
    }

    UnitResult::done(MeetingOutcome::with_meeting(
        customer.clone(),
        OutcomeAction::Created,
        details,
    ))
}

async fn cancel_for_customer(ctx: &UnitContext, customer: &CustomerCode) -> UnitResult {
    let copy = match ctx.read_customer_copy(customer).await {
        Ok(copy) => copy,
        Err(e) => return UnitResult::failed(ctx, customer, &e),
    };

    let meeting: Option<MeetingDetails> = copy
        .as_ref()
        .and_then(ChangeRecord::meeting)
        .or_else(|| ctx.source.customer_meetings.get(customer).cloned());
    let Some(meeting) = meeting else {
        info!(
            target: "cm.services.orchestrator",
            change_id = %ctx.change_id(),
            customer_code = %customer,
            "No meeting to cancel"
        );
        return UnitResult::done(MeetingOutcome::succeeded(
            customer.clone(),
            OutcomeAction::NotScheduled,
        ));
    };

    let cancelled = ctx
        .with_deadline(async {
            let provider = ctx.resolver.resolve(customer).await?;
            ctx.retry
                .run("cancel", || provider.cancel_meeting(&meeting))
                .await
        })
        .await;
    if let Err(e) = cancelled {
        // The meeting may still be live; keep its id on record.
        return UnitResult::failed(ctx, customer, &e);
    }

    info!(
        target: "cm.services.orchestrator",
        change_id = %ctx.change_id(),
        customer_code = %customer,
        meeting_id = %meeting.meeting_id,
        "Meeting cancelled"
    );

    if let Err(e) = ctx
        .archive
        .update(|archive| archive.forget_customer_meeting(customer, &meeting.meeting_id))
        .await
    {
        return UnitResult::store_failure(customer, e, Some(&meeting.meeting_id));
    }

    if let Some(mut copy) = copy {
        if copy.meeting_id.as_deref() == Some(meeting.meeting_id.as_str()) {
            copy.clear_meeting();
            if let Err(e) = ctx.store.write(&ctx.customer_location(customer), &copy).await {
                return UnitResult::store_failure(customer, e, Some(&meeting.meeting_id));
            }
        }
    }

    UnitResult::done(MeetingOutcome::with_meeting(
        customer.clone(),
        OutcomeAction::Cancelled,
        meeting,
    ))
}
