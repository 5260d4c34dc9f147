//! Meeting provider client.
//!
//! Thin call surface over the calendar API: create an online meeting for a
//! recipient list, cancel it by id. Responses are classified into
//! retryable (`ProviderTransient`) and terminal failures; credential
//! rejections surface as `CmError::Credential`.
//!
//! Creates carry the request's `transactionId`, so a create retried after
//! the provider already accepted it resolves to the same event.
//!
//! # Security
//!
//! - Bearer tokens come from a per-tenant `TokenSource` and are never logged
//! - Provider error bodies are logged at debug level only
//! - Timeouts prevent hanging connections

use crate::errors::CmError;
use crate::models::{MeetingDetails, MeetingRequest};
use crate::observability::metrics;
use common::secret::ExposeSecret;
use common::token_manager::{TokenError, TokenSource};
use common::types::CustomerCode;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Default timeout for provider requests in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 15;

/// Default connect timeout in seconds.
const PROVIDER_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Initial backoff delay between retries.
const INITIAL_BACKOFF_MS: u64 = 200;

/// Maximum backoff delay between retries.
const MAX_BACKOFF_MS: u64 = 5_000;

/// Operations exposed by a meeting provider.
#[async_trait::async_trait]
pub trait MeetingProvider: Send + Sync {
    /// Create a meeting and return its id and join link.
    async fn create_meeting(&self, request: &MeetingRequest) -> Result<MeetingDetails, CmError>;

    /// Cancel a previously created meeting.
    async fn cancel_meeting(&self, meeting: &MeetingDetails) -> Result<(), CmError>;
}

/// Bounded retry for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given retry count and default backoff.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, CmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CmError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut retries = 0;

        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    warn!(
                        target: "cm.services.meeting_client",
                        operation = operation,
                        attempt = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient provider failure, will retry"
                    );
                    metrics::record_provider_retry(operation);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBody<'a> {
    content_type: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime<'a> {
    date_time: String,
    time_zone: &'a str,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    address: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Attendee<'a> {
    email_address: EmailAddress<'a>,
    #[serde(rename = "type")]
    attendee_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventRequest<'a> {
    transaction_id: &'a str,
    subject: &'a str,
    body: EventBody<'a>,
    start: EventTime<'a>,
    end: EventTime<'a>,
    attendees: Vec<Attendee<'a>>,
    is_online_meeting: bool,
    online_meeting_provider: &'a str,
}

impl<'a> CreateEventRequest<'a> {
    fn from_request(request: &'a MeetingRequest) -> Self {
        // Times are sent in UTC; the Prefer header carries the display zone.
        let format = "%Y-%m-%dT%H:%M:%S";
        Self {
            transaction_id: &request.transaction_id,
            subject: &request.subject,
            body: EventBody {
                content_type: "text",
                content: &request.body,
            },
            start: EventTime {
                date_time: request.start.format(format).to_string(),
                time_zone: "UTC",
            },
            end: EventTime {
                date_time: request.end.format(format).to_string(),
                time_zone: "UTC",
            },
            attendees: request
                .recipients
                .iter()
                .map(|address| Attendee {
                    email_address: EmailAddress { address },
                    attendee_type: "required",
                })
                .collect(),
            is_online_meeting: true,
            online_meeting_provider: "teamsForBusiness",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnlineMeetingInfo {
    join_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventResponse {
    id: String,
    online_meeting: Option<OnlineMeetingInfo>,
    web_link: Option<String>,
}

#[derive(Debug, Serialize)]
struct CancelEventRequest<'a> {
    comment: &'a str,
}

/// Map an HTTP status to the error taxonomy.
fn classify_status(status: StatusCode, customer: &CustomerCode, operation: &str) -> CmError {
    match status.as_u16() {
        401 | 403 => CmError::Credential {
            customer: customer.to_string(),
            reason: format!("provider rejected credentials ({status})"),
        },
        408 | 429 => CmError::ProviderTransient(format!("{operation} throttled ({status})")),
        code if code >= 500 => CmError::ProviderTransient(format!("{operation} failed ({status})")),
        _ => CmError::ProviderTerminal(format!("{operation} rejected ({status})")),
    }
}

fn classify_token_error(error: TokenError, customer: &CustomerCode) -> CmError {
    match error {
        e if e.is_transient() => CmError::ProviderTransient(format!("token endpoint: {e}")),
        TokenError::Configuration(reason) => CmError::Internal(reason),
        e => CmError::Credential {
            customer: customer.to_string(),
            reason: e.to_string(),
        },
    }
}

// ============================================================================
// HTTP client
// ============================================================================

/// Calendar API client bound to one tenant's credentials.
pub struct HttpMeetingClient {
    customer: CustomerCode,
    client: Client,
    base_url: Url,
    tokens: TokenSource,
    /// Mailbox used to cancel meetings that carry no organizer.
    default_organizer: Option<String>,
}

impl HttpMeetingClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `CmError::Internal` if `base_url` is not a valid base URL or
    /// the HTTP client cannot be built.
    pub fn new(
        customer: CustomerCode,
        base_url: String,
        tokens: TokenSource,
        default_organizer: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CmError> {
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| CmError::Internal(format!("invalid meeting API URL '{base_url}'")))?;

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(PROVIDER_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "cm.services.meeting_client", customer_code = %customer, error = %e, "Failed to build HTTP client");
                CmError::Internal(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            customer,
            client,
            base_url,
            tokens,
            default_organizer,
        })
    }

    /// API URL for `segments` below the base path, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CmError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CmError::Internal(format!("invalid meeting API URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn bearer(&self) -> Result<String, CmError> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| classify_token_error(e, &self.customer))?;
        Ok(format!("Bearer {}", token.expose_secret()))
    }

    async fn failure(&self, response: reqwest::Response, operation: &str) -> CmError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(target: "cm.services.meeting_client", status = %status, body = %body, "Provider error body");

        let error = classify_status(status, &self.customer, operation);
        if matches!(error, CmError::Credential { .. }) {
            // A rejected token may be revoked; fetch a fresh one next time.
            self.tokens.invalidate().await;
        }
        warn!(
            target: "cm.services.meeting_client",
            customer_code = %self.customer,
            status = %status,
            error_code = error.error_code(),
            "Provider request failed"
        );
        error
    }

    async fn send_create(&self, request: &MeetingRequest) -> Result<MeetingDetails, CmError> {
        let url = self.endpoint(&["users", request.organizer.as_str(), "events"])?;
        let bearer = self.bearer().await?;

        let response = self
            .client
            .post(url)
            .header("Authorization", bearer)
            .header("Prefer", format!("outlook.timezone=\"{}\"", request.timezone))
            .json(&CreateEventRequest::from_request(request))
            .send()
            .await
            .map_err(|e| {
                warn!(target: "cm.services.meeting_client", customer_code = %self.customer, error = %e, "Provider request failed");
                CmError::ProviderTransient(format!("create request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(self.failure(response, "create").await);
        }

        let created: CreateEventResponse = response.json().await.map_err(|e| {
            error!(target: "cm.services.meeting_client", customer_code = %self.customer, error = %e, "Failed to parse create response");
            CmError::ProviderTerminal(format!("unreadable create response: {e}"))
        })?;

        let join_url = created
            .online_meeting
            .and_then(|m| m.join_url)
            .or(created.web_link)
            .ok_or_else(|| {
                error!(
                    target: "cm.services.meeting_client",
                    customer_code = %self.customer,
                    meeting_id = %created.id,
                    "Provider created a meeting without a join link"
                );
                CmError::ProviderTerminal(format!("meeting {} has no join link", created.id))
            })?;

        Ok(MeetingDetails {
            meeting_id: created.id,
            join_url,
            organizer: Some(request.organizer.clone()),
        })
    }

    async fn send_cancel(&self, meeting: &MeetingDetails) -> Result<(), CmError> {
        let organizer = meeting
            .organizer
            .as_deref()
            .or(self.default_organizer.as_deref())
            .ok_or_else(|| {
                CmError::ProviderTerminal(format!(
                    "no organizer mailbox known for meeting {}",
                    meeting.meeting_id
                ))
            })?;

        let url = self.endpoint(&["users", organizer, "events", meeting.meeting_id.as_str(), "cancel"])?;
        let bearer = self.bearer().await?;

        let response = self
            .client
            .post(url)
            .header("Authorization", bearer)
            .json(&CancelEventRequest {
                comment: "This change meeting has been cancelled.",
            })
            .send()
            .await
            .map_err(|e| {
                warn!(target: "cm.services.meeting_client", customer_code = %self.customer, error = %e, "Provider request failed");
                CmError::ProviderTransient(format!("cancel request failed: {e}"))
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.failure(response, "cancel").await)
        }
    }
}

#[async_trait::async_trait]
impl MeetingProvider for HttpMeetingClient {
    #[instrument(skip_all, fields(customer_code = %self.customer, recipients = request.recipients.len()))]
    async fn create_meeting(&self, request: &MeetingRequest) -> Result<MeetingDetails, CmError> {
        let started = Instant::now();
        let result = self.send_create(request).await;
        metrics::record_provider_request("create", result.as_ref().err(), started.elapsed());
        result
    }

    #[instrument(skip_all, fields(customer_code = %self.customer, meeting_id = %meeting.meeting_id))]
    async fn cancel_meeting(&self, meeting: &MeetingDetails) -> Result<(), CmError> {
        let started = Instant::now();
        let result = self.send_cancel(meeting).await;
        metrics::record_provider_request("cancel", result.as_ref().err(), started.elapsed());
        result
    }
}

/// Mock meeting provider for testing.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock provider with scripted failures and call recording.
    pub struct MockMeetingProvider {
        /// Errors returned (in order) before calls start succeeding.
        create_failures: Mutex<VecDeque<CmError>>,
        cancel_failures: Mutex<VecDeque<CmError>>,
        /// Returned on every call once scripted failures are used up.
        permanent_error: Option<CmError>,
        delay: Option<Duration>,
        create_calls: AtomicUsize,
        cancel_calls: AtomicUsize,
        requests: Mutex<Vec<MeetingRequest>>,
        cancelled: Mutex<Vec<String>>,
    }

    impl MockMeetingProvider {
        /// Create a mock that always succeeds.
        pub fn succeeding() -> Self {
            Self {
                create_failures: Mutex::new(VecDeque::new()),
                cancel_failures: Mutex::new(VecDeque::new()),
                permanent_error: None,
                delay: None,
                create_calls: AtomicUsize::new(0),
                cancel_calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                cancelled: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock whose every call fails with `error`.
        pub fn failing(error: CmError) -> Self {
            Self {
                permanent_error: Some(error),
                ..Self::succeeding()
            }
        }

        /// Create a mock whose create calls fail with `errors` first.
        pub fn with_create_failures(errors: Vec<CmError>) -> Self {
            Self {
                create_failures: Mutex::new(errors.into()),
                ..Self::succeeding()
            }
        }

        /// Create a mock whose cancel calls fail with `errors` first.
        pub fn with_cancel_failures(errors: Vec<CmError>) -> Self {
            Self {
                cancel_failures: Mutex::new(errors.into()),
                ..Self::succeeding()
            }
        }

        /// Delay every call (for timeout tests).
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Number of create calls made.
        pub fn create_calls(&self) -> usize {
            self.create_calls.load(Ordering::SeqCst)
        }

        /// Number of cancel calls made.
        pub fn cancel_calls(&self) -> usize {
            self.cancel_calls.load(Ordering::SeqCst)
        }

        /// Requests received by successful or failed create calls.
        pub fn requests(&self) -> Vec<MeetingRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }

        /// Meeting ids successfully cancelled.
        pub fn cancelled(&self) -> Vec<String> {
            self.cancelled.lock().map(|c| c.clone()).unwrap_or_default()
        }

        fn next_failure(&self, queue: &Mutex<VecDeque<CmError>>) -> Option<CmError> {
            let scripted = queue.lock().ok().and_then(|mut q| q.pop_front());
            scripted.or_else(|| self.permanent_error.clone())
        }
    }

    #[async_trait::async_trait]
    impl MeetingProvider for MockMeetingProvider {
        async fn create_meeting(
            &self,
            request: &MeetingRequest,
        ) -> Result<MeetingDetails, CmError> {
            let count = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = self.next_failure(&self.create_failures) {
                return Err(error);
            }

            let meeting_id = format!("meeting-{count}");
            Ok(MeetingDetails {
                join_url: format!("https://meet.example.com/{meeting_id}"),
                meeting_id,
                organizer: Some(request.organizer.clone()),
            })
        }

        async fn cancel_meeting(&self, meeting: &MeetingDetails) -> Result<(), CmError> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = self.next_failure(&self.cancel_failures) {
                return Err(error);
            }
            if let Ok(mut cancelled) = self.cancelled.lock() {
                cancelled.push(meeting.meeting_id.clone());
            }
            Ok(())
        }
    }
}
