//! Shared fixtures for orchestrator integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use chrono::{TimeZone, Utc};
use cm_service::models::{ChangeRecord, MetadataRef};
use cm_service::repositories::metadata_store::mock::InMemoryMetadataStore;
use cm_service::repositories::StoreLocation;
use cm_service::services::credentials::mock::MockCredentialResolver;
use cm_service::services::meeting_client::mock::MockMeetingProvider;
use cm_service::services::orchestrator::{
    CreateInviteRequest, MeetingOrchestrator, OrchestratorSettings,
};
use cm_service::services::RetryPolicy;
use common::types::{ChangeId, CustomerCode};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SENDER: &str = "changes@portal.example.com";

pub fn code(raw: &str) -> CustomerCode {
    CustomerCode::parse(raw).unwrap()
}

pub fn change_id() -> ChangeId {
    ChangeId::parse("CHG-20260501120000-abcd1234").unwrap()
}

/// A schedulable change targeting `customers`.
pub fn change_record(customers: &[&str]) -> ChangeRecord {
    let mut record = ChangeRecord::new(change_id());
    record.title = "Database failover".to_string();
    record.description = "Planned failover of the primary cluster".to_string();
    record.customers = customers.iter().map(|c| code(c)).collect();
    record.meeting_start = Some(Utc.with_ymd_and_hms(2026, 5, 1, 14, 0, 0).unwrap());
    record.meeting_end = Some(Utc.with_ymd_and_hms(2026, 5, 1, 15, 0, 0).unwrap());
    record.timezone = "America/New_York".to_string();
    record.attendees = vec!["cab@portal.example.com".to_string()];
    record
}

pub fn archive_location() -> StoreLocation {
    StoreLocation::Archive(change_id())
}

pub fn customer_location(customer: &str) -> StoreLocation {
    StoreLocation::Customer(code(customer), change_id())
}

/// Retries without real backoff and a generous deadline.
pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        max_concurrency: 4,
        customer_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        },
    }
}

pub fn invite(metadata: MetadataRef, dry_run: bool, force_update: bool) -> CreateInviteRequest {
    CreateInviteRequest {
        customer_codes: Vec::new(),
        topic_name: "Change Review".to_string(),
        metadata,
        sender: SENDER.to_string(),
        dry_run,
        force_update,
    }
}

pub fn inline(record: &ChangeRecord) -> MetadataRef {
    MetadataRef::Inline(Box::new(record.clone()))
}

/// Orchestrator wired to in-memory collaborators.
pub struct Harness {
    pub store: Arc<InMemoryMetadataStore>,
    pub resolver: Arc<MockCredentialResolver>,
    pub orchestrator: MeetingOrchestrator,
}

impl Harness {
    pub fn new(resolver: MockCredentialResolver) -> Self {
        Self::with_settings(resolver, fast_settings())
    }

    pub fn with_settings(resolver: MockCredentialResolver, settings: OrchestratorSettings) -> Self {
        let store = Arc::new(InMemoryMetadataStore::new());
        let resolver = Arc::new(resolver);
        let orchestrator = MeetingOrchestrator::new(resolver.clone(), store.clone(), settings);
        Self {
            store,
            resolver,
            orchestrator,
        }
    }

    /// Seed a customer copy with its own recipient list.
    pub async fn seed_customer(&self, record: &ChangeRecord, customer: &str, attendees: &[&str]) {
        let mut copy = record.clone();
        copy.attendees = attendees.iter().map(|a| (*a).to_string()).collect();
        self.store.insert(&customer_location(customer), &copy).await;
    }

    pub async fn customer_copy(&self, customer: &str) -> Option<ChangeRecord> {
        self.store.get(&customer_location(customer)).await
    }

    pub async fn archive(&self) -> Option<ChangeRecord> {
        self.store.get(&archive_location()).await
    }
}

/// Resolver with one succeeding mock provider per customer.
pub fn resolver_for(customers: &[&str]) -> (MockCredentialResolver, Vec<Arc<MockMeetingProvider>>) {
    let mut resolver = MockCredentialResolver::new();
    let mut providers = Vec::new();
    for customer in customers {
        let provider = Arc::new(MockMeetingProvider::succeeding());
        resolver = resolver.with_provider(code(customer), provider.clone());
        providers.push(provider);
    }
    (resolver, providers)
}

/// Log sink for asserting on emitted log lines.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Install as the thread's default subscriber.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
