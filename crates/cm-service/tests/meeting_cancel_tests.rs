//! Multi-customer meeting cancellation tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

mod support;

use anyhow::Result;
use cm_service::errors::CmError;
use cm_service::models::{MeetingDetails, MetadataRef, OutcomeAction};
use cm_service::services::credentials::mock::MockCredentialResolver;
use cm_service::services::meeting_client::mock::MockMeetingProvider;
use std::sync::Arc;
use support::*;

/// Create meetings for `customers` so there is something to cancel.
async fn scheduled(harness: &Harness, customers: &[&str]) -> Result<()> {
    let record = change_record(customers);
    let batch = harness
        .orchestrator
        .create_multi_customer_meeting_invite(invite(inline(&record), false, false))
        .await?;
    assert_eq!(batch.successful, customers.len());
    Ok(())
}

#[tokio::test]
async fn test_cancel_clears_customer_and_archive() -> Result<()> {
    let (resolver, providers) = resolver_for(&["hts"]);
    let harness = Harness::new(resolver);
    scheduled(&harness, &["hts"]).await?;
    let meeting_id = harness.customer_copy("hts").await.unwrap().meeting_id.unwrap();

    let batch = harness
        .orchestrator
        .cancel_multi_customer_meeting(Vec::new(), MetadataRef::Stored(change_id()))
        .await?;

    assert_eq!((batch.total, batch.successful, batch.failed), (1, 1, 0));
    assert_eq!(batch.results[0].action, OutcomeAction::Cancelled);
    assert_eq!(batch.results[0].meeting_id.as_deref(), Some(meeting_id.as_str()));
    assert_eq!(providers[0].cancelled(), vec![meeting_id]);

    let copy = harness.customer_copy("hts").await.unwrap();
    assert!(copy.meeting_id.is_none() && copy.join_url.is_none());
    assert!(copy.meeting_organizer.is_none());

    let archive = harness.archive().await.unwrap();
    assert!(archive.meeting().is_none());
    assert!(archive.has_consistent_meeting_pair());
    assert!(archive.customer_meetings.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_cancel_keeps_meeting_id() -> Result<()> {
    let provider = Arc::new(MockMeetingProvider::with_cancel_failures(vec![
        CmError::ProviderTerminal("404 Not Found".into()),
    ]));
    let harness =
        Harness::new(MockCredentialResolver::new().with_provider(code("hts"), provider.clone()));
    scheduled(&harness, &["hts"]).await?;
    let before = harness.customer_copy("hts").await.unwrap();
    let archive_before = harness.archive().await.unwrap();

    let batch = harness
        .orchestrator
        .cancel_multi_customer_meeting(vec![code("hts")], MetadataRef::Stored(change_id()))
        .await?;

    assert_eq!(batch.failed, 1);
    assert_eq!(batch.results[0].error_code.as_deref(), Some("PROVIDER_TERMINAL"));
    assert_eq!(provider.cancel_calls(), 1);

    let after = harness.customer_copy("hts").await.unwrap();
    assert_eq!(after.meeting_id, before.meeting_id);
    assert_eq!(after.join_url, before.join_url);
    assert_eq!(harness.archive().await.unwrap(), archive_before);
    Ok(())
}

#[tokio::test]
async fn test_cancel_without_meeting_is_not_scheduled() -> Result<()> {
    let (resolver, providers) = resolver_for(&["hts"]);
    let harness = Harness::new(resolver);
    let record = change_record(&["hts"]);
    harness.store.insert(&archive_location(), &record).await;

    let batch = harness
        .orchestrator
        .cancel_multi_customer_meeting(Vec::new(), MetadataRef::Stored(change_id()))
        .await?;

    assert_eq!(batch.successful, 1);
    assert_eq!(batch.results[0].action, OutcomeAction::NotScheduled);
    assert_eq!(providers[0].cancel_calls(), 0);
    assert_eq!(harness.store.write_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_cancel_finds_meeting_through_archive() -> Result<()> {
    let (resolver, providers) = resolver_for(&["hts"]);
    let harness = Harness::new(resolver);

    // Archive knows the meeting but the customer copy was never written.
    let mut archive = change_record(&["hts"]);
    archive.record_customer_meeting(
        &code("hts"),
        &MeetingDetails {
            meeting_id: "m-archived".to_string(),
            join_url: "https://meet.example.com/m-archived".to_string(),
            organizer: Some(SENDER.to_string()),
        },
    );
    harness.store.insert(&archive_location(), &archive).await;

    let batch = harness
        .orchestrator
        .cancel_multi_customer_meeting(Vec::new(), inline(&change_record(&["hts"])))
        .await?;

    assert_eq!(batch.results[0].action, OutcomeAction::Cancelled);
    assert_eq!(providers[0].cancelled(), vec!["m-archived".to_string()]);
    assert!(harness.archive().await.unwrap().customer_meetings.is_empty());
    assert!(harness.customer_copy("hts").await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_partial_cancel_keeps_remaining_meeting_on_archive() -> Result<()> {
    let failing = Arc::new(MockMeetingProvider::with_cancel_failures(vec![
        CmError::ProviderTerminal("403 Forbidden".into()),
    ]));
    let resolver = MockCredentialResolver::new()
        .with_provider(code("hts"), Arc::new(MockMeetingProvider::succeeding()))
        .with_provider(code("htsnonprod"), failing);
    let harness = Harness::new(resolver);
    scheduled(&harness, &["hts", "htsnonprod"]).await?;
    let remaining = harness.customer_copy("htsnonprod").await.unwrap().meeting().unwrap();

    let batch = harness
        .orchestrator
        .cancel_multi_customer_meeting(Vec::new(), MetadataRef::Stored(change_id()))
        .await?;

    assert_eq!((batch.successful, batch.failed), (1, 1));

    let archive = harness.archive().await.unwrap();
    assert!(archive.has_consistent_meeting_pair());
    assert_eq!(archive.customer_meetings.len(), 1);
    assert_eq!(archive.meeting_id.as_deref(), Some(remaining.meeting_id.as_str()));
    assert!(harness.customer_copy("hts").await.unwrap().meeting_id.is_none());
    Ok(())
}

#[tokio::test]
async fn test_cancel_transient_failure_is_retried() -> Result<()> {
    let provider = Arc::new(MockMeetingProvider::with_cancel_failures(vec![
        CmError::ProviderTransient("503".into()),
    ]));
    let harness =
        Harness::new(MockCredentialResolver::new().with_provider(code("hts"), provider.clone()));
    scheduled(&harness, &["hts"]).await?;

    let batch = harness
        .orchestrator
        .cancel_multi_customer_meeting(Vec::new(), MetadataRef::Stored(change_id()))
        .await?;

    assert_eq!(batch.successful, 1);
    assert_eq!(provider.cancel_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_cancel_store_failure_is_critical() -> Result<()> {
    let (resolver, providers) = resolver_for(&["hts"]);
    let harness = Harness::new(resolver);
    scheduled(&harness, &["hts"]).await?;
    harness.store.fail_all_writes();

    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let batch = harness
        .orchestrator
        .cancel_multi_customer_meeting(Vec::new(), MetadataRef::Stored(change_id()))
        .await?;

    assert!(matches!(batch.critical(), Some(CmError::StoreWrite { .. })));
    assert_eq!(batch.results[0].error_code.as_deref(), Some("STORE_WRITE_ERROR"));
    assert_eq!(providers[0].cancel_calls(), 1);
    assert!(logs.contents().contains("CRITICAL"));
    Ok(())
}
