//! Change-management meeting CLI.
//!
//! Entry point invoked by the upload backend. Prints the batch response as
//! JSON on stdout, including when a write-back failed; logs go to stderr.

use clap::{Args, Parser, Subcommand};
use cm_service::config::Config;
use cm_service::errors::CmError;
use cm_service::models::{BatchResult, ChangeRecord, MetadataRef};
use cm_service::observability;
use cm_service::repositories::{FileMetadataStore, MetadataStore};
use cm_service::services::orchestrator::{
    CreateInviteRequest, LegacyInviteRequest, MeetingOrchestrator,
};
use cm_service::services::{CredentialResolver, StaticCredentialResolver};
use common::types::{ChangeId, CustomerCode};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cm-service", version, about = "Change-management meeting orchestration")]
struct Cli {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Create a meeting for every customer named in the change metadata.
    CreateMultiCustomerMeetingInvite(InviteArgs),

    /// Deprecated single-customer form of create-multi-customer-meeting-invite.
    CreateMeetingInvite {
        #[command(flatten)]
        invite: InviteArgs,

        /// Customer used when the metadata names none.
        #[arg(long)]
        customer_code: CustomerCode,
    },

    /// Cancel the meetings recorded for a change.
    CancelMultiCustomerMeeting {
        /// Metadata file path or change id.
        #[arg(long)]
        json_metadata: String,

        /// Limit cancellation to these customers.
        #[arg(long = "customer-code")]
        customer_codes: Vec<CustomerCode>,
    },
}

#[derive(Args)]
struct InviteArgs {
    #[arg(long)]
    topic_name: String,

    /// Metadata file path or change id.
    #[arg(long)]
    json_metadata: String,

    /// Mailbox the meetings are created in.
    #[arg(long)]
    sender_email: String,

    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    force_update: bool,
}

/// Interpret `--json-metadata`: an existing file holds an inline record,
/// otherwise the value must be a stored change id.
fn metadata_ref(arg: &str) -> Result<MetadataRef, CmError> {
    let path = Path::new(arg);
    if path.is_file() {
        let raw = std::fs::read(path).map_err(|e| CmError::NotFound(format!("{arg}: {e}")))?;
        let record: ChangeRecord =
            serde_json::from_slice(&raw).map_err(|e| CmError::Malformed {
                location: arg.to_string(),
                reason: e.to_string(),
            })?;
        return Ok(MetadataRef::Inline(Box::new(record)));
    }

    arg.parse::<ChangeId>()
        .map(MetadataRef::Stored)
        .map_err(|_| CmError::NotFound(format!("{arg} is neither a metadata file nor a change id")))
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cm_service=info,common=info".into());
    let json = std::env::var("CM_LOG_JSON").is_ok_and(|v| v.eq_ignore_ascii_case("true"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(action: Action, config: &Config) -> Result<(ChangeId, BatchResult), CmError> {
    let store: Arc<dyn MetadataStore> = Arc::new(
        FileMetadataStore::new(config.store_root.clone()).inspect_err(|e| {
            observability::report_critical(e, None);
        })?,
    );
    let resolver: Arc<dyn CredentialResolver> = Arc::new(
        StaticCredentialResolver::from_file(&config.credentials_file, &config.provider_endpoints())
            .inspect_err(observability::report_resolver_init_failure)?,
    );
    let orchestrator = MeetingOrchestrator::new(resolver, store, config.orchestrator_settings());

    match action {
        Action::CreateMultiCustomerMeetingInvite(args) => {
            let metadata = metadata_ref(&args.json_metadata)?;
            let change_id = metadata.change_id().clone();
            let batch = orchestrator
                .create_multi_customer_meeting_invite(CreateInviteRequest {
                    customer_codes: Vec::new(),
                    topic_name: args.topic_name,
                    metadata,
                    sender: args.sender_email,
                    dry_run: args.dry_run,
                    force_update: args.force_update,
                })
                .await?;
            Ok((change_id, batch))
        }
        Action::CreateMeetingInvite {
            invite,
            customer_code,
        } => {
            let metadata = metadata_ref(&invite.json_metadata)?;
            let change_id = metadata.change_id().clone();
            #[allow(deprecated)]
            let batch = orchestrator
                .create_meeting_invite(LegacyInviteRequest {
                    customer_code,
                    topic_name: invite.topic_name,
                    metadata,
                    sender: invite.sender_email,
                    dry_run: invite.dry_run,
                    force_update: invite.force_update,
                })
                .await?;
            Ok((change_id, batch))
        }
        Action::CancelMultiCustomerMeeting {
            json_metadata,
            customer_codes,
        } => {
            let metadata = metadata_ref(&json_metadata)?;
            let change_id = metadata.change_id().clone();
            let batch = orchestrator
                .cancel_multi_customer_meeting(customer_codes, metadata)
                .await?;
            Ok((change_id, batch))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(target: "cm.main", error = %e, "Failed to load configuration");
            return ExitCode::from(2);
        }
    };

    info!(
        target: "cm.main",
        store_root = %config.store_root.display(),
        max_concurrent_customers = config.max_concurrent_customers,
        customer_timeout_seconds = config.customer_timeout_seconds,
        "Configuration loaded successfully"
    );

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("cm_run", run_id = %run_id);

    match run(cli.action, &config).instrument(span).await {
        Ok((change_id, batch)) => {
            let response = batch.to_response(&change_id);
            match serde_json::to_string_pretty(&response) {
                Ok(body) => println!("{body}"),
                Err(e) => {
                    error!(target: "cm.main", error = %e, "Failed to render response");
                    return ExitCode::FAILURE;
                }
            }
            if let Some(critical) = batch.critical() {
                error!(
                    target: "cm.main",
                    error_code = critical.error_code(),
                    error = %critical,
                    "Batch completed with a critical store failure"
                );
                return exit_code(critical);
            }
            if response.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!(
                target: "cm.main",
                error_code = e.error_code(),
                error = %e,
                "Operation failed"
            );
            exit_code(&e)
        }
    }
}

fn exit_code(error: &CmError) -> ExitCode {
    ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1))
}
