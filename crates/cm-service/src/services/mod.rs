//! Service layer.
//!
//! - `credentials` - per-customer credential resolution
//! - `meeting_client` - calendar API client and retry policy
//! - `orchestrator` - multi-customer create/cancel with write-back

pub mod credentials;
pub mod meeting_client;
pub mod orchestrator;

pub use credentials::{CredentialResolver, StaticCredentialResolver};
pub use meeting_client::{HttpMeetingClient, MeetingProvider, RetryPolicy};
pub use orchestrator::{CreateInviteRequest, LegacyInviteRequest, MeetingOrchestrator, OrchestratorSettings};
