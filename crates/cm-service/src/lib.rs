//! Change-management (CM) meeting service library.
//!
//! Multi-tenant meeting orchestration for the change-management portal:
//!
//! - Creates one calendar meeting per customer targeted by a change
//! - Writes meeting identifiers back into per-customer and archive records
//! - Cancels those meetings and clears the records once cancelled
//!
//! # Architecture
//!
//! The service follows the CLI -> Service -> Repository pattern:
//!
//! ```text
//! main.rs -> services/orchestrator.rs -> services/{credentials,meeting_client}.rs
//!                                     -> repositories/metadata_store.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error taxonomy with retry/critical classification
//! - `models` - Change records, outcomes and batch results
//! - `observability` - Metrics and critical-failure reporting
//! - `repositories` - Metadata store
//! - `services` - Credential resolution, provider client, orchestrator

pub mod config;
pub mod errors;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
