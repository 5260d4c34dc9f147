//! Common utilities and types shared across change-portal components.

#![warn(clippy::pedantic)]

/// Module for identifier types (customer codes, change ids)
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for per-tenant OAuth 2.0 token acquisition
pub mod token_manager;
