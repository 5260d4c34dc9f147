//! Change-management service configuration.
//!
//! Configuration is loaded from environment variables. Tenant secrets live
//! in the credentials file, never in the environment.

use crate::services::credentials::ProviderEndpoints;
use crate::services::meeting_client::{RetryPolicy, DEFAULT_PROVIDER_TIMEOUT_SECS};
use crate::services::orchestrator::{OrchestratorSettings, DEFAULT_MAX_CONCURRENCY};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default calendar API base URL.
pub const DEFAULT_MEETING_API_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default token endpoint; `{tenant}` is replaced per customer.
pub const DEFAULT_TOKEN_URL_TEMPLATE: &str =
    "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token";

/// Default per-customer deadline in seconds.
pub const DEFAULT_CUSTOMER_TIMEOUT_SECONDS: u64 = 60;

/// Default number of retries for transient provider failures.
pub const DEFAULT_PROVIDER_MAX_RETRIES: u32 = 3;

/// Change-management service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the metadata object store.
    pub store_root: PathBuf,

    /// JSON file mapping customer codes to tenant credentials.
    pub credentials_file: PathBuf,

    /// Calendar API base URL.
    pub meeting_api_url: String,

    /// Token endpoint template containing `{tenant}`.
    pub token_url_template: String,

    /// Customers processed concurrently (default: 8).
    pub max_concurrent_customers: usize,

    /// Deadline for one customer's provider phase (default: 60).
    pub customer_timeout_seconds: u64,

    /// Retries for transient provider failures (default: 3).
    pub provider_max_retries: u32,

    /// Timeout of a single provider HTTP request (default: 15).
    pub provider_timeout_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

fn parse_number<T>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
    allow_zero: bool,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: T = value_str.trim().parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("must be a non-negative integer, got '{value_str}': {e}"),
    })?;

    if !allow_zero && value == T::default() {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    Ok(value)
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let store_root = PathBuf::from(required(vars, "CM_STORE_ROOT")?);
        let credentials_file = PathBuf::from(required(vars, "CM_CREDENTIALS_FILE")?);

        let meeting_api_url = vars
            .get("CM_MEETING_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_MEETING_API_URL.to_string());

        let token_url_template = vars
            .get("CM_TOKEN_URL_TEMPLATE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOKEN_URL_TEMPLATE.to_string());
        if !token_url_template.contains("{tenant}") {
            return Err(ConfigError::InvalidValue {
                name: "CM_TOKEN_URL_TEMPLATE".to_string(),
                reason: "must contain the {tenant} placeholder".to_string(),
            });
        }

        let max_concurrent_customers = parse_number(
            vars,
            "CM_MAX_CONCURRENT_CUSTOMERS",
            DEFAULT_MAX_CONCURRENCY,
            false,
        )?;
        let customer_timeout_seconds = parse_number(
            vars,
            "CM_CUSTOMER_TIMEOUT_SECONDS",
            DEFAULT_CUSTOMER_TIMEOUT_SECONDS,
            false,
        )?;
        let provider_max_retries = parse_number(
            vars,
            "CM_PROVIDER_MAX_RETRIES",
            DEFAULT_PROVIDER_MAX_RETRIES,
            true,
        )?;
        let provider_timeout_seconds = parse_number(
            vars,
            "CM_PROVIDER_TIMEOUT_SECONDS",
            DEFAULT_PROVIDER_TIMEOUT_SECS,
            false,
        )?;

        Ok(Config {
            store_root,
            credentials_file,
            meeting_api_url,
            token_url_template,
            max_concurrent_customers,
            customer_timeout_seconds,
            provider_max_retries,
            provider_timeout_seconds,
        })
    }

    /// Orchestrator tuning derived from this configuration.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_concurrency: self.max_concurrent_customers,
            customer_timeout: Duration::from_secs(self.customer_timeout_seconds),
            retry: RetryPolicy::with_max_retries(self.provider_max_retries),
        }
    }

    /// Provider endpoints derived from this configuration.
    pub fn provider_endpoints(&self) -> ProviderEndpoints {
        ProviderEndpoints {
            meeting_api_url: self.meeting_api_url.clone(),
            token_url_template: self.token_url_template.clone(),
            request_timeout: Duration::from_secs(self.provider_timeout_seconds),
        }
    }
}
