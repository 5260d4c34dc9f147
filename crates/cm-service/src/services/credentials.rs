//! Per-customer credential resolution.
//!
//! Each customer maps to its own tenant application registration. The
//! resolver hands out a meeting provider bound to that tenant; clients are
//! never shared between customers, so a rejected or throttled tenant cannot
//! affect another.

use crate::errors::CmError;
use crate::services::meeting_client::{HttpMeetingClient, MeetingProvider};
use common::secret::SecretString;
use common::token_manager::{TokenSource, TokenSourceConfig};
use common::types::CustomerCode;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Placeholder replaced with the tenant id in the token URL template.
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Resolves a customer code to a provider bound to that customer's tenant.
#[async_trait::async_trait]
pub trait CredentialResolver: Send + Sync {
    /// # Errors
    ///
    /// - `CmError::UnknownCustomer` if no credentials exist for the customer
    /// - `CmError::Credential` if the credentials are unusable
    async fn resolve(&self, customer: &CustomerCode) -> Result<Arc<dyn MeetingProvider>, CmError>;
}

/// One tenant's application registration.
#[derive(Deserialize)]
pub struct CustomerCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Mailbox used to cancel meetings that do not record their organizer.
    #[serde(default)]
    pub organizer: Option<String>,
}

impl std::fmt::Debug for CustomerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("organizer", &self.organizer)
            .finish()
    }
}

/// Endpoints and timeouts shared by every tenant client.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub meeting_api_url: String,
    /// Token URL with a `{tenant}` placeholder.
    pub token_url_template: String,
    pub request_timeout: Duration,
}

impl ProviderEndpoints {
    fn token_url(&self, tenant_id: &str) -> String {
        self.token_url_template.replace(TENANT_PLACEHOLDER, tenant_id)
    }
}

/// Parse a credentials document: a JSON object keyed by customer code.
///
/// # Errors
///
/// Returns `CmError::Malformed` if the document is not a valid map or a key
/// is not a valid customer code.
pub fn parse_credentials(
    source: &str,
    raw: &str,
) -> Result<BTreeMap<CustomerCode, CustomerCredentials>, CmError> {
    serde_json::from_str(raw).map_err(|e| CmError::Malformed {
        location: source.to_string(),
        reason: e.to_string(),
    })
}

/// Resolver over a fixed set of tenant credentials.
///
/// Clients are built once at construction. An entry that cannot be turned
/// into a client fails only that customer's resolution.
pub struct StaticCredentialResolver {
    clients: HashMap<CustomerCode, Result<Arc<dyn MeetingProvider>, CmError>>,
}

impl StaticCredentialResolver {
    /// Build one client per customer.
    pub fn new(
        credentials: BTreeMap<CustomerCode, CustomerCredentials>,
        endpoints: &ProviderEndpoints,
    ) -> Self {
        let clients = credentials
            .into_iter()
            .map(|(customer, creds)| {
                let client = build_client(&customer, creds, endpoints);
                if let Err(e) = &client {
                    warn!(
                        target: "cm.services.credentials",
                        customer_code = %customer,
                        error = %e,
                        "Credentials unusable; customer will fail on resolve"
                    );
                }
                (customer, client)
            })
            .collect::<HashMap<_, _>>();

        info!(
            target: "cm.services.credentials",
            customers = clients.len(),
            "Credential resolver initialized"
        );

        Self { clients }
    }

    /// Load credentials from a JSON file.
    ///
    /// # Errors
    ///
    /// - `CmError::NotFound` if the file cannot be read
    /// - `CmError::Malformed` if its contents are invalid
    pub fn from_file(path: &Path, endpoints: &ProviderEndpoints) -> Result<Self, CmError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CmError::NotFound(format!("credentials file {}: {e}", path.display()))
        })?;
        let credentials = parse_credentials(&path.display().to_string(), &raw)?;
        Ok(Self::new(credentials, endpoints))
    }

    /// Customers with configured credentials.
    pub fn customers(&self) -> Vec<&CustomerCode> {
        let mut customers: Vec<_> = self.clients.keys().collect();
        customers.sort();
        customers
    }
}

fn build_client(
    customer: &CustomerCode,
    creds: CustomerCredentials,
    endpoints: &ProviderEndpoints,
) -> Result<Arc<dyn MeetingProvider>, CmError> {
    let credential_error = |reason: String| CmError::Credential {
        customer: customer.to_string(),
        reason,
    };

    if creds.tenant_id.trim().is_empty() {
        return Err(credential_error("tenant_id is empty".to_string()));
    }
    if creds.client_id.trim().is_empty() {
        return Err(credential_error("client_id is empty".to_string()));
    }

    let token_config = TokenSourceConfig::new(
        endpoints.token_url(&creds.tenant_id),
        creds.client_id,
        creds.client_secret,
    )
    .with_http_timeout(endpoints.request_timeout);
    let tokens = TokenSource::new(token_config).map_err(|e| credential_error(e.to_string()))?;

    let client = HttpMeetingClient::new(
        customer.clone(),
        endpoints.meeting_api_url.clone(),
        tokens,
        creds.organizer,
        endpoints.request_timeout,
    )?;
    Ok(Arc::new(client))
}

#[async_trait::async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, customer: &CustomerCode) -> Result<Arc<dyn MeetingProvider>, CmError> {
        match self.clients.get(customer) {
            Some(Ok(client)) => {
                debug!(target: "cm.services.credentials", customer_code = %customer, "Resolved credentials");
                Ok(Arc::clone(client))
            }
            Some(Err(e)) => Err(e.clone()),
            None => Err(CmError::UnknownCustomer(customer.to_string())),
        }
    }
}

/// Mock resolver for testing.
pub mod mock {
    use super::*;
    use crate::services::meeting_client::mock::MockMeetingProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolver handing out pre-registered mock providers.
    #[derive(Default)]
    pub struct MockCredentialResolver {
        providers: HashMap<CustomerCode, Arc<MockMeetingProvider>>,
        failures: HashMap<CustomerCode, CmError>,
        resolve_calls: AtomicUsize,
    }

    impl MockCredentialResolver {
        /// Create a resolver that knows no customers.
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a provider for a customer.
        pub fn with_provider(
            mut self,
            customer: CustomerCode,
            provider: Arc<MockMeetingProvider>,
        ) -> Self {
            self.providers.insert(customer, provider);
            self
        }

        /// Make resolution fail for a customer.
        pub fn with_failure(mut self, customer: CustomerCode, error: CmError) -> Self {
            self.failures.insert(customer, error);
            self
        }

        /// Number of resolve calls made.
        pub fn resolve_calls(&self) -> usize {
            self.resolve_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CredentialResolver for MockCredentialResolver {
        async fn resolve(
            &self,
            customer: &CustomerCode,
        ) -> Result<Arc<dyn MeetingProvider>, CmError> {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.failures.get(customer) {
                return Err(error.clone());
            }
            match self.providers.get(customer) {
                Some(provider) => Ok(Arc::clone(provider) as Arc<dyn MeetingProvider>),
                None => Err(CmError::UnknownCustomer(customer.to_string())),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn endpoints() -> ProviderEndpoints {
        ProviderEndpoints {
            meeting_api_url: "http://localhost:1/v1.0".to_string(),
            token_url_template: "http://localhost:1/{tenant}/oauth2/v2.0/token".to_string(),
            request_timeout: Duration::from_secs(1),
        }
    }

    fn code(raw: &str) -> CustomerCode {
        CustomerCode::parse(raw).unwrap()
    }

    const CREDENTIALS: &str = r#"{
        "HTS": {
            "tenant_id": "tenant-a",
            "client_id": "client-a",
            "client_secret": "secret-a",
            "organizer": "changes@hts.example.com"
        },
        "htsnonprod": {
            "tenant_id": "",
            "client_id": "client-b",
            "client_secret": "secret-b"
        }
    }"#;

    #[test]
    fn test_token_url_substitutes_tenant() {
        assert_eq!(
            endpoints().token_url("tenant-a"),
            "http://localhost:1/tenant-a/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_parse_credentials_normalizes_codes() {
        let parsed = parse_credentials("inline", CREDENTIALS).unwrap();
        assert!(parsed.contains_key(&code("hts")));
        assert_eq!(
            parsed.get(&code("hts")).unwrap().organizer.as_deref(),
            Some("changes@hts.example.com")
        );
    }

    #[test]
    fn test_parse_credentials_rejects_bad_code() {
        let raw = r#"{"not a code!": {"tenant_id": "t", "client_id": "c", "client_secret": "s"}}"#;
        let err = parse_credentials("inline", raw).unwrap_err();
        assert!(matches!(err, CmError::Malformed { .. }));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let parsed = parse_credentials("inline", CREDENTIALS).unwrap();
        let debug = format!("{:?}", parsed.get(&code("hts")).unwrap());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-a"));
    }

    #[tokio::test]
    async fn test_resolve_known_unknown_and_unusable() {
        let resolver =
            StaticCredentialResolver::new(parse_credentials("inline", CREDENTIALS).unwrap(), &endpoints());

        assert!(resolver.resolve(&code("hts")).await.is_ok());

        let err = resolver.resolve(&code("htsnonprod")).await.err().unwrap();
        assert!(matches!(err, CmError::Credential { ref customer, .. } if customer == "htsnonprod"));

        let err = resolver.resolve(&code("acme")).await.err().unwrap();
        assert!(matches!(err, CmError::UnknownCustomer(ref c) if c == "acme"));

        assert_eq!(resolver.customers(), vec![&code("hts"), &code("htsnonprod")]);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, CREDENTIALS).unwrap();

        let resolver = StaticCredentialResolver::from_file(&path, &endpoints()).unwrap();
        assert_eq!(resolver.customers().len(), 2);

        let missing = StaticCredentialResolver::from_file(&dir.path().join("nope.json"), &endpoints());
        assert!(matches!(missing, Err(CmError::NotFound(_))));
    }
}
