//! Secret types for per-tenant credentials.
//!
//! Re-exports the [`secrecy`] types used for client secrets and bearer
//! tokens. `SecretString` redacts itself in `Debug`, so any struct deriving
//! `Debug` around it (credential maps, provider clients) is safe to log via
//! tracing. The inner value is only reachable through
//! [`ExposeSecret::expose_secret`].
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct TenantCredentials {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let json = r#"{"client_id": "app-123", "client_secret": "s3cr3t"}"#;
//! let creds: TenantCredentials = serde_json::from_str(json).unwrap();
//!
//! assert!(!format!("{creds:?}").contains("s3cr3t"));
//! assert_eq!(creds.client_secret.expose_secret(), "s3cr3t");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
