//! Identifier types shared by change-portal components.
//!
//! Both identifiers end up as storage path segments, so they are validated
//! on construction and can never contain separators or traversal sequences.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of a normalized customer code.
pub const MAX_CUSTOMER_CODE_LENGTH: usize = 32;

/// Prefix of every change identifier.
pub const CHANGE_ID_PREFIX: &str = "CHG-";

/// Length of the random suffix of generated change identifiers.
const CHANGE_ID_SUFFIX_LENGTH: usize = 8;

/// Alphabet used for the random change id suffix.
const CHANGE_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Errors raised when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Customer code is empty, too long or contains disallowed characters.
    #[error("Invalid customer code '{0}'")]
    InvalidCustomerCode(String),

    /// Change id does not follow the `CHG-<timestamp>-<random>` format.
    #[error("Invalid change id '{0}'")]
    InvalidChangeId(String),
}

/// Short identifier naming a tenant.
///
/// Normalized to lower case with surrounding whitespace removed. Only
/// ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CustomerCode(String);

impl CustomerCode {
    /// Parse and normalize a customer code.
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError::InvalidCustomerCode` if the normalized value
    /// is empty, longer than [`MAX_CUSTOMER_CODE_LENGTH`], or contains a
    /// character outside `[a-z0-9_-]`.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let normalized = raw.trim().to_ascii_lowercase();

        let valid = !normalized.is_empty()
            && normalized.len() <= MAX_CUSTOMER_CODE_LENGTH
            && normalized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(normalized))
        } else {
            Err(IdentifierError::InvalidCustomerCode(raw.to_string()))
        }
    }

    /// Returns the normalized code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CustomerCode {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for CustomerCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Globally unique change identifier (`CHG-<timestamp>-<random>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    /// Generate a new change id from the current time.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Generate a change id for a given timestamp.
    #[must_use]
    pub fn generate_at(now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..CHANGE_ID_SUFFIX_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..CHANGE_ID_ALPHABET.len());
                CHANGE_ID_ALPHABET.get(idx).copied().map_or('0', char::from)
            })
            .collect();
        Self(format!(
            "{CHANGE_ID_PREFIX}{}-{suffix}",
            now.format("%Y%m%d%H%M%S")
        ))
    }

    /// Parse a change id.
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError::InvalidChangeId` unless the value has the
    /// `CHG-` prefix followed by a numeric timestamp, a `-`, and a non-empty
    /// alphanumeric suffix.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let raw = raw.trim();
        let invalid = || IdentifierError::InvalidChangeId(raw.to_string());

        let rest = raw.strip_prefix(CHANGE_ID_PREFIX).ok_or_else(invalid)?;
        let (timestamp, suffix) = rest.split_once('-').ok_or_else(invalid)?;

        if timestamp.is_empty() || !timestamp.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }

        Ok(Self(raw.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChangeId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for ChangeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
