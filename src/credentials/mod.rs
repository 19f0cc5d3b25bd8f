//! Stored OAuth grants and the key-value store that holds them.
//!
//! One [`CredentialRecord`] exists per `(connection, user_id)` pair. Records
//! live in an external key-value service reached over HTTP; this process only
//! ever holds a transient copy for the duration of one call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       TokenResolver / ConsentFlow        │
//! └─────────────────────────────────────────┘
//!          ↓ put                ↑ get
//! ┌─────────────────────────────────────────┐
//! │       KvStore                            │
//! │  - key = "<connection>:<user_id>"        │
//! │  - soft reads, bearer-authenticated      │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       Key-value REST API                 │
//! │  - GET  /get/<key>                       │
//! │  - POST /set/<key>                       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use grantline::credentials::{Connection, KvStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = KvStore::new(reqwest::Client::new(), "https://kv.example.com", "kv_token");
//! let key = Connection::Gmail.store_key("ana@example.com");
//!
//! if let Some(record) = store.get(&key).await {
//!     println!("usable grant: {}", record.is_usable());
//! }
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

mod store;

pub use store::KvStore;

/// Token scheme assumed when neither the record nor the provider names one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// A named OAuth grant purpose. Each is tracked as a separate record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    Gmail,
    Drive,
}

impl Connection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connection::Gmail => "gmail",
            Connection::Drive => "drive",
        }
    }

    /// Store key for this connection's record of `user_id`.
    ///
    /// `user_id` is opaque; it is not validated or normalized here.
    pub fn store_key(&self, user_id: &str) -> String {
        format!("{}:{}", self.as_str(), user_id)
    }

    /// Scopes requested on the consent screen.
    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Connection::Gmail => &[
                "https://www.googleapis.com/auth/gmail.send",
                "https://www.googleapis.com/auth/gmail.readonly",
            ],
            Connection::Drive => &["https://www.googleapis.com/auth/drive.readonly"],
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Connection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gmail" => Ok(Connection::Gmail),
            "drive" => Ok(Connection::Drive),
            other => Err(format!("unknown connection '{}'", other)),
        }
    }
}

/// A stored OAuth grant.
///
/// Field names on the wire are snake_case (`refresh_token`, `expiry_date`, ...)
/// to match the records already held by the store.
///
/// # Invariants
/// - Usable only when `refresh_token` is present and non-empty
/// - Records written by this crate carry `access_token` and `expiry_date`
///   together, with `expiry_date` in the future at write time
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Long-lived secret used to mint new access tokens
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Short-lived bearer credential
    #[serde(default)]
    pub access_token: Option<String>,

    /// Epoch milliseconds after which `access_token` must not be trusted
    #[serde(default, deserialize_with = "deserialize_epoch_millis")]
    pub expiry_date: Option<i64>,

    /// Space-delimited granted scopes (informational)
    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default = "default_token_type", deserialize_with = "deserialize_token_type")]
    pub token_type: String,

    /// ISO-8601 creation time, preserved across refreshes
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

impl CredentialRecord {
    /// A record holding only a refresh token (never exchanged).
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: Some(refresh_token.into()),
            access_token: None,
            expiry_date: None,
            scope: None,
            token_type: default_token_type(),
            created_at: None,
        }
    }

    /// Refresh token, if present and non-empty.
    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_usable(&self) -> bool {
        self.usable_refresh_token().is_some()
    }

    /// Access token, if present and non-empty.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }
}

// Secrets stay out of logs.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("has_refresh_token", &self.is_usable())
            .field("has_access_token", &self.access_token().is_some())
            .field("expiry_date", &self.expiry_date)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// ISO-8601 timestamp in the format stored in `created_at`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts integer or float millis; anything else reads as absent.
fn deserialize_epoch_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))))
}

/// `null` or missing token types fall back to Bearer.
fn deserialize_token_type<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .filter(|t| !t.is_empty())
        .unwrap_or_else(default_token_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_store_key() {
        assert_eq!(Connection::Gmail.store_key("ana@example.com"), "gmail:ana@example.com");
        assert_eq!(Connection::Drive.store_key("u1"), "drive:u1");
    }

    #[test]
    fn test_connection_from_str() {
        assert_eq!("gmail".parse::<Connection>(), Ok(Connection::Gmail));
        assert_eq!("drive".parse::<Connection>(), Ok(Connection::Drive));
        assert!("pipedrive".parse::<Connection>().is_err());
        assert!("".parse::<Connection>().is_err());
    }

    #[test]
    fn test_record_deserialization_full() {
        let json = r#"{
            "refresh_token": "1//0e.refresh",
            "access_token": "ya29.access",
            "scope": "https://www.googleapis.com/auth/gmail.readonly",
            "token_type": "Bearer",
            "expiry_date": 1760000000000,
            "created_at": "2025-10-09T08:53:20.000Z"
        }"#;

        let record: CredentialRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.usable_refresh_token(), Some("1//0e.refresh"));
        assert_eq!(record.access_token(), Some("ya29.access"));
        assert_eq!(record.expiry_date, Some(1_760_000_000_000));
        assert_eq!(record.created_at.as_deref(), Some("2025-10-09T08:53:20.000Z"));
    }

    #[test]
    fn test_record_deserialization_lenient() {
        // Shape written by the raw drive callback: provider payload, no expiry_date
        let json = r#"{
            "access_token": "ya29.access",
            "expires_in": 3599,
            "refresh_token": "1//0e.refresh",
            "scope": "https://www.googleapis.com/auth/drive.readonly",
            "token_type": null
        }"#;

        let record: CredentialRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_usable());
        assert_eq!(record.expiry_date, None);
        assert_eq!(record.token_type, "Bearer");
        assert_eq!(record.created_at, None);
    }

    #[test]
    fn test_non_numeric_expiry_reads_as_absent() {
        let record: CredentialRecord =
            serde_json::from_str(r#"{"refresh_token":"r","expiry_date":"tomorrow"}"#).unwrap();
        assert_eq!(record.expiry_date, None);

        let record: CredentialRecord =
            serde_json::from_str(r#"{"refresh_token":"r","expiry_date":1760000000000.0}"#).unwrap();
        assert_eq!(record.expiry_date, Some(1_760_000_000_000));
    }

    #[test]
    fn test_usable_requires_non_empty_refresh_token() {
        let record: CredentialRecord =
            serde_json::from_str(r#"{"refresh_token":null,"access_token":"a"}"#).unwrap();
        assert!(!record.is_usable());

        let record = CredentialRecord::from_refresh_token("");
        assert!(!record.is_usable());

        let record = CredentialRecord::from_refresh_token("R");
        assert!(record.is_usable());
        assert_eq!(record.access_token(), None);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let mut record = CredentialRecord::from_refresh_token("super_secret_refresh");
        record.access_token = Some("super_secret_access".to_string());
        let debug = format!("{:?}", record);
        assert!(!debug.contains("super_secret"));
        assert!(debug.contains("has_refresh_token: true"));
    }

    #[test]
    fn test_iso_timestamp_format() {
        let at = Utc.timestamp_millis_opt(1_760_000_000_123).unwrap();
        assert_eq!(iso_timestamp(at), "2025-10-09T08:53:20.123Z");
    }
}
