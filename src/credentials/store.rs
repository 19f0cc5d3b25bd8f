//! Credential storage over a key-value REST API.
//!
//! Records are stored as JSON strings. Reads go through `GET /get/<key>` and
//! come back wrapped as `{"result": "<json>"}` (or `{"result": null}`); writes
//! `POST /set/<key>` with the record as the body and overwrite any prior value.

use super::CredentialRecord;
use crate::config::StoreConfig;
use crate::error::ConfigError;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// `GET /get/<key>` response envelope
#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    result: Option<Value>,
}

/// Thin accessor over the key-value service.
///
/// Cheap to clone: the HTTP client is a shared handle.
#[derive(Clone)]
pub struct KvStore {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
}

impl KvStore {
    /// Creates a store client.
    ///
    /// # Arguments
    /// * `http_client` - Client carrying the per-call timeout
    /// * `base_url` - REST API base URL (trailing slash tolerated)
    /// * `token` - Bearer credential for the store
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
            token: token.into(),
        }
    }

    /// Creates a store client from configuration, failing if the endpoint
    /// or its credential is missing.
    pub fn from_config(
        config: &StoreConfig,
        http_client: reqwest::Client,
    ) -> std::result::Result<Self, ConfigError> {
        let (url, token) = config.endpoint()?;
        Ok(Self::new(http_client, url, token))
    }

    fn url_for(&self, op: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, op, urlencoding::encode(key))
    }

    /// Soft read: any failure is logged and reported as "no credential".
    pub async fn get(&self, key: &str) -> Option<CredentialRecord> {
        match self.try_get(key).await {
            Ok(record) => record,
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(key = %key, error = %message, "Credential store read failed");
                None
            }
        }
    }

    /// Strict read.
    ///
    /// # Returns
    /// * `Ok(Some(record))` - Record found and parsed
    /// * `Ok(None)` - No value at `key`, or the stored value is not a record
    /// * `Err` - Transport failure or non-success status
    pub async fn try_get(&self, key: &str) -> Result<Option<CredentialRecord>> {
        let response = self
            .http_client
            .get(self.url_for("get", key))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to send store read request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Store read failed with status {}", status));
        }

        let body = response
            .text()
            .await
            .context("Failed to read store response body")?;

        Ok(parse_get_body(key, &body))
    }

    /// Serializes `record` and writes it at `key`, replacing any prior value.
    pub async fn put(&self, key: &str, record: &CredentialRecord) -> Result<()> {
        let response = self
            .http_client
            .post(self.url_for("set", key))
            .bearer_auth(&self.token)
            .json(record)
            .send()
            .await
            .context("Failed to send store write request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            anyhow::bail!("Store write failed with status {}: {}", status, body);
        }

        debug!(key = %key, "Credential record written");
        Ok(())
    }
}

/// Unwraps the `result` envelope. Malformed payloads read as absent.
fn parse_get_body(key: &str, body: &str) -> Option<CredentialRecord> {
    let envelope: GetResponse = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(key = %key, error = %e, "Malformed store response envelope");
            return None;
        }
    };

    let parsed = match envelope.result? {
        Value::Null => return None,
        Value::String(raw) => serde_json::from_str::<CredentialRecord>(&raw),
        // Some stores hand back the JSON value itself instead of a string
        other => serde_json::from_value::<CredentialRecord>(other),
    };

    match parsed {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(key = %key, error = %e, "Stored credential record is not valid JSON");
            None
        }
    }
}
