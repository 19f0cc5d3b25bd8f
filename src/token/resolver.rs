//! Access token resolution for request handlers.
//!
//! One call walks a fixed sequence and keeps no state between calls:
//!
//! ```text
//! NO_STORE ──(config ok)──▶ LOOKUP ──(usable grant)──▶ EVALUATE
//!    │                        │                          │      │
//!    ▼                        ▼                     REUSABLE  STALE
//! CONFIG_ERROR     STORE_UNAVAILABLE /                   │      │
//!                  NOT_CONNECTED                         ▼      ▼
//!                                                   token   REFRESH ──▶ put (best effort) ──▶ token
//!                                                              │
//!                                                              ▼
//!                                                        REFRESH_FAILED
//! ```

use super::freshness::{evaluate, Freshness};
use super::refresh;
use crate::config::GrantlineConfig;
use crate::credentials::{Connection, KvStore};
use crate::error::{ConfigError, ResolveError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// A usable access token handed back to the caller.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedToken {
    pub access_token: String,
    #[serde(skip)]
    pub token_type: String,
}

impl ResolvedToken {
    /// Value for the downstream `Authorization` header, e.g. `Bearer ya29...`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// The entry point each API handler calls to obtain a bearer token.
///
/// Cheap to clone and safe to share between concurrent handlers; it holds
/// only configuration and an HTTP client handle.
#[derive(Clone)]
pub struct TokenResolver {
    config: GrantlineConfig,
    http_client: reqwest::Client,
}

impl TokenResolver {
    /// Creates a resolver whose outbound calls are bounded by
    /// `config.http.timeout_secs`.
    pub fn new(config: GrantlineConfig) -> Result<Self, ConfigError> {
        let http_client = config.http.build_client()?;
        Ok(Self::with_http_client(config, http_client))
    }

    pub fn with_http_client(config: GrantlineConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Resolve a usable access token for `user_id` on `connection`.
    pub async fn resolve_access_token(
        &self,
        connection: Connection,
        user_id: &str,
    ) -> Result<ResolvedToken, ResolveError> {
        self.resolve_at(connection, user_id, Utc::now()).await
    }

    /// Same as [`Self::resolve_access_token`] with an explicit clock reading.
    pub async fn resolve_at(
        &self,
        connection: Connection,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ResolvedToken, ResolveError> {
        // NO_STORE
        let store = KvStore::from_config(&self.config.store, self.http_client.clone())?;
        let client = self.config.google.client_credentials()?;

        // LOOKUP
        let key = connection.store_key(user_id);
        let record = match store.try_get(&key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(connection = %connection, user_id = %user_id, "No credential record");
                return Err(ResolveError::NotConnected);
            }
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(
                    connection = %connection,
                    user_id = %user_id,
                    error = %message,
                    "Credential store read failed"
                );
                return Err(ResolveError::StoreUnavailable(message));
            }
        };

        if !record.is_usable() {
            debug!(connection = %connection, user_id = %user_id, "Record has no refresh token");
            return Err(ResolveError::NotConnected);
        }

        // EVALUATE
        if let (Freshness::Reusable, Some(access_token)) =
            (evaluate(&record, now.timestamp_millis()), record.access_token())
        {
            debug!(connection = %connection, user_id = %user_id, "Reusing cached access token");
            return Ok(ResolvedToken {
                access_token: access_token.to_string(),
                token_type: record.token_type.clone(),
            });
        }

        // REFRESH
        let updated = refresh::refresh_record(
            &self.http_client,
            &self.config.google.token_url,
            &client,
            &record,
            now,
        )
        .await
        .map_err(|e| {
            let message = format!("{:#}", e);
            warn!(
                connection = %connection,
                user_id = %user_id,
                error = %message,
                "Token refresh failed"
            );
            ResolveError::RefreshFailed(message)
        })?;

        // Best effort: the next stale evaluation refreshes again if this is lost
        if let Err(e) = store.put(&key, &updated).await {
            let message = format!("{:#}", e);
            warn!(
                connection = %connection,
                user_id = %user_id,
                error = %message,
                "Failed to persist refreshed credentials"
            );
        }

        let rotated = updated.refresh_token != record.refresh_token;
        info!(
            connection = %connection,
            user_id = %user_id,
            rotated,
            "Access token refreshed"
        );

        match updated.access_token {
            Some(access_token) => Ok(ResolvedToken {
                access_token,
                token_type: updated.token_type,
            }),
            None => Err(ResolveError::RefreshFailed(
                "Merged record has no access token".to_string(),
            )),
        }
    }

    /// Whether a usable grant is on file. Soft: store failures read as `false`.
    pub async fn is_connected(&self, connection: Connection, user_id: &str) -> bool {
        let store = match KvStore::from_config(&self.config.store, self.http_client.clone()) {
            Ok(store) => store,
            Err(_) => return false,
        };

        store
            .get(&connection.store_key(user_id))
            .await
            .map(|record| record.is_usable())
            .unwrap_or(false)
    }
}
