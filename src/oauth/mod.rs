//! OAuth 2.0 consent flow that creates credential records.
//!
//! Implements the authorization code flow:
//! 1. Handler asks for [`ConsentFlow::authorization_url`] and redirects the user
//! 2. User authorizes on Google's consent screen
//! 3. Google redirects to the connection's callback with `code` and `state`
//! 4. Handler calls [`ConsentFlow::complete_consent`], which exchanges the code
//!    and writes the initial record under `<connection>:<state>`
//!
//! From then on the record is maintained by [`crate::token::TokenResolver`].

pub mod exchange;
pub mod provider;

use crate::config::GrantlineConfig;
use crate::credentials::{iso_timestamp, Connection, CredentialRecord, KvStore, DEFAULT_TOKEN_TYPE};
use crate::error::{ConfigError, ConsentError, ResolveError};
use chrono::Utc;
use tracing::{debug, error, info};

/// Builds consent URLs and completes consent callbacks.
#[derive(Clone)]
pub struct ConsentFlow {
    config: GrantlineConfig,
    http_client: reqwest::Client,
}

impl ConsentFlow {
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

    fn redirect_uri(&self, connection: Connection) -> Result<&str, ConfigError> {
        let (value, name) = match connection {
            Connection::Gmail => (&self.config.google.gmail_redirect_uri, "GOOGLE_REDIRECT_URI"),
            Connection::Drive => (
                &self.config.google.drive_redirect_uri,
                "GOOGLE_DRIVE_REDIRECT_URI",
            ),
        };
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(name))
    }

    /// Consent URL for `user_id`, who is carried through as `state`.
    pub fn authorization_url(
        &self,
        connection: Connection,
        user_id: &str,
    ) -> Result<String, ResolveError> {
        let client_id = self
            .config
            .google
            .client_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("GOOGLE_CLIENT_ID"))?;
        let redirect_uri = self.redirect_uri(connection)?;

        debug!(connection = %connection, "Building consent URL");

        Ok(provider::build_auth_url(
            &self.config.google.auth_url,
            client_id,
            redirect_uri,
            connection,
            user_id,
        ))
    }

    /// Exchanges the callback's authorization code and stores the grant.
    ///
    /// # Arguments
    /// * `connection` - Connection the callback belongs to
    /// * `code` - Authorization code from the callback
    /// * `state` - The user id passed to [`Self::authorization_url`]
    ///
    /// # Returns
    /// * `Ok(CredentialRecord)` - The record that was written
    /// * `Err` - Missing config or state, rejected exchange, or failed write
    pub async fn complete_consent(
        &self,
        connection: Connection,
        code: &str,
        state: &str,
    ) -> Result<CredentialRecord, ConsentError> {
        let client = self.config.google.client_credentials()?;
        let redirect_uri = self.redirect_uri(connection)?;
        let store = KvStore::from_config(&self.config.store, self.http_client.clone())?;

        if state.is_empty() {
            return Err(ConsentError::MissingState);
        }

        let issued = exchange::authorization_code_grant(
            &self.http_client,
            &self.config.google.token_url,
            &client,
            code,
            redirect_uri,
        )
        .await
        .map_err(|e| {
            let message = format!("{:#}", e);
            error!(connection = %connection, error = %message, "Authorization code exchange failed");
            ConsentError::ExchangeFailed(message)
        })?;

        let now = Utc::now();
        let record = CredentialRecord {
            expiry_date: Some(issued.expiry_date(now)),
            refresh_token: issued.refresh_token,
            access_token: Some(issued.access_token),
            scope: issued.scope,
            token_type: issued
                .token_type
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            created_at: Some(iso_timestamp(now)),
        };

        let key = connection.store_key(state);
        store.put(&key, &record).await.map_err(|e| {
            let message = format!("{:#}", e);
            error!(connection = %connection, error = %message, "Failed to store credentials");
            ConsentError::StoreWriteFailed(message)
        })?;

        info!(
            connection = %connection,
            has_refresh_token = record.is_usable(),
            "OAuth consent completed"
        );

        Ok(record)
    }
}
