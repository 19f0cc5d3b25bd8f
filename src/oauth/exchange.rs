//! OAuth token endpoint calls.
//!
//! Both grant types Google supports here (authorization code and refresh
//! token) post a form to the same endpoint and return the same JSON shape.

use crate::config::ClientCredentials;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};
use tracing::debug;

/// Lifetime assumed when the provider omits `expires_in`.
///
/// Deliberately below Google's usual 3600 seconds.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3500;

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug, Default)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// A validated token endpoint response.
///
/// Only constructed when the provider actually returned an access token.
#[derive(Clone, PartialEq)]
pub struct IssuedToken {
    pub access_token: String,
    /// Present only when the provider issued (or rotated) one
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl IssuedToken {
    /// Absolute expiry in epoch millis, relative to `now`.
    ///
    /// Non-positive lifetimes, and lifetimes too large to land on a
    /// representable date, are treated like a missing one so the written
    /// expiry is always in the future.
    pub fn expiry_date(&self, now: DateTime<Utc>) -> i64 {
        self.expires_in
            .filter(|s| *s > 0)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or_else(|| now + Duration::seconds(DEFAULT_EXPIRES_IN_SECS))
            .timestamp_millis()
    }
}

/// Exchange a refresh token for a new access token.
pub async fn refresh_grant(
    http_client: &reqwest::Client,
    token_url: &str,
    client: &ClientCredentials<'_>,
    refresh_token: &str,
) -> Result<IssuedToken> {
    let form = [
        ("client_id", client.client_id),
        ("client_secret", client.client_secret),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];

    debug!("Refreshing access token at {}", token_url);
    request_token(http_client, token_url, &form).await
}

/// Exchange an authorization code from the consent callback for tokens.
pub async fn authorization_code_grant(
    http_client: &reqwest::Client,
    token_url: &str,
    client: &ClientCredentials<'_>,
    code: &str,
    redirect_uri: &str,
) -> Result<IssuedToken> {
    let form = [
        ("client_id", client.client_id),
        ("client_secret", client.client_secret),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];

    debug!("Exchanging authorization code for token at {}", token_url);
    request_token(http_client, token_url, &form).await
}

async fn request_token(
    http_client: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<IssuedToken> {
    let response = http_client
        .post(token_url)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await
        .context("Failed to send token request")?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read token response body")?;

    if !status.is_success() {
        // Google puts the reason (e.g. invalid_grant) in the JSON error field
        let reason = serde_json::from_str::<TokenResponse>(&body)
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(anyhow!(
            "Token request failed with status {}: {}",
            status,
            reason
        ));
    }

    let parsed: TokenResponse =
        serde_json::from_str(&body).context("Failed to parse token response")?;
    validate(parsed)
}

fn validate(response: TokenResponse) -> Result<IssuedToken> {
    if let Some(error) = response.error {
        let description = response
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(anyhow!("Token endpoint returned {}: {}", error, description));
    }

    let access_token = response
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("Missing access_token in token response"))?;

    debug!(
        has_refresh_token = response.refresh_token.is_some(),
        expires_in = ?response.expires_in,
        "Token request successful"
    );

    Ok(IssuedToken {
        access_token,
        refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
        expires_in: response.expires_in,
        scope: response.scope,
        token_type: response.token_type.filter(|t| !t.is_empty()),
    })
}

/// Only JSON numbers count; strings and nulls read as absent.
fn deserialize_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))))
}
