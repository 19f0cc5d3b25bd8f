//! Refresh-token exchange and merge into an updated record.
//!
//! Runs only when the freshness policy says the access token is stale. No
//! retries happen here: one exchange per resolution, and a failure goes back
//! to the caller. Concurrent refreshes of the same grant are allowed by the
//! provider; whichever write lands last in the store wins.

use crate::config::ClientCredentials;
use crate::credentials::{iso_timestamp, CredentialRecord, DEFAULT_TOKEN_TYPE};
use crate::oauth::exchange::{self, IssuedToken};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

/// Refresh `record`'s access token and return the merged record.
pub async fn refresh_record(
    http_client: &reqwest::Client,
    token_url: &str,
    client: &ClientCredentials<'_>,
    record: &CredentialRecord,
    now: DateTime<Utc>,
) -> Result<CredentialRecord> {
    let refresh_token = record
        .usable_refresh_token()
        .ok_or_else(|| anyhow!("Record has no refresh token"))?;

    let issued = exchange::refresh_grant(http_client, token_url, client, refresh_token).await?;
    Ok(merge(record, issued, now))
}

/// Fold a token response into the stored record.
///
/// - `refresh_token` is kept unless the provider rotated it
/// - `access_token` and `expiry_date` are replaced
/// - `scope` / `token_type` are replaced when the response carries them
/// - `created_at` is preserved, or set to `now` if the record lacked it
pub fn merge(record: &CredentialRecord, issued: IssuedToken, now: DateTime<Utc>) -> CredentialRecord {
    let expiry_date = issued.expiry_date(now);

    CredentialRecord {
        refresh_token: issued.refresh_token.or_else(|| record.refresh_token.clone()),
        access_token: Some(issued.access_token),
        expiry_date: Some(expiry_date),
        scope: issued.scope.or_else(|| record.scope.clone()),
        token_type: issued
            .token_type
            .or_else(|| Some(record.token_type.clone()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
        created_at: record
            .created_at
            .clone()
            .or_else(|| Some(iso_timestamp(now))),
    }
}
