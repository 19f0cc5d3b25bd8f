//! Typed failures returned at the crate boundary.
//!
//! Internal steps (store I/O, token endpoint calls) work with `anyhow::Result`
//! and attach context as they go. The resolver and the consent flow turn those
//! into the enums below so request handlers can branch on the failure kind
//! without string matching.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A required configuration value is missing or unusable.
///
/// This is an operator problem, not a credential-state problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Stable, serializable failure classification for handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ConfigError,
    NotConnected,
    RefreshFailed,
    StoreUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigError => "CONFIG_ERROR",
            ErrorKind::NotConnected => "NOT_CONNECTED",
            ErrorKind::RefreshFailed => "REFRESH_FAILED",
            ErrorKind::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an access token could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Store endpoint/credential or OAuth client credentials are missing.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No record, or a record without a refresh token.
    #[error("no OAuth grant on file for this connection")]
    NotConnected,

    /// The identity provider rejected the refresh exchange, or it could not be reached.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The store read failed before a freshness decision could be made.
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::Config(_) => ErrorKind::ConfigError,
            ResolveError::NotConnected => ErrorKind::NotConnected,
            ResolveError::RefreshFailed(_) => ErrorKind::RefreshFailed,
            ResolveError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// True when the end user should be sent back through OAuth consent.
    ///
    /// Every failure except a configuration error fails closed this way.
    pub fn requires_consent(&self) -> bool {
        !matches!(self, ResolveError::Config(_))
    }
}

/// Why the consent callback could not produce a stored grant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsentError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The callback carried no `state`, so the grant has no user to belong to.
    #[error("missing state parameter in consent callback")]
    MissingState,

    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("failed to store credentials: {0}")]
    StoreWriteFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(ResolveError::NotConnected.kind().as_str(), "NOT_CONNECTED");
        assert_eq!(
            ResolveError::Config(ConfigError::Missing("KV_REST_API_URL"))
                .kind()
                .to_string(),
            "CONFIG_ERROR"
        );
        assert_eq!(
            ResolveError::RefreshFailed("invalid_grant".to_string()).kind(),
            ErrorKind::RefreshFailed
        );
        assert_eq!(
            ResolveError::StoreUnavailable("timeout".to_string()).kind(),
            ErrorKind::StoreUnavailable
        );
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::StoreUnavailable).unwrap();
        assert_eq!(json, "\"STORE_UNAVAILABLE\"");
    }

    #[test]
    fn test_requires_consent() {
        assert!(ResolveError::NotConnected.requires_consent());
        assert!(ResolveError::RefreshFailed("x".to_string()).requires_consent());
        assert!(ResolveError::StoreUnavailable("x".to_string()).requires_consent());
        assert!(!ResolveError::Config(ConfigError::Missing("GOOGLE_CLIENT_ID")).requires_consent());
    }

    #[test]
    fn test_config_error_message_names_variable() {
        let err = ResolveError::from(ConfigError::Missing("KV_REST_API_TOKEN"));
        assert!(err.to_string().contains("KV_REST_API_TOKEN"));
    }
}
