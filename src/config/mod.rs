use serde::Deserialize;
use std::time::Duration;

use crate::error::ConfigError;
use crate::oauth::provider::{GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL};

/// Complete grantline configuration.
///
/// Every value is optional at load time. Missing values surface as
/// [`ConfigError`] when an operation needs them, never at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrantlineConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Key-value store endpoint (REST API base URL and bearer token)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

impl StoreConfig {
    /// Returns `(url, token)` or the name of the first missing variable.
    pub fn endpoint(&self) -> Result<(&str, &str), ConfigError> {
        let url = non_empty(&self.url).ok_or(ConfigError::Missing("KV_REST_API_URL"))?;
        let token = non_empty(&self.token).ok_or(ConfigError::Missing("KV_REST_API_TOKEN"))?;
        Ok((url, token))
    }
}

/// Google OAuth client registration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Consent callback for the gmail connection
    pub gmail_redirect_uri: Option<String>,
    /// Consent callback for the drive connection
    pub drive_redirect_uri: Option<String>,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_auth_url() -> String {
    GOOGLE_AUTH_URL.to_string()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            gmail_redirect_uri: None,
            drive_redirect_uri: None,
            token_url: default_token_url(),
            auth_url: default_auth_url(),
        }
    }
}

/// Validated OAuth client identifier and secret.
#[derive(Clone)]
pub struct ClientCredentials<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

impl GoogleConfig {
    pub fn client_credentials(&self) -> Result<ClientCredentials<'_>, ConfigError> {
        let client_id =
            non_empty(&self.client_id).ok_or(ConfigError::Missing("GOOGLE_CLIENT_ID"))?;
        let client_secret =
            non_empty(&self.client_secret).ok_or(ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?;
        Ok(ClientCredentials {
            client_id,
            client_secret,
        })
    }
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Upper bound for each store or token endpoint call (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpConfig {
    /// Builds the shared client used for store and token endpoint calls.
    pub fn build_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }
}

impl GrantlineConfig {
    /// Build from env vars. Unset variables stay `None`.
    ///
    /// Recognized variables: `KV_REST_API_URL`, `KV_REST_API_TOKEN`,
    /// `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URI`,
    /// `GOOGLE_DRIVE_REDIRECT_URI`, `GRANTLINE_TOKEN_URL`, `GRANTLINE_AUTH_URL`,
    /// `GRANTLINE_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        cfg.store.url = lookup("KV_REST_API_URL");
        cfg.store.token = lookup("KV_REST_API_TOKEN");
        cfg.google.client_id = lookup("GOOGLE_CLIENT_ID");
        cfg.google.client_secret = lookup("GOOGLE_CLIENT_SECRET");
        cfg.google.gmail_redirect_uri = lookup("GOOGLE_REDIRECT_URI");
        cfg.google.drive_redirect_uri = lookup("GOOGLE_DRIVE_REDIRECT_URI");

        if let Some(v) = lookup("GRANTLINE_TOKEN_URL") {
            cfg.google.token_url = v;
        }
        if let Some(v) = lookup("GRANTLINE_AUTH_URL") {
            cfg.google.auth_url = v;
        }
        if let Some(v) = lookup("GRANTLINE_HTTP_TIMEOUT_SECS") {
            // Zero reads like an unparsable value
            if let Some(n) = v.parse::<u64>().ok().filter(|n| *n > 0) {
                cfg.http.timeout_secs = n;
            }
        }

        cfg
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> anyhow::Result<GrantlineConfig> {
    use anyhow::Context;

    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let config: GrantlineConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path))?;
    Ok(config)
}

/// Treat unset and empty values alike.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
