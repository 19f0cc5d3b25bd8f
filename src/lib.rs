//! OAuth token lifecycle for handlers acting on a user's Google data.
//!
//! Handlers call [`TokenResolver::resolve_access_token`] with a connection and
//! a user id and get back a bearer token, refreshed and persisted when needed.

// Typed failures at the crate boundary
pub mod error;

// Environment / TOML configuration
pub mod config;

// Credential records and the key-value store client
pub mod credentials;

// Freshness policy, refresh protocol and resolver
pub mod token;

// Consent URL and authorization code exchange
pub mod oauth;

// Tracing subscriber setup
pub mod telemetry;

pub use config::GrantlineConfig;
pub use credentials::{Connection, CredentialRecord, KvStore};
pub use error::{ConfigError, ConsentError, ErrorKind, ResolveError};
pub use oauth::ConsentFlow;
pub use token::{ResolvedToken, TokenResolver};
