//! OAuth access token lifecycle.
//!
//! - [`freshness`] - pure reuse/refresh decision
//! - [`refresh`] - refresh-token exchange and record merge
//! - [`TokenResolver`] - the orchestrating entry point handlers call

pub mod freshness;
pub mod refresh;
mod resolver;

pub use freshness::{evaluate, Freshness, SAFETY_MARGIN_MS};
pub use resolver::{ResolvedToken, TokenResolver};
