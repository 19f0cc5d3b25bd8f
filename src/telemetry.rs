//! Tracing setup for processes hosting the resolver.

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `grantline=info`.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grantline=info".into()),
        )
        .try_init();
}
