//! Logging bootstrap for the firmware

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG` when set, defaults to `info` otherwise. Panics if a
/// subscriber is already installed; use [`try_init`] from tests.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Like [`init`], but does nothing if a subscriber is already installed.
pub fn try_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
