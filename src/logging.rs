use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "startup_scout=info,tower_http=info";

/// Installs the global fmt subscriber, filtered by `RUST_LOG` when set.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A subscriber may already be installed (tests, embedding); keep the existing one
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
