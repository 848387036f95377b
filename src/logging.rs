use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "scrubline=info";

/// Installs a fmt subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; only the first call wins.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
