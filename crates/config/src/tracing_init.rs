use tracing_subscriber::{fmt, EnvFilter};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the tracing subscriber with env-based filtering.
///
/// Reads `RUST_LOG` (or `LOG_LEVEL`) to set the filter.
/// Falls back to `default_level` if neither is set.
pub fn init_tracing(default_level: &str) {
    fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .init();
}

/// Same as [`init_tracing`] but tolerates an already-installed global
/// subscriber. Returns `true` when this call installed it.
pub fn try_init_tracing(default_level: &str) -> bool {
    fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .try_init()
        .is_ok()
}
