//! Process-wide tracing setup. Called once, at the very start of `main`,
//! before anything else logs.

use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global tracing subscriber from a filter directive string
/// (e.g. `"settlement_service=debug,tower_http=info"`) and a threshold below
/// which events are dropped entirely rather than merely filtered per-target.
pub fn initialize(log_filter: &str, log_stderr_threshold: LevelFilter) {
    let env_filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_filter(log_stderr_threshold))
        .init();
}

/// Test-only variant that ignores double-initialization, since multiple
/// `#[tokio::test]`s in one binary would otherwise panic on the second call.
pub fn initialize_reentrant(log_filter: &str) {
    let env_filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry().with(env_filter).with(fmt::layer().with_test_writer()).try_init();
}
