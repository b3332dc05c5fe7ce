//! `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,stash_resources=debug";

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over [`DEFAULT_FILTER`]. Panics if a global
/// subscriber is already installed.
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(env_filter(DEFAULT_FILTER)).init();
}

/// Install a global fmt subscriber with an explicit fallback filter.
pub fn init_with_filter(filter: &str) {
    tracing_subscriber::fmt().with_env_filter(env_filter(filter)).init();
}

/// Install a subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("trace"))
        .with_test_writer()
        .try_init();
}

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}
