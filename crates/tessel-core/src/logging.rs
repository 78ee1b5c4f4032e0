//! `tracing` subscriber bootstrap.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global fmt subscriber. `RUST_LOG` overrides the default filter.
///
/// Panics if a global subscriber is already installed; use [`try_init`] when
/// that can happen (tests, embedding).
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Like [`init`] but tolerates an already installed subscriber.
pub fn try_init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init()
        .is_ok()
}
