//! Logging setup
//!
//! The library only emits `tracing` events; binaries and tests opt into output
//! with [`init_logging`].

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber filtered by `RUST_LOG`, or by
/// `default_filter` when `RUST_LOG` is unset or invalid.
///
/// Safe to call more than once: an already installed global subscriber is kept.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized");
    }
}
