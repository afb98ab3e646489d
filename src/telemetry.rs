//! Tracing subscriber setup.
//!
//! Log level comes from `RUST_LOG` (default `info`); `[log].format` picks
//! human-readable or JSON lines. Logs go to stderr so `vocab list --json`
//! output on stdout stays machine-readable.

use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::LogConfig;

/// Installs the global subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(format = %config.format, "tracing initialized");
    }
}
