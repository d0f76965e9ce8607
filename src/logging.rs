//! Diagnostic logging setup for the `metalock` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. This is the one the CLI uses.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the filter directives.
pub const LOG_ENV_VAR: &str = "METALOCK_LOG";

/// Level used when `METALOCK_LOG` is unset or unparseable.
pub const DEFAULT_LEVEL: &str = "warn";

/// Build the filter from `METALOCK_LOG`, falling back to `warn`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Install a stderr subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
