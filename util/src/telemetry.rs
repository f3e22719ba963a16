//! Telemetry bootstrap for the node
//!
//! All components log through the `tracing` facade; this module installs the
//! process-wide subscriber.

use tracing_subscriber::EnvFilter;

/// The default filter directive applied when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "info";

/// Configure the global tracing subscriber
///
/// Respects `RUST_LOG` when set; `verbose` lowers the default level to debug
pub fn configure_telemetry(verbose: bool) {
    let default_filter = if verbose { "debug" } else { DEFAULT_LOG_FILTER };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
