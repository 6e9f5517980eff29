//! Logging setup using tracing
//!
//! Human-readable output by default, JSON lines when requested. `RUST_LOG`
//! takes precedence over the filter passed on the command line.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// # Arguments
///
/// * `filter` - Fallback filter directive (e.g., "info,dashfeed=debug")
/// * `json` - Emit one JSON object per event instead of plain text
pub fn init_logging(filter: &str, json: bool) {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|e| {
            eprintln!("Invalid log filter '{filter}': {e}, falling back to 'info'");
            EnvFilter::new("info")
        });

    let registry = tracing_subscriber::registry().with(filter_layer);
    let result = if json {
        registry
            .with(fmt::layer().json().with_target(true).flatten_event(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {e}");
    }
}

/// Initialize logging for tests (with simpler output).
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
