//! Structured logging infrastructure for MarineLink.
//!
//! Log level is configured via the `RUST_LOG` environment variable and
//! defaults to `info`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the logging system with human-readable output.
///
/// # Example
/// ```no_run
/// use marinelink_core::logging;
///
/// logging::init();
/// tracing::info!("Application started");
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize the logging system with JSON output for log aggregation.
///
/// # Example
/// ```no_run
/// use marinelink_core::logging;
///
/// logging::init_json();
/// tracing::info!(service = "marinelink-api", "Service started");
/// ```
pub fn init_json() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize logging in the configured format.
pub fn init_with(format: LogFormat) {
    match format {
        LogFormat::Pretty => init(),
        LogFormat::Json => init_json(),
    }
}
