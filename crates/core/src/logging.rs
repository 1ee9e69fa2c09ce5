//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when neither `RUST_LOG` nor the config supplies one.
pub const DEFAULT_FILTER: &str = "info,jvsc=debug";

/// Initialize the logging system with tracing.
///
/// `RUST_LOG` wins when set; otherwise [`DEFAULT_FILTER`] applies.
///
/// # Example
/// ```no_run
/// jvsc_core::init_logging();
/// tracing::info!("engine starting");
/// ```
pub fn init_logging() {
    init_logging_with_filter(DEFAULT_FILTER);
}

/// Initialize logging with an explicit fallback filter directive.
///
/// `RUST_LOG` still takes precedence. An unparsable directive falls back to
/// [`DEFAULT_FILTER`]. Calling this twice is harmless; the second call is a no-op.
pub fn init_logging_with_filter(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
