use std::env;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the tracing filter, e.g. `TIDYFOLD_LOG=tidyfold=debug`.
pub const LOG_ENV_VAR: &str = "TIDYFOLD_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Installs the global tracing subscriber, writing diagnostics to stderr.
///
/// Calling it more than once is harmless; later calls leave the first subscriber in place.
pub fn init_logging() {
    let filter = env::var(LOG_ENV_VAR).unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    let filter_layer = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter_layer)
        .try_init();
}
