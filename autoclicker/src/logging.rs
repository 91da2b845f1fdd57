//! Console logging for the clicker.
//!
//! Everything the agent reports (purchases, exports, income samples, the
//! final click count) goes through `tracing` and is printed to stderr with a
//! local timestamp.

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "autoclicker=info";
const TIMESTAMP_FORMAT: &str = "%d-%m-%Y, %H:%M:%S";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `autoclicker=info` if unset.
///
/// # Example
/// ```bash
/// RUST_LOG=autoclicker=debug autoclicker simulate
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
                .compact(),
        )
        .init();
}
