//! Tracing setup for binaries and tests.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "blocking_queue=info,producer_consumer=info";

/// Installs a fmt subscriber filtered by `RUST_LOG`.
///
/// Falls back to `info` for this crate when `RUST_LOG` is unset. Calling it
/// more than once is harmless; only the first subscriber is kept.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}
