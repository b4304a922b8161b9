//! Tracing setup for the bridge
//!
//! Call `init_tracing` once, early in `main`, before any other logging occurs.

/// Initialize structured logging.
///
/// `debug` selects verbosity: `true` enables `debug`-level output (the `-d`
/// CLI flag), `false` restricts to `warn` and above.
pub fn init_tracing(debug: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = if debug { "debug" } else { "warn" };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_file(false)
                .compact(),
        )
        .with(tracing_subscriber::EnvFilter::new(level))
        .try_init();
}
