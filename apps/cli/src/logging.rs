use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Sets up diagnostic logging on stderr.
///
/// `RUST_LOG` controls the filter; without it only warnings are shown, or
/// everything down to debug when `verbose` is set.
pub fn setup_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }

    tracing::debug!(verbose, "logging initialized");
}
