use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `-v`.
pub fn setup_logging(verbosity: u8) {
    let default_directive = match verbosity {
        0 => "warn",
        1 => "routine=info,routine_core=info",
        2 => "routine=debug,routine_core=debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A subscriber may already be installed when running under a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
