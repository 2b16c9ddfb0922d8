use tracing_subscriber::EnvFilter;

/// Install a plain fmt subscriber writing to stderr.
///
/// The filter is taken from `RUST_LOG` when set, `debug` otherwise.
/// Calling this more than once is harmless; later calls are no-ops.
pub fn install_fmt_log() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
