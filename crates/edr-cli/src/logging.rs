use tracing_subscriber::{EnvFilter, fmt};

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins when set. Otherwise only warnings are shown so the
/// progress output stays readable, or everything from debug up with `verbose`.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_line_number(verbose)
        .init();
}

#[cfg(test)]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
