use tracing_subscriber::{EnvFilter, fmt};

pub fn init_logging() {
    init_logging_with(crate::utils::consts::LOG_LEVEL);
}

/// Same as [`init_logging`] but with a caller supplied default level,
/// used by `--verbose` and `--quiet` on the command line.
pub fn init_logging_with(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(crate::utils::consts::LOG_LEVEL));

    // try_init: integration tests may initialise more than once
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();
}
