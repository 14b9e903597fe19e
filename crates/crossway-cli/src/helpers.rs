//! Shared helper functions used across CLI subcommands.

use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

/// Initialize the tracing subscriber with the given default log level.
///
/// `RUST_LOG` wins when set.  Logs go to stderr so `--json` output on stdout
/// stays machine-readable.
pub fn init_tracing(default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}
