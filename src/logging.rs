use tracing_subscriber::EnvFilter;
use crate::errors::ClientError;

/// Filter directive for a verbosity count: 0 → info, 1 → debug, more → trace.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber for an embedding application.
///
/// `RUST_LOG` takes precedence over `verbosity`. Fails if a subscriber is
/// already installed.
pub fn init_logging(verbosity: u8, json: bool, ansi: bool) -> Result<(), ClientError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if json {
        builder.json().with_ansi(false).try_init()
    } else {
        builder.with_ansi(ansi).try_init()
    };
    result.map_err(|e| ClientError::Config(format!("Failed to initialize logging: {}", e)))
}
