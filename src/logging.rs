use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Initializes the stderr tracing subscriber. The default level follows
/// the -v count; `RUST_LOG` overrides it when set.
pub fn init_logger(verbose: u8) -> Result<()> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))
}
