//! Structured JSON logging shared by the batch utilities.
//!
//! `RUST_LOG` takes precedence over the configured level. Key material must
//! never appear in any log field.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber writing JSON lines to stderr.
///
/// Stderr keeps stdout free for tools that write payloads there.
///
/// # Errors
///
/// Returns an error if a subscriber has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise tracing subscriber: {e}"))
}
