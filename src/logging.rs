#![forbid(unsafe_code)]
//! Tracing subscriber setup for binaries embedding the index log.

use tracing_subscriber::{fmt, EnvFilter};

use crate::types::{IndexLogError, Result};

/// Installs a formatting subscriber filtered by `level` (an `EnvFilter`
/// directive such as `info` or `sombra_indexlog=trace`). Output goes to stderr.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|_| IndexLogError::Invalid("invalid log filter directive"))?,
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| IndexLogError::Invalid("logging already initialized"))
}
