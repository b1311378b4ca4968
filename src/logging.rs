use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use hoard_config::{LogConfig, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log to stderr; stdout carries command output. `RUST_LOG` overrides the
/// configured level.
pub fn init(config: &LogConfig) -> Result<()> {
    let level = config.level_filter().or_raise(|| ErrorKind::Config)?;
    let filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Human => registry.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init(),
    }
    .or_raise(|| ErrorKind::Logging)
}
