//! Logging for `urna-audit`.
//!
//! Log lines go to `stderr` so they never mix with reports written to
//! `stdout`. `RUST_LOG` overrides the configured level (see
//! [`EnvFilter`][`tracing_subscriber::EnvFilter`]).

use tracing_subscriber::{prelude::*, util::SubscriberInitExt};

use crate::config::Config;

/// Installs error reporting and the log subscriber. Call this before doing
/// anything that may log.
pub(crate) fn setup(config: &Config) -> color_eyre::Result<()> {
    color_eyre::install()?;
    let stderr_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(
                    format!(
                        "{}={}",
                        env!("CARGO_PKG_NAME").replace('-', "_"),
                        config.log_level
                    )
                    .parse()?,
                )
                .from_env_lossy(),
        )
        .with(stderr_log)
        .init();
    Ok(())
}
