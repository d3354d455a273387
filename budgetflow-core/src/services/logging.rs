//! Logging setup - tracing subscriber for the CLI and tests
//!
//! Events go to stderr, and optionally to an append-only file. The default
//! level comes from [`LoggingConfig`]; `RUST_LOG` overrides it.
//!
//! Log fields carry ids, counts and collection paths only. Amounts and
//! descriptions are never logged.

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` if a subscriber was already installed, which makes
/// repeated calls (tests, embedding apps) harmless.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter(&config.level));

    let file_log = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(env_filter(&config.level)),
            )
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(stderr_log)
        .with(file_log)
        .try_init()
        .is_ok())
}
