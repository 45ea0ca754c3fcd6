//! Tracing subscriber setup
//!
//! Logs go to stderr so stdout stays free for command output. The filter is
//! read from `RUST_LOG`, defaulting to `info`.

use calmirror_domain::CalMirrorError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogFormat;

/// Install the global subscriber.
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let registry = tracing_subscriber::registry().with(filter_layer);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(std::io::stderr).json().with_current_span(true))
            .try_init()?,
    }

    Ok(())
}

/// Stable label for an error, used in the final log line.
pub fn error_label(error: &CalMirrorError) -> &'static str {
    match error {
        CalMirrorError::Database(_) => "database",
        CalMirrorError::Config(_) => "config",
        CalMirrorError::Network(_) => "network",
        CalMirrorError::Auth(_) => "auth",
        CalMirrorError::NotFound(_) => "not_found",
        CalMirrorError::StaleReference(_) => "stale_reference",
        CalMirrorError::Backend(_) => "backend",
        CalMirrorError::Cancelled => "cancelled",
        CalMirrorError::InvalidInput(_) => "invalid_input",
        CalMirrorError::Internal(_) => "internal",
        CalMirrorError::Stage { source, .. } => error_label(source),
    }
}
