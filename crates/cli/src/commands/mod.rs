//! Subcommand implementations
//!
//! Each command writes its human-readable result to the supplied writer.

pub mod auth;
pub mod clear;
pub mod list;
pub mod sync;

use calmirror_domain::CalMirrorError;

pub(crate) fn write_failed(e: std::io::Error) -> CalMirrorError {
    CalMirrorError::Internal(format!("failed to write output: {e}"))
}
