//! Error types used throughout the application

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stage of a sync or clear run that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStage {
    List,
    Create,
    Update,
    Delete,
    DeleteInstance,
    Store,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::DeleteInstance => "delete-instance",
            Self::Store => "store",
        };
        f.write_str(label)
    }
}

/// Typed failure returned by a calendar backend.
///
/// `NotFound` is kept apart from every other failure so the sync engine can
/// detect stale references without inspecting messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("rate limited by calendar API: {0}")]
    RateLimited(String),

    #[error("calendar API rejected credentials: {0}")]
    Unauthorized(String),

    #[error("calendar API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("calendar API request failed: {0}")]
    Transport(String),

    #[error("failed to decode calendar API response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether this failure means the addressed resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Main error type for calmirror
#[derive(Error, Debug)]
pub enum CalMirrorError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Stale recurring reference: {0}")]
    StaleReference(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{stage} failed for {subject}: {source}")]
    Stage {
        stage: SyncStage,
        /// What was being worked on, e.g. `event abc123` or `calendar primary`
        subject: String,
        #[source]
        source: Box<CalMirrorError>,
    },
}

impl CalMirrorError {
    /// Wrap `self` with the stage and subject that failed.
    ///
    /// Cancellation and already-wrapped errors pass through untouched.
    #[must_use]
    pub fn at_stage(self, stage: SyncStage, subject: impl Into<String>) -> Self {
        match self {
            Self::Cancelled | Self::Stage { .. } => self,
            other => Self::Stage { stage, subject: subject.into(), source: Box::new(other) },
        }
    }

    /// Returns true if the run was aborted by the caller.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Stage { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Returns true for failures that should be reported as usage or
    /// configuration mistakes.
    pub fn is_config(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Stage { source, .. } => source.is_config(),
            _ => false,
        }
    }

    /// Stage that failed, if the error carries one.
    pub fn stage(&self) -> Option<SyncStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias for calmirror operations
pub type Result<T> = std::result::Result<T, CalMirrorError>;
