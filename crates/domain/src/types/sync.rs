//! Sync model: event identities, correlation records and run requests.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_VISIBILITY;
use crate::errors::{CalMirrorError, Result};

const KEY_SEPARATOR: char = '\u{1f}';

/// Addresses one event within one calendar of one account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventIdentity {
    pub account_email: String,
    pub calendar_id: String,
    pub event_id: String,
}

impl EventIdentity {
    pub fn new(
        account_email: impl Into<String>,
        calendar_id: impl Into<String>,
        event_id: impl Into<String>,
    ) -> Self {
        Self {
            account_email: account_email.into(),
            calendar_id: calendar_id.into(),
            event_id: event_id.into(),
        }
    }
}

/// Persisted mapping between a source event and the destination event that
/// mirrors it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub src: EventIdentity,
    pub dst: EventIdentity,
}

impl CorrelationRecord {
    pub fn new(src: EventIdentity, dst: EventIdentity) -> Self {
        Self { src, dst }
    }

    /// Store key of this record.
    pub fn key(&self) -> String {
        correlation_key(&self.src, &self.dst.account_email, &self.dst.calendar_id)
    }
}

/// Composite store key for a source event mirrored into one destination
/// calendar.
///
/// Components are joined with the ASCII unit separator so no two distinct
/// tuples share a key.
pub fn correlation_key(src: &EventIdentity, dst_account: &str, dst_calendar: &str) -> String {
    [
        src.account_email.as_str(),
        src.calendar_id.as_str(),
        dst_account,
        dst_calendar,
        src.event_id.as_str(),
    ]
    .join(&KEY_SEPARATOR.to_string())
}

/// Controls which optional fields the event mapper copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingOptions {
    pub copy_description: bool,
    pub copy_location: bool,
    pub copy_color: bool,
    /// Replaces every mirrored summary when non-empty.
    pub title_override: Option<String>,
    /// Visibility written on every destination event.
    pub visibility: String,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            copy_description: false,
            copy_location: false,
            copy_color: false,
            title_override: None,
            visibility: DEFAULT_VISIBILITY.to_string(),
        }
    }
}

/// Parameters of one sync run. Immutable for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub src_account_email: String,
    pub src_calendar_id: String,
    pub dst_account_email: String,
    pub dst_calendar_id: String,
    /// Only consider source events updated within this window before now.
    pub update_watermark: Option<Duration>,
    /// Only consider source events ending after this instant.
    pub start_after: Option<DateTime<Utc>>,
    pub include_tentative: bool,
    pub include_not_going: bool,
    pub include_not_responded: bool,
    pub include_out_of_office: bool,
    /// Regex matched against event titles; matches are excluded.
    pub exclude_title_pattern: Option<String>,
    pub mapping: MappingOptions,
}

impl SyncRequest {
    /// Request with every filter at its default (all optional events excluded).
    pub fn new(
        src_account_email: impl Into<String>,
        src_calendar_id: impl Into<String>,
        dst_account_email: impl Into<String>,
        dst_calendar_id: impl Into<String>,
    ) -> Self {
        Self {
            src_account_email: src_account_email.into(),
            src_calendar_id: src_calendar_id.into(),
            dst_account_email: dst_account_email.into(),
            dst_calendar_id: dst_calendar_id.into(),
            update_watermark: None,
            start_after: None,
            include_tentative: false,
            include_not_going: false,
            include_not_responded: false,
            include_out_of_office: false,
            exclude_title_pattern: None,
            mapping: MappingOptions::default(),
        }
    }

    /// Identity of a source event under this request.
    pub fn source_identity(&self, event_id: impl Into<String>) -> EventIdentity {
        EventIdentity::new(&self.src_account_email, &self.src_calendar_id, event_id)
    }

    /// Identity of a destination event under this request.
    pub fn destination_identity(&self, event_id: impl Into<String>) -> EventIdentity {
        EventIdentity::new(&self.dst_account_email, &self.dst_calendar_id, event_id)
    }

    /// Check required fields before any API call is made.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("source account", &self.src_account_email),
            ("source calendar", &self.src_calendar_id),
            ("destination account", &self.dst_account_email),
            ("destination calendar", &self.dst_calendar_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(CalMirrorError::Config(format!("{name} not specified")));
            }
        }

        if self.src_account_email == self.dst_account_email
            && self.src_calendar_id == self.dst_calendar_id
        {
            return Err(CalMirrorError::Config(
                "source and destination calendars must differ".to_string(),
            ));
        }

        Ok(())
    }
}
