//! Per-event exclusion rules.
//!
//! Rules are evaluated on every pass, so an event moves between included and
//! excluded as its RSVP or title changes.

use std::fmt;

use calmirror_domain::constants::OUT_OF_OFFICE_MARKER;
use calmirror_domain::{CalMirrorError, CalendarEvent, ResponseStatus, Result, SyncRequest};
use regex::Regex;

/// Why an event was excluded from mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    Declined,
    Tentative,
    NotResponded,
    OutOfOffice,
    TitlePattern,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Declined => "declined",
            Self::Tentative => "tentative",
            Self::NotResponded => "not-responded",
            Self::OutOfOffice => "out-of-office",
            Self::TitlePattern => "title-pattern",
        };
        f.write_str(label)
    }
}

/// Compiled exclusion settings of one sync request.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    include_tentative: bool,
    include_not_going: bool,
    include_not_responded: bool,
    include_out_of_office: bool,
    title_pattern: Option<Regex>,
}

impl ExclusionPolicy {
    /// Compile the policy for `request`.
    ///
    /// An invalid title pattern is a configuration error.
    pub fn from_request(request: &SyncRequest) -> Result<Self> {
        let title_pattern = match request.exclude_title_pattern.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(Regex::new(pattern).map_err(|e| {
                CalMirrorError::Config(format!("invalid exclude title pattern: {e}"))
            })?),
            _ => None,
        };

        Ok(Self {
            include_tentative: request.include_tentative,
            include_not_going: request.include_not_going,
            include_not_responded: request.include_not_responded,
            include_out_of_office: request.include_out_of_office,
            title_pattern,
        })
    }

    pub fn should_exclude(&self, event: &CalendarEvent) -> bool {
        self.exclusion_reason(event).is_some()
    }

    /// First rule that excludes `event`, if any.
    pub fn exclusion_reason(&self, event: &CalendarEvent) -> Option<ExclusionReason> {
        match event.self_response() {
            ResponseStatus::Declined if !self.include_not_going => {
                return Some(ExclusionReason::Declined)
            }
            ResponseStatus::Tentative if !self.include_tentative => {
                return Some(ExclusionReason::Tentative)
            }
            ResponseStatus::NeedsAction if !self.include_not_responded => {
                return Some(ExclusionReason::NotResponded)
            }
            _ => {}
        }

        if !self.include_out_of_office
            && event.description.as_deref().is_some_and(|d| d.starts_with(OUT_OF_OFFICE_MARKER))
        {
            return Some(ExclusionReason::OutOfOffice);
        }

        let title = event.summary.as_deref().unwrap_or_default();
        if self.title_pattern.as_ref().is_some_and(|pattern| pattern.is_match(title)) {
            return Some(ExclusionReason::TitlePattern);
        }

        None
    }
}
