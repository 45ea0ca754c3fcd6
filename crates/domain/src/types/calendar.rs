//! Calendar payload types.
//!
//! Field names follow the Google Calendar v3 `Event` resource so the same
//! structs serve as wire format and as the engine's view of an event.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

/// RSVP state of an attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    NeedsAction,
    Declined,
    Tentative,
    Accepted,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A start or end boundary: either an all-day date or a timestamp with an
/// optional IANA zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    /// All-day boundary.
    pub fn all_day(date: NaiveDate) -> Self {
        Self { date: Some(date), ..Self::default() }
    }

    /// Timed boundary.
    pub fn at(date_time: DateTime<FixedOffset>, time_zone: Option<String>) -> Self {
        Self { date: None, date_time: Some(date_time), time_zone }
    }

    /// Render the boundary the way the API expects it in query parameters.
    pub fn to_query_value(&self) -> Option<String> {
        self.date_time
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            .or_else(|| self.date.map(|d| d.format("%Y-%m-%d").to_string()))
    }
}

/// An attendee entry. Only the fields the engine reads are modelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "self", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_self: bool,
    #[serde(default)]
    pub response_status: ResponseStatus,
}

/// A calendar event as read from the source or written to the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_start_time: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub end_time_unspecified: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<EventAttendee>,
}

impl CalendarEvent {
    /// Event id, or an empty string for payloads that have not been created yet.
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == Some(EventStatus::Cancelled)
    }

    /// Id of the recurring series this event belongs to, if any.
    pub fn recurring_parent(&self) -> Option<&str> {
        self.recurring_event_id.as_deref().filter(|id| !id.is_empty())
    }

    /// RSVP status of the calendar owner, `Unknown` when the owner is not
    /// listed as an attendee.
    pub fn self_response(&self) -> ResponseStatus {
        self.attendees
            .iter()
            .find(|attendee| attendee.is_self)
            .map_or(ResponseStatus::Unknown, |attendee| attendee.response_status)
    }
}

/// One page of a paginated event listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPage {
    pub items: Vec<CalendarEvent>,
    pub next_page_token: Option<String>,
}

/// Filters applied when listing source events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Only events updated at or after this instant.
    pub updated_min: Option<DateTime<chrono::Utc>>,
    /// Only events ending after this instant.
    pub time_min: Option<DateTime<chrono::Utc>>,
    pub page_size: Option<u32>,
}

/// A calendar visible to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub summary: String,
    pub deleted: bool,
}
