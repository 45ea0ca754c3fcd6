//! Domain types and models

pub mod calendar;
pub mod sync;

pub use calendar::{
    CalendarEvent, CalendarInfo, EventAttendee, EventDateTime, EventPage, EventQuery,
    EventStatus, ResponseStatus,
};
pub use sync::{correlation_key, CorrelationRecord, EventIdentity, MappingOptions, SyncRequest};
