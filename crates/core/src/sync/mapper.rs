//! Projection of a source event onto a destination payload.

use calmirror_domain::constants::DEFAULT_VISIBILITY;
use calmirror_domain::{CalendarEvent, MappingOptions};

/// Build the destination payload for `source`.
///
/// Identifiers, attendees and the recurring parent are never copied; the
/// engine sets the parent after resolving it.
pub fn map_event(source: &CalendarEvent, options: &MappingOptions) -> CalendarEvent {
    let summary = match options.title_override.as_deref() {
        Some(title) if !title.is_empty() => Some(title.to_string()),
        _ => source.summary.clone(),
    };

    let visibility = if options.visibility.trim().is_empty() {
        DEFAULT_VISIBILITY.to_string()
    } else {
        options.visibility.clone()
    };

    CalendarEvent {
        status: source.status,
        summary,
        description: source.description.clone().filter(|_| options.copy_description),
        location: source.location.clone().filter(|_| options.copy_location),
        color_id: source.color_id.clone().filter(|_| options.copy_color),
        start: source.start.clone(),
        end: source.end.clone(),
        original_start_time: source.original_start_time.clone(),
        end_time_unspecified: source.end_time_unspecified,
        recurrence: source.recurrence.clone(),
        transparency: source.transparency.clone(),
        visibility: Some(visibility),
        ..CalendarEvent::default()
    }
}

#[cfg(test)]
mod tests {
    use calmirror_domain::{EventAttendee, EventDateTime, EventStatus, ResponseStatus};
    use chrono::{DateTime, NaiveDate};

    use super::*;

    fn source_event() -> CalendarEvent {
        let start = DateTime::parse_from_rfc3339("2024-06-03T10:00:00-04:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2024-06-03T11:00:00-04:00").unwrap();
        CalendarEvent {
            id: Some("src-1".into()),
            status: Some(EventStatus::Confirmed),
            summary: Some("Design review".into()),
            description: Some("Agenda".into()),
            location: Some("Room 4".into()),
            color_id: Some("7".into()),
            start: Some(EventDateTime::at(start, Some("America/New_York".into()))),
            end: Some(EventDateTime::at(end, Some("America/New_York".into()))),
            original_start_time: Some(EventDateTime::at(start, None)),
            end_time_unspecified: true,
            recurrence: vec!["RRULE:FREQ=WEEKLY".into()],
            recurring_event_id: Some("series-1".into()),
            transparency: Some("transparent".into()),
            visibility: Some("private".into()),
            attendees: vec![EventAttendee {
                email: Some("me@example.com".into()),
                is_self: true,
                response_status: ResponseStatus::Accepted,
            }],
        }
    }

    #[test]
    fn copies_always_copied_fields() {
        let source = source_event();
        let mapped = map_event(&source, &MappingOptions::default());

        assert_eq!(mapped.status, source.status);
        assert_eq!(mapped.summary, source.summary);
        assert_eq!(mapped.start, source.start);
        assert_eq!(mapped.end, source.end);
        assert_eq!(mapped.original_start_time, source.original_start_time);
        assert!(mapped.end_time_unspecified);
        assert_eq!(mapped.recurrence, source.recurrence);
        assert_eq!(mapped.transparency, source.transparency);
    }

    #[test]
    fn never_copies_identity_fields() {
        let mapped = map_event(&source_event(), &MappingOptions::default());

        assert!(mapped.id.is_none());
        assert!(mapped.recurring_event_id.is_none());
        assert!(mapped.attendees.is_empty());
    }

    #[test]
    fn optional_fields_follow_options() {
        let source = source_event();
        let mapped = map_event(&source, &MappingOptions::default());
        assert!(mapped.description.is_none());
        assert!(mapped.location.is_none());
        assert!(mapped.color_id.is_none());

        let options = MappingOptions {
            copy_description: true,
            copy_location: true,
            copy_color: true,
            ..MappingOptions::default()
        };
        let mapped = map_event(&source, &options);
        assert_eq!(mapped.description.as_deref(), Some("Agenda"));
        assert_eq!(mapped.location.as_deref(), Some("Room 4"));
        assert_eq!(mapped.color_id.as_deref(), Some("7"));
    }

    #[test]
    fn title_override_replaces_summary() {
        let options =
            MappingOptions { title_override: Some("Busy".into()), ..MappingOptions::default() };
        assert_eq!(map_event(&source_event(), &options).summary.as_deref(), Some("Busy"));

        let options = MappingOptions { title_override: Some(String::new()), ..options };
        assert_eq!(map_event(&source_event(), &options).summary.as_deref(), Some("Design review"));
    }

    #[test]
    fn visibility_is_always_set() {
        let mapped = map_event(&source_event(), &MappingOptions::default());
        assert_eq!(mapped.visibility.as_deref(), Some("default"));

        let options = MappingOptions { visibility: "private".into(), ..MappingOptions::default() };
        assert_eq!(map_event(&source_event(), &options).visibility.as_deref(), Some("private"));

        let options = MappingOptions { visibility: "  ".into(), ..MappingOptions::default() };
        assert_eq!(map_event(&source_event(), &options).visibility.as_deref(), Some("default"));
    }

    #[test]
    fn all_day_boundaries_stay_date_only() {
        let day = NaiveDate::from_ymd_opt(2024, 12, 24).unwrap();
        let source = CalendarEvent {
            start: Some(EventDateTime::all_day(day)),
            end: Some(EventDateTime::all_day(day.succ_opt().unwrap())),
            ..CalendarEvent::default()
        };

        let mapped = map_event(&source, &MappingOptions::default());
        let start = mapped.start.unwrap();
        assert_eq!(start.date, Some(day));
        assert!(start.date_time.is_none());
        assert!(start.time_zone.is_none());
    }
}
