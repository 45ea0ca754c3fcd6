//! Shared test helpers for `calmirror-core` integration tests.
//!
//! In-memory fakes for the correlation store, calendar backends and the
//! connector, plus event builders, so sync tests can focus on behaviour
//! instead of boilerplate.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calmirror_common::resilience::{TokenBucket, TokenBucketConfig};
use calmirror_core::sync::{BackendResult, CalendarBackend, CalendarConnector, CorrelationStore};
use calmirror_domain::{
    correlation_key, BackendError, CalMirrorError, CalendarEvent, CalendarInfo, CorrelationRecord,
    EventAttendee, EventDateTime, EventIdentity, EventPage, EventQuery, EventStatus,
    ResponseStatus, Result as DomainResult,
};
use chrono::DateTime;
use parking_lot::Mutex;

pub const SRC_ACCOUNT: &str = "src@example.com";
pub const SRC_CALENDAR: &str = "primary";
pub const DST_ACCOUNT: &str = "dst@example.com";
pub const DST_CALENDAR: &str = "mirror";

/// Limiter fast enough for tests running on paused time.
pub fn fast_limiter() -> Arc<TokenBucket> {
    Arc::new(TokenBucket::new(TokenBucketConfig::every(Duration::from_millis(1))).unwrap())
}

// ---------------------------------------------------------------------------
// Correlation store
// ---------------------------------------------------------------------------

/// In-memory `CorrelationStore` keyed like the real one.
///
/// Records inserted through [`InMemoryCorrelationStore::pin`] survive
/// `delete`, which lets tests model a store that keeps handing out a stale
/// mapping.
#[derive(Default)]
pub struct InMemoryCorrelationStore {
    records: Mutex<BTreeMap<String, (u64, CorrelationRecord)>>,
    pinned: Mutex<HashSet<String>>,
    deletes: Mutex<Vec<CorrelationRecord>>,
    sequence: Mutex<u64>,
}

impl InMemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly.
    pub fn seed(&self, record: CorrelationRecord) {
        let mut sequence = self.sequence.lock();
        *sequence += 1;
        self.records.lock().insert(record.key(), (*sequence, record));
    }

    /// Seed a record that ignores deletes.
    pub fn pin(&self, record: CorrelationRecord) {
        self.pinned.lock().insert(record.key());
        self.seed(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records in insertion order.
    pub fn records(&self) -> Vec<CorrelationRecord> {
        let mut entries: Vec<_> = self.records.lock().values().cloned().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, record)| record).collect()
    }

    /// Every record passed to `delete`, pinned or not, in call order.
    pub fn deletes(&self) -> Vec<CorrelationRecord> {
        self.deletes.lock().clone()
    }

    /// Destination id mirrored for a source event id, if any.
    pub fn dst_for(&self, src_event_id: &str) -> Option<String> {
        let src = EventIdentity::new(SRC_ACCOUNT, SRC_CALENDAR, src_event_id);
        let key = correlation_key(&src, DST_ACCOUNT, DST_CALENDAR);
        self.records.lock().get(&key).map(|(_, record)| record.dst.event_id.clone())
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn insert(&self, record: &CorrelationRecord) -> DomainResult<()> {
        self.seed(record.clone());
        Ok(())
    }

    async fn find(
        &self,
        src: &EventIdentity,
        dst_account_email: &str,
        dst_calendar_id: &str,
    ) -> DomainResult<Option<CorrelationRecord>> {
        let key = correlation_key(src, dst_account_email, dst_calendar_id);
        Ok(self.records.lock().get(&key).map(|(_, record)| record.clone()))
    }

    async fn delete(&self, record: &CorrelationRecord) -> DomainResult<()> {
        self.deletes.lock().push(record.clone());
        let key = record.key();
        if !self.pinned.lock().contains(&key) {
            self.records.lock().remove(&key);
        }
        Ok(())
    }

    async fn list_by_destination(
        &self,
        account_email: &str,
        calendar_id: &str,
    ) -> DomainResult<Vec<CorrelationRecord>> {
        Ok(self
            .records()
            .into_iter()
            .filter(|r| r.dst.account_email == account_email && r.dst.calendar_id == calendar_id)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Calendar backend
// ---------------------------------------------------------------------------

/// Backend operation, used for call assertions and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Get,
    Insert,
    Update,
    Delete,
    FindInstance,
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub calendar_id: String,
    /// Event id for get/update/delete, series id for instance lookups
    pub target: Option<String>,
    pub payload: Option<CalendarEvent>,
    pub query: Option<EventQuery>,
}

#[derive(Default)]
struct FakeState {
    /// Events per calendar, in last-update order
    calendars: HashMap<String, Vec<CalendarEvent>>,
    calendar_list: Vec<CalendarInfo>,
    next_id: u32,
    calls: Vec<Call>,
    failures: HashMap<Op, BackendError>,
}

/// In-memory calendar account.
///
/// Deletes are soft: the event stays readable with status `cancelled`, and
/// deleting it again is a `NotFound`, like the real API. Writes that name a
/// missing recurring parent fail with `NotFound`.
#[derive(Default)]
pub struct FakeCalendar {
    state: Mutex<FakeState>,
}

impl FakeCalendar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert or replace `event`, moving it to the end of the update order.
    pub fn upsert(&self, calendar_id: &str, event: CalendarEvent) {
        let mut state = self.state.lock();
        let events = state.calendars.entry(calendar_id.to_string()).or_default();
        events.retain(|existing| existing.id != event.id);
        events.push(event);
    }

    /// Replace the event with `id` through `edit`, bumping its update order.
    pub fn modify(&self, calendar_id: &str, id: &str, edit: impl FnOnce(&mut CalendarEvent)) {
        let mut event = self.event(calendar_id, id).unwrap();
        edit(&mut event);
        self.upsert(calendar_id, event);
    }

    pub fn event(&self, calendar_id: &str, id: &str) -> Option<CalendarEvent> {
        self.state
            .lock()
            .calendars
            .get(calendar_id)
            .and_then(|events| events.iter().find(|e| e.id.as_deref() == Some(id)).cloned())
    }

    pub fn events(&self, calendar_id: &str) -> Vec<CalendarEvent> {
        self.state.lock().calendars.get(calendar_id).cloned().unwrap_or_default()
    }

    /// Events not cancelled.
    pub fn live_events(&self, calendar_id: &str) -> Vec<CalendarEvent> {
        self.events(calendar_id).into_iter().filter(|e| !e.is_cancelled()).collect()
    }

    pub fn set_calendars(&self, calendars: Vec<CalendarInfo>) {
        self.state.lock().calendar_list = calendars;
    }

    /// Make the next call of `op` fail with `error`.
    pub fn fail_next(&self, op: Op, error: BackendError) {
        self.state.lock().failures.insert(op, error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.calls().into_iter().filter(|call| call.op == op).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(
        &self,
        op: Op,
        calendar_id: &str,
        target: Option<&str>,
        payload: Option<&CalendarEvent>,
        query: Option<&EventQuery>,
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call {
            op,
            calendar_id: calendar_id.to_string(),
            target: target.map(str::to_string),
            payload: payload.cloned(),
            query: query.cloned(),
        });
        match state.failures.remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn check_parent(state: &FakeState, calendar_id: &str, event: &CalendarEvent) -> BackendResult<()> {
        let Some(parent) = event.recurring_event_id.as_deref() else {
            return Ok(());
        };
        let exists = state.calendars.get(calendar_id).is_some_and(|events| {
            events.iter().any(|e| e.id.as_deref() == Some(parent) && !e.is_cancelled())
        });
        if exists {
            Ok(())
        } else {
            Err(BackendError::NotFound(format!("recurring event {parent}")))
        }
    }
}

#[async_trait]
impl CalendarBackend for FakeCalendar {
    async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
        page_token: Option<&str>,
    ) -> BackendResult<EventPage> {
        self.record(Op::List, calendar_id, page_token, None, Some(query))?;

        let events = self.events(calendar_id);
        let offset: usize = page_token.map_or(0, |token| token.parse().unwrap());
        let size = query.page_size.map_or(events.len(), |size| size as usize).max(1);
        let items: Vec<_> = events.iter().skip(offset).take(size).cloned().collect();
        let next = offset + items.len();
        let next_page_token = (next < events.len()).then(|| next.to_string());

        Ok(EventPage { items, next_page_token })
    }

    async fn get_event(&self, calendar_id: &str, event_id: &str) -> BackendResult<CalendarEvent> {
        self.record(Op::Get, calendar_id, Some(event_id), None, None)?;
        self.event(calendar_id, event_id)
            .ok_or_else(|| BackendError::NotFound(format!("event {event_id}")))
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> BackendResult<CalendarEvent> {
        self.record(Op::Insert, calendar_id, None, Some(event), None)?;

        let mut state = self.state.lock();
        Self::check_parent(&state, calendar_id, event)?;
        state.next_id += 1;
        let mut created = event.clone();
        created.id = Some(format!("dst-{}", state.next_id));
        state.calendars.entry(calendar_id.to_string()).or_default().push(created.clone());
        Ok(created)
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> BackendResult<CalendarEvent> {
        self.record(Op::Update, calendar_id, Some(event_id), Some(event), None)?;

        let mut state = self.state.lock();
        Self::check_parent(&state, calendar_id, event)?;
        let existing = state
            .calendars
            .get_mut(calendar_id)
            .and_then(|events| events.iter_mut().find(|e| e.id.as_deref() == Some(event_id)))
            .ok_or_else(|| BackendError::NotFound(format!("event {event_id}")))?;
        *existing = CalendarEvent { id: Some(event_id.to_string()), ..event.clone() };
        Ok(existing.clone())
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> BackendResult<()> {
        self.record(Op::Delete, calendar_id, Some(event_id), None, None)?;

        let mut state = self.state.lock();
        let existing = state
            .calendars
            .get_mut(calendar_id)
            .and_then(|events| events.iter_mut().find(|e| e.id.as_deref() == Some(event_id)))
            .filter(|e| !e.is_cancelled())
            .ok_or_else(|| BackendError::NotFound(format!("event {event_id}")))?;
        existing.status = Some(EventStatus::Cancelled);
        Ok(())
    }

    async fn find_instance(
        &self,
        calendar_id: &str,
        series_id: &str,
        original_start: &str,
    ) -> BackendResult<Option<CalendarEvent>> {
        self.record(Op::FindInstance, calendar_id, Some(series_id), None, None)?;

        let events = self.events(calendar_id);
        if !events.iter().any(|e| e.id.as_deref() == Some(series_id)) {
            return Err(BackendError::NotFound(format!("series {series_id}")));
        }
        Ok(events.into_iter().find(|e| {
            e.recurring_event_id.as_deref() == Some(series_id)
                && e.original_start_time.as_ref().and_then(EventDateTime::to_query_value).as_deref()
                    == Some(original_start)
        }))
    }

    async fn list_calendars(&self) -> BackendResult<Vec<CalendarInfo>> {
        Ok(self.state.lock().calendar_list.clone())
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Connector over a fixed set of fake accounts.
#[derive(Default)]
pub struct FakeConnector {
    accounts: BTreeMap<String, Arc<FakeCalendar>>,
    connects: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, email: &str, calendar: Arc<FakeCalendar>) -> Self {
        self.accounts.insert(email.to_string(), calendar);
        self
    }

    /// Accounts connected so far, in order.
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().clone()
    }
}

#[async_trait]
impl CalendarConnector for FakeConnector {
    async fn accounts(&self) -> DomainResult<Vec<String>> {
        Ok(self.accounts.keys().cloned().collect())
    }

    async fn connect(&self, account_email: &str) -> DomainResult<Arc<dyn CalendarBackend>> {
        self.connects.lock().push(account_email.to_string());
        let calendar = self.accounts.get(account_email).cloned().ok_or_else(|| {
            CalMirrorError::Config(format!("account {account_email} not authenticated"))
        })?;
        Ok(calendar)
    }
}

// ---------------------------------------------------------------------------
// Event builders
// ---------------------------------------------------------------------------

/// Confirmed one-hour event on 2024-06-03 at 09:00 UTC.
pub fn timed(id: &str, summary: &str) -> CalendarEvent {
    let start = DateTime::parse_from_rfc3339("2024-06-03T09:00:00+00:00").unwrap();
    let end = DateTime::parse_from_rfc3339("2024-06-03T10:00:00+00:00").unwrap();
    CalendarEvent {
        id: Some(id.to_string()),
        status: Some(EventStatus::Confirmed),
        summary: Some(summary.to_string()),
        start: Some(EventDateTime::at(start, Some("UTC".into()))),
        end: Some(EventDateTime::at(end, Some("UTC".into()))),
        ..CalendarEvent::default()
    }
}

/// Weekly recurring series master.
pub fn series(id: &str, summary: &str) -> CalendarEvent {
    CalendarEvent { recurrence: vec!["RRULE:FREQ=WEEKLY;BYDAY=MO".into()], ..timed(id, summary) }
}

/// Exception instance of `parent` originally starting at `original_start`.
pub fn exception(id: &str, parent: &str, original_start: &str) -> CalendarEvent {
    let original = DateTime::parse_from_rfc3339(original_start).unwrap();
    CalendarEvent {
        recurring_event_id: Some(parent.to_string()),
        original_start_time: Some(EventDateTime::at(original, Some("UTC".into()))),
        ..timed(id, "Moved occurrence")
    }
}

pub fn cancelled(mut event: CalendarEvent) -> CalendarEvent {
    event.status = Some(EventStatus::Cancelled);
    event
}

/// Set the calendar owner's RSVP on `event`.
pub fn with_rsvp(mut event: CalendarEvent, status: ResponseStatus) -> CalendarEvent {
    event.attendees = vec![EventAttendee {
        email: Some(SRC_ACCOUNT.to_string()),
        is_self: true,
        response_status: status,
    }];
    event
}

pub fn record(src_event_id: &str, dst_event_id: &str) -> CorrelationRecord {
    CorrelationRecord::new(
        EventIdentity::new(SRC_ACCOUNT, SRC_CALENDAR, src_event_id),
        EventIdentity::new(DST_ACCOUNT, DST_CALENDAR, dst_event_id),
    )
}
