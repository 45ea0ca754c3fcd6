//! Port interfaces for sync operations

use std::sync::Arc;

use async_trait::async_trait;
use calmirror_domain::{
    BackendError, CalendarEvent, CalendarInfo, CorrelationRecord, EventIdentity, EventPage,
    EventQuery, Result,
};

/// Result of a calendar backend call.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Durable source-to-destination event id mappings
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Insert or replace the record under its composite key
    async fn insert(&self, record: &CorrelationRecord) -> Result<()>;

    /// Find the record mirroring `src` into the given destination calendar
    async fn find(
        &self,
        src: &EventIdentity,
        dst_account_email: &str,
        dst_calendar_id: &str,
    ) -> Result<Option<CorrelationRecord>>;

    /// Remove the record. Removing a missing record is not an error.
    async fn delete(&self, record: &CorrelationRecord) -> Result<()>;

    /// All records whose destination is the given calendar
    async fn list_by_destination(
        &self,
        account_email: &str,
        calendar_id: &str,
    ) -> Result<Vec<CorrelationRecord>>;
}

/// Authenticated handle on one account's calendars
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Fetch one page of events ordered by last update
    async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
        page_token: Option<&str>,
    ) -> BackendResult<EventPage>;

    /// Read one event, including cancelled ones
    async fn get_event(&self, calendar_id: &str, event_id: &str) -> BackendResult<CalendarEvent>;

    /// Create an event and return it with its new id
    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> BackendResult<CalendarEvent>;

    /// Replace an existing event
    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> BackendResult<CalendarEvent>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> BackendResult<()>;

    /// Look up the occurrence of `series_id` that originally started at
    /// `original_start`
    async fn find_instance(
        &self,
        calendar_id: &str,
        series_id: &str,
        original_start: &str,
    ) -> BackendResult<Option<CalendarEvent>>;

    /// Calendars visible to the account
    async fn list_calendars(&self) -> BackendResult<Vec<CalendarInfo>>;
}

/// Yields calendar handles for authenticated accounts
#[async_trait]
pub trait CalendarConnector: Send + Sync {
    /// Emails of every authenticated account
    async fn accounts(&self) -> Result<Vec<String>>;

    /// Open a handle for `account_email`.
    ///
    /// Fails with a configuration error when the account is not
    /// authenticated.
    async fn connect(&self, account_email: &str) -> Result<Arc<dyn CalendarBackend>>;
}
