//! Google Calendar v3 REST backend
//!
//! One client is bound to one account's access token. Every call returns a
//! typed [`BackendError`] so the sync engine can tell missing resources from
//! other failures.

use std::time::Duration;

use async_trait::async_trait;
use calmirror_core::sync::{BackendResult, CalendarBackend};
use calmirror_domain::{
    BackendError, CalMirrorError, CalendarEvent, CalendarInfo, EventPage, EventQuery, Result,
};
use chrono::SecondsFormat;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::errors::InfraError;

/// Calendar backend talking to the Google Calendar REST API.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GoogleCalendarClient {
    /// Build a client with its own HTTP connection pool.
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalMirrorError::from(InfraError::from(e)))?;
        Ok(Self::with_client(http, base_url, access_token))
    }

    /// Build a client on top of an existing HTTP client.
    pub fn with_client(
        http: Client,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url, access_token: access_token.into() }
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.base_url, urlencoding::encode(calendar_id))
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!("{}/{}", self.events_url(calendar_id), urlencoding::encode(event_id))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> BackendResult<T> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

#[async_trait]
impl CalendarBackend for GoogleCalendarClient {
    async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
        page_token: Option<&str>,
    ) -> BackendResult<EventPage> {
        let mut params: Vec<(&str, String)> = vec![
            ("orderBy", "updated".to_string()),
            ("showDeleted", "true".to_string()),
        ];
        if let Some(page_size) = query.page_size {
            params.push(("maxResults", page_size.to_string()));
        }
        if let Some(updated_min) = query.updated_min {
            params.push(("updatedMin", updated_min.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(time_min) = query.time_min {
            params.push(("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response: EventsResponse =
            self.fetch(self.http.get(self.events_url(calendar_id)).query(&params)).await?;

        debug!(
            calendar_id,
            items = response.items.len(),
            has_more = response.next_page_token.is_some(),
            "google.events.listed"
        );

        Ok(EventPage { items: response.items, next_page_token: response.next_page_token })
    }

    async fn get_event(&self, calendar_id: &str, event_id: &str) -> BackendResult<CalendarEvent> {
        self.fetch(self.http.get(self.event_url(calendar_id, event_id))).await
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> BackendResult<CalendarEvent> {
        self.fetch(self.http.post(self.events_url(calendar_id)).json(event)).await
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> BackendResult<CalendarEvent> {
        self.fetch(self.http.put(self.event_url(calendar_id, event_id)).json(event)).await
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> BackendResult<()> {
        self.send(self.http.delete(self.event_url(calendar_id, event_id))).await?;
        Ok(())
    }

    async fn find_instance(
        &self,
        calendar_id: &str,
        series_id: &str,
        original_start: &str,
    ) -> BackendResult<Option<CalendarEvent>> {
        let url = format!("{}/instances", self.event_url(calendar_id, series_id));
        let params = [
            ("originalStart", original_start),
            ("maxResults", "1"),
            ("showDeleted", "true"),
        ];

        let response: EventsResponse = self.fetch(self.http.get(url).query(&params)).await?;
        Ok(response.items.into_iter().next())
    }

    async fn list_calendars(&self) -> BackendResult<Vec<CalendarInfo>> {
        let url = format!("{}/users/me/calendarList", self.base_url);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params: Vec<(&str, String)> = vec![("showDeleted", "true".to_string())];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let response: CalendarListResponse =
                self.fetch(self.http.get(&url).query(&params)).await?;
            calendars.extend(response.items.into_iter().map(CalendarInfo::from));

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(calendars)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListEntry {
    id: String,
    #[serde(default)]
    summary: String,
    summary_override: Option<String>,
    #[serde(default)]
    deleted: bool,
}

impl From<CalendarListEntry> for CalendarInfo {
    fn from(entry: CalendarListEntry) -> Self {
        let summary = entry.summary_override.filter(|s| !s.is_empty()).unwrap_or(entry.summary);
        Self { id: entry.id, summary, deleted: entry.deleted }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Map a non-success response onto a backend error.
///
/// Google reports quota exhaustion as 403 with a `*RateLimitExceeded` reason.
fn status_error(status: StatusCode, body: &str) -> BackendError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let message = match &parsed {
        Some(error) if !error.message.is_empty() => error.message.clone(),
        _ => format!("HTTP {}", status.as_u16()),
    };
    let rate_limited = parsed
        .as_ref()
        .is_some_and(|e| e.errors.iter().any(|d| d.reason.ends_with("ateLimitExceeded")));

    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => BackendError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited(message),
        StatusCode::FORBIDDEN if rate_limited => BackendError::RateLimited(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
        _ => BackendError::Api { status: status.as_u16(), message },
    }
}
