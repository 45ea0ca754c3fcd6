//! Sync engine: one sequential mirroring pass from a source calendar into a
//! destination calendar.
//!
//! Every source event is classified against the correlation store on each
//! pass:
//!
//! | store  | source event         | action                                   |
//! |--------|----------------------|------------------------------------------|
//! | miss   | cancelled / excluded | delete the matching exception instance   |
//! | miss   | active and included  | create, then insert the record           |
//! | hit    | cancelled / excluded | delete the mirror, then remove the record |
//! | hit    | active and included  | update in place                          |
//!
//! Store writes happen right after the destination call they reflect, so a
//! run aborted at any point leaves the store consistent with the
//! destination.

use std::future::Future;
use std::sync::Arc;

use calmirror_common::resilience::{RateLimitError, TokenBucket};
use calmirror_domain::constants::DEFAULT_PAGE_SIZE;
use calmirror_domain::{
    BackendError, CalMirrorError, CalendarEvent, CorrelationRecord, EventDateTime, EventQuery, Result,
    SyncRequest, SyncStage,
};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::exclusion::ExclusionPolicy;
use super::mapper::map_event;
use super::ports::{BackendResult, CalendarBackend, CorrelationStore};

/// Attempts allowed for a create or update whose recurring parent mapping
/// turns out to be stale: the first try plus one retry after healing.
pub const MAX_ATTEMPTS: u32 = 2;

/// Counters reported at the end of a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Source pages fetched
    pub pages: u32,
    /// Source events examined
    pub seen: u32,
    /// Mirrors created
    pub created: u32,
    /// Mirrors rewritten from their source
    pub updated: u32,
    /// Mirrors deleted because their source was cancelled or excluded
    pub deleted: u32,
    /// Destination occurrences deleted for cancelled or excluded exceptions
    pub deleted_instances: u32,
    /// Children whose recurring parent is not mirrored yet
    pub deferred: u32,
    /// Cancelled or excluded events with nothing to remove
    pub skipped: u32,
    /// Mirrors already cancelled or missing at the destination
    pub already_gone: u32,
}

/// Counters reported at the end of a clear run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearSummary {
    /// Mirrors deleted from the destination
    pub deleted: u32,
    /// Records whose mirror was already cancelled or missing
    pub already_gone: u32,
}

/// Drives sync and clear runs against a correlation store.
///
/// The engine holds no per-run state; every decision is taken from the
/// store, so reruns are safe.
pub struct SyncEngine {
    store: Arc<dyn CorrelationStore>,
    limiter: Arc<TokenBucket>,
    page_size: u32,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn CorrelationStore>, limiter: Arc<TokenBucket>) -> Self {
        Self { store, limiter, page_size: DEFAULT_PAGE_SIZE }
    }

    /// Set the number of source events requested per page.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Validate `request` and compile its exclusion rules.
    ///
    /// Runs before any backend call so configuration mistakes fail fast.
    pub fn check_request(request: &SyncRequest) -> Result<ExclusionPolicy> {
        request.validate()?;
        ExclusionPolicy::from_request(request)
    }

    /// Mirror `request.src_calendar_id` into `request.dst_calendar_id`.
    ///
    /// Runs to completion or to the first unrecoverable error. Errors are
    /// wrapped with the stage that failed, except cancellation.
    #[instrument(
        name = "sync.run",
        skip_all,
        fields(
            src = %format!("{}/{}", request.src_account_email, request.src_calendar_id),
            dst = %format!("{}/{}", request.dst_account_email, request.dst_calendar_id),
        )
    )]
    pub async fn run(
        &self,
        request: &SyncRequest,
        source: &dyn CalendarBackend,
        destination: &dyn CalendarBackend,
        cancel: &CancellationToken,
    ) -> Result<SyncSummary> {
        let policy = Self::check_request(request)?;
        let query = build_query(request, Utc::now(), self.page_size)?;
        let writer = self.writer(destination, cancel);

        let mut pass = SyncPass { request, policy, writer, summary: SyncSummary::default() };
        let mut page_token: Option<String> = None;

        loop {
            let page = pass
                .writer
                .call(source.list_events(&request.src_calendar_id, &query, page_token.as_deref()))
                .await?
                .map_err(|e| {
                    CalMirrorError::from(e)
                        .at_stage(SyncStage::List, format!("calendar {}", request.src_calendar_id))
                })?;
            pass.summary.pages += 1;
            debug!(items = page.items.len(), page = pass.summary.pages, "sync.page.fetched");

            for event in &page.items {
                pass.process(event).await?;
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        let summary = pass.summary;
        info!(
            pages = summary.pages,
            seen = summary.seen,
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            deleted_instances = summary.deleted_instances,
            deferred = summary.deferred,
            skipped = summary.skipped,
            already_gone = summary.already_gone,
            "sync.run.completed"
        );
        Ok(summary)
    }

    /// Delete every mirror the engine wrote into `calendar_id` and drop
    /// their records.
    #[instrument(name = "clear.run", skip(self, destination, cancel))]
    pub async fn clear(
        &self,
        destination: &dyn CalendarBackend,
        account_email: &str,
        calendar_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ClearSummary> {
        if account_email.trim().is_empty() || calendar_id.trim().is_empty() {
            return Err(CalMirrorError::Config(
                "account and calendar must be specified".to_string(),
            ));
        }

        let records = self
            .store
            .list_by_destination(account_email, calendar_id)
            .await
            .map_err(|e| e.at_stage(SyncStage::Store, format!("calendar {calendar_id}")))?;
        info!(records = records.len(), "clear.records.loaded");

        let writer = self.writer(destination, cancel);
        let mut summary = ClearSummary::default();
        for record in &records {
            match writer.delete_mirrored(record).await? {
                Removal::Deleted => summary.deleted += 1,
                Removal::AlreadyGone => summary.already_gone += 1,
            }
        }

        info!(deleted = summary.deleted, already_gone = summary.already_gone, "clear.run.completed");
        Ok(summary)
    }

    fn writer<'a>(
        &'a self,
        destination: &'a dyn CalendarBackend,
        cancel: &'a CancellationToken,
    ) -> DestinationWriter<'a> {
        DestinationWriter {
            store: self.store.as_ref(),
            limiter: self.limiter.as_ref(),
            destination,
            cancel,
        }
    }
}

/// Listing bounds for one run.
///
/// The watermark and the start floor are independent; either, both or
/// neither may be set.
pub fn build_query(request: &SyncRequest, now: DateTime<Utc>, page_size: u32) -> Result<EventQuery> {
    let updated_min = match request.update_watermark {
        Some(watermark) => {
            let window = chrono::Duration::from_std(watermark)
                .map_err(|e| CalMirrorError::Config(format!("update watermark too large: {e}")))?;
            let since = now.checked_sub_signed(window).ok_or_else(|| {
                CalMirrorError::Config("update watermark reaches before the epoch".to_string())
            })?;
            Some(since)
        }
        None => None,
    };

    Ok(EventQuery { updated_min, time_min: request.start_after, page_size: Some(page_size) })
}

fn event_subject(event_id: &str) -> String {
    format!("event {event_id}")
}

/// Outcome of a single create or update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Done,
    /// A stale parent mapping was removed; the caller may try once more.
    RetryAfterHeal,
}

/// Destination series an event belongs to, as seen by the store.
#[derive(Debug)]
enum ParentLink {
    None,
    Resolved(CorrelationRecord),
    Unresolved { parent_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Deleted,
    AlreadyGone,
}

/// Rate-limited, cancellable access to the destination plus the store.
struct DestinationWriter<'a> {
    store: &'a dyn CorrelationStore,
    limiter: &'a TokenBucket,
    destination: &'a dyn CalendarBackend,
    cancel: &'a CancellationToken,
}

impl DestinationWriter<'_> {
    /// Wait for a limiter token, then run `request` unless cancelled first.
    async fn call<T, F>(&self, request: F) -> Result<BackendResult<T>>
    where
        F: Future<Output = BackendResult<T>>,
    {
        self.limiter.acquire(self.cancel).await.map_err(|e| match e {
            RateLimitError::Cancelled => CalMirrorError::Cancelled,
            other => CalMirrorError::Internal(other.to_string()),
        })?;

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CalMirrorError::Cancelled),
            result = request => Ok(result),
        }
    }

    /// Remove the mirror described by `record` and then the record itself.
    ///
    /// A mirror already cancelled or missing is left alone.
    async fn delete_mirrored(&self, record: &CorrelationRecord) -> Result<Removal> {
        let calendar_id = record.dst.calendar_id.as_str();
        let dst_id = record.dst.event_id.as_str();
        let subject = event_subject(dst_id);

        let already_gone = match self.call(self.destination.get_event(calendar_id, dst_id)).await? {
            Ok(existing) => existing.is_cancelled(),
            Err(err) if err.is_not_found() => true,
            Err(err) => return Err(CalMirrorError::from(err).at_stage(SyncStage::Delete, subject)),
        };

        let removal = if already_gone {
            Removal::AlreadyGone
        } else {
            match self.call(self.destination.delete_event(calendar_id, dst_id)).await? {
                Ok(()) => Removal::Deleted,
                Err(err) if err.is_not_found() => Removal::AlreadyGone,
                Err(err) => {
                    return Err(CalMirrorError::from(err).at_stage(SyncStage::Delete, subject))
                }
            }
        };

        self.store.delete(record).await.map_err(|e| e.at_stage(SyncStage::Store, subject))?;

        match removal {
            Removal::Deleted => info!(dst_event = dst_id, "sync.event.deleted"),
            Removal::AlreadyGone => info!(dst_event = dst_id, "sync.event.already_gone"),
        }
        Ok(removal)
    }
}

/// State of one sync run.
struct SyncPass<'a> {
    request: &'a SyncRequest,
    policy: ExclusionPolicy,
    writer: DestinationWriter<'a>,
    summary: SyncSummary,
}

impl SyncPass<'_> {
    async fn process(&mut self, event: &CalendarEvent) -> Result<()> {
        let event_id = event.id_str();
        if event_id.is_empty() {
            warn!("sync.event.missing_id");
            self.summary.skipped += 1;
            return Ok(());
        }
        self.summary.seen += 1;

        let src = self.request.source_identity(event_id);
        let record = self
            .writer
            .store
            .find(&src, &self.request.dst_account_email, &self.request.dst_calendar_id)
            .await
            .map_err(|e| e.at_stage(SyncStage::Store, event_subject(event_id)))?;

        let inactive = if event.is_cancelled() {
            true
        } else if let Some(reason) = self.policy.exclusion_reason(event) {
            debug!(event = event_id, %reason, "sync.event.excluded");
            true
        } else {
            false
        };

        match (record, inactive) {
            (None, true) => self.remove_exception_instance(event).await,
            (None, false) => self.create(event).await,
            (Some(record), true) => {
                match self.writer.delete_mirrored(&record).await? {
                    Removal::Deleted => self.summary.deleted += 1,
                    Removal::AlreadyGone => self.summary.already_gone += 1,
                }
                Ok(())
            }
            (Some(record), false) => self.update(event, &record).await,
        }
    }

    async fn resolve_parent(&self, event: &CalendarEvent) -> Result<ParentLink> {
        let Some(parent_id) = event.recurring_parent() else {
            return Ok(ParentLink::None);
        };

        let src = self.request.source_identity(parent_id);
        let found = self
            .writer
            .store
            .find(&src, &self.request.dst_account_email, &self.request.dst_calendar_id)
            .await
            .map_err(|e| e.at_stage(SyncStage::Store, event_subject(parent_id)))?;

        Ok(match found {
            Some(record) => ParentLink::Resolved(record),
            None => ParentLink::Unresolved { parent_id: parent_id.to_string() },
        })
    }

    /// Handle a `NotFound` from a write that referenced the series `parent`.
    ///
    /// The parent mapping is dropped only once the destination series is
    /// confirmed gone; a live series means the rejection concerns the event
    /// itself and `rejection` is reported as is. Fails permanently once the
    /// attempt budget is spent.
    async fn heal_stale_parent(
        &self,
        parent: &CorrelationRecord,
        attempt: u32,
        stage: SyncStage,
        event_id: &str,
        rejection: BackendError,
    ) -> Result<Step> {
        let writer = &self.writer;
        let lookup = writer
            .call(writer.destination.get_event(&parent.dst.calendar_id, &parent.dst.event_id))
            .await?;
        let series_gone = match lookup {
            Ok(series) => series.is_cancelled(),
            Err(err) if err.is_not_found() => true,
            Err(err) => return Err(CalMirrorError::from(err).at_stage(stage, event_subject(event_id))),
        };
        if !series_gone {
            debug!(event = event_id, dst_parent = %parent.dst.event_id, "sync.parent.live");
            return Err(CalMirrorError::from(rejection).at_stage(stage, event_subject(event_id)));
        }

        warn!(
            event = event_id,
            parent = %parent.src.event_id,
            dst_parent = %parent.dst.event_id,
            attempt,
            "sync.parent.stale"
        );
        writer
            .store
            .delete(parent)
            .await
            .map_err(|e| e.at_stage(SyncStage::Store, event_subject(&parent.src.event_id)))?;

        if attempt >= MAX_ATTEMPTS {
            return Err(CalMirrorError::StaleReference(format!(
                "destination series {} rejected after retry",
                parent.dst.event_id
            ))
            .at_stage(stage, event_subject(event_id)));
        }
        Ok(Step::RetryAfterHeal)
    }

    async fn create(&mut self, event: &CalendarEvent) -> Result<()> {
        if self.try_create(event, 1).await? == Step::RetryAfterHeal {
            self.try_create(event, MAX_ATTEMPTS).await?;
        }
        Ok(())
    }

    async fn try_create(&mut self, event: &CalendarEvent, attempt: u32) -> Result<Step> {
        let event_id = event.id_str();
        let parent = self.resolve_parent(event).await?;

        let dst_parent = match &parent {
            ParentLink::None => None,
            ParentLink::Resolved(record) => Some(record.dst.event_id.clone()),
            ParentLink::Unresolved { parent_id } => {
                info!(event = event_id, parent = %parent_id, attempt, "sync.event.deferred");
                self.summary.deferred += 1;
                return Ok(Step::Done);
            }
        };

        let mut payload = map_event(event, &self.request.mapping);
        payload.recurring_event_id = dst_parent;

        let writer = &self.writer;
        let result = writer
            .call(writer.destination.insert_event(&self.request.dst_calendar_id, &payload))
            .await?;

        let created = match result {
            Ok(created) => created,
            Err(err) if err.is_not_found() => {
                if let ParentLink::Resolved(record) = &parent {
                    return self
                        .heal_stale_parent(record, attempt, SyncStage::Create, event_id, err)
                        .await;
                }
                return Err(CalMirrorError::from(err).at_stage(SyncStage::Create, event_subject(event_id)));
            }
            Err(err) => {
                return Err(CalMirrorError::from(err).at_stage(SyncStage::Create, event_subject(event_id)))
            }
        };

        let dst_id = created.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            CalMirrorError::Internal("destination returned an event without id".to_string())
                .at_stage(SyncStage::Create, event_subject(event_id))
        })?;

        let record = CorrelationRecord::new(
            self.request.source_identity(event_id),
            self.request.destination_identity(&dst_id),
        );
        self.writer
            .store
            .insert(&record)
            .await
            .map_err(|e| e.at_stage(SyncStage::Store, event_subject(event_id)))?;

        info!(event = event_id, dst_event = %dst_id, "sync.event.created");
        self.summary.created += 1;
        Ok(Step::Done)
    }

    async fn update(&mut self, event: &CalendarEvent, record: &CorrelationRecord) -> Result<()> {
        if self.try_update(event, record, 1).await? == Step::RetryAfterHeal {
            self.try_update(event, record, MAX_ATTEMPTS).await?;
        }
        Ok(())
    }

    async fn try_update(
        &mut self,
        event: &CalendarEvent,
        record: &CorrelationRecord,
        attempt: u32,
    ) -> Result<Step> {
        let event_id = event.id_str();
        let parent = self.resolve_parent(event).await?;

        let dst_parent = match &parent {
            ParentLink::None => None,
            ParentLink::Resolved(series) => Some(series.dst.event_id.clone()),
            ParentLink::Unresolved { parent_id } if attempt < MAX_ATTEMPTS => {
                info!(event = event_id, parent = %parent_id, attempt, "sync.event.deferred");
                self.summary.deferred += 1;
                return Ok(Step::Done);
            }
            ParentLink::Unresolved { parent_id } => {
                return Err(CalMirrorError::StaleReference(format!(
                    "recurring parent {parent_id} has no destination series after healing"
                ))
                .at_stage(SyncStage::Update, event_subject(event_id)));
            }
        };

        let mut payload = map_event(event, &self.request.mapping);
        payload.recurring_event_id = dst_parent;

        let writer = &self.writer;
        let result = writer
            .call(writer.destination.update_event(
                &record.dst.calendar_id,
                &record.dst.event_id,
                &payload,
            ))
            .await?;

        match result {
            Ok(_) => {
                debug!(event = event_id, dst_event = %record.dst.event_id, "sync.event.updated");
                self.summary.updated += 1;
                Ok(Step::Done)
            }
            Err(err) if err.is_not_found() => match &parent {
                ParentLink::Resolved(series) => {
                    self.heal_stale_parent(series, attempt, SyncStage::Update, event_id, err).await
                }
                _ => {
                    warn!(
                        event = event_id,
                        dst_calendar = %record.dst.calendar_id,
                        dst_event = %record.dst.event_id,
                        "sync.mirror.missing"
                    );
                    Err(CalMirrorError::from(err)
                        .at_stage(SyncStage::Update, event_subject(event_id)))
                }
            },
            Err(err) => {
                Err(CalMirrorError::from(err).at_stage(SyncStage::Update, event_subject(event_id)))
            }
        }
    }

    /// Cancelled or excluded event without a record of its own: if it is an
    /// exception of a mirrored series, delete the matching destination
    /// occurrence.
    async fn remove_exception_instance(&mut self, event: &CalendarEvent) -> Result<()> {
        let event_id = event.id_str();
        let ParentLink::Resolved(parent) = self.resolve_parent(event).await? else {
            self.summary.skipped += 1;
            return Ok(());
        };
        let Some(original_start) =
            event.original_start_time.as_ref().and_then(EventDateTime::to_query_value)
        else {
            debug!(event = event_id, "sync.instance.no_original_start");
            self.summary.skipped += 1;
            return Ok(());
        };

        let subject = event_subject(event_id);
        let writer = &self.writer;
        let lookup = writer
            .call(writer.destination.find_instance(
                &parent.dst.calendar_id,
                &parent.dst.event_id,
                &original_start,
            ))
            .await?;

        let instance = match lookup {
            Ok(Some(instance)) if !instance.is_cancelled() => instance,
            Ok(_) => {
                self.summary.skipped += 1;
                return Ok(());
            }
            Err(err) if err.is_not_found() => {
                self.summary.skipped += 1;
                return Ok(());
            }
            Err(err) => {
                return Err(CalMirrorError::from(err).at_stage(SyncStage::DeleteInstance, subject))
            }
        };
        let Some(instance_id) = instance.id.as_deref().filter(|id| !id.is_empty()) else {
            self.summary.skipped += 1;
            return Ok(());
        };

        match writer.call(writer.destination.delete_event(&parent.dst.calendar_id, instance_id)).await? {
            Ok(()) => {
                info!(event = event_id, dst_instance = instance_id, "sync.instance.deleted");
                self.summary.deleted_instances += 1;
            }
            Err(err) if err.is_not_found() => self.summary.already_gone += 1,
            Err(err) => {
                return Err(CalMirrorError::from(err).at_stage(SyncStage::DeleteInstance, subject))
            }
        }
        Ok(())
    }
}
