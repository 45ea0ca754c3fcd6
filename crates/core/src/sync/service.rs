//! Sync service - wires the connector to the engine

use std::sync::Arc;

use calmirror_domain::{CalMirrorError, CalendarInfo, Result, SyncRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::engine::{ClearSummary, SyncEngine, SyncSummary};
use super::ports::CalendarConnector;

/// Calendars of one authenticated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCalendars {
    pub account_email: String,
    pub calendars: Vec<CalendarInfo>,
}

/// Entry point for sync, clear and calendar listing.
pub struct SyncService {
    connector: Arc<dyn CalendarConnector>,
    engine: SyncEngine,
}

impl SyncService {
    /// Create a new sync service
    pub fn new(connector: Arc<dyn CalendarConnector>, engine: SyncEngine) -> Self {
        Self { connector, engine }
    }

    /// Run one sync pass for `request`.
    ///
    /// The request is validated before either account is connected.
    pub async fn sync(
        &self,
        request: &SyncRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncSummary> {
        SyncEngine::check_request(request)?;

        let source = self.connector.connect(&request.src_account_email).await?;
        let destination = self.connector.connect(&request.dst_account_email).await?;

        self.engine.run(request, source.as_ref(), destination.as_ref(), cancel).await
    }

    /// Remove everything previously mirrored into one destination calendar.
    pub async fn clear(
        &self,
        account_email: &str,
        calendar_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ClearSummary> {
        if account_email.trim().is_empty() || calendar_id.trim().is_empty() {
            return Err(CalMirrorError::Config(
                "account and calendar must be specified".to_string(),
            ));
        }

        let destination = self.connector.connect(account_email).await?;
        self.engine.clear(destination.as_ref(), account_email, calendar_id, cancel).await
    }

    /// Calendars of every authenticated account, deleted entries omitted.
    pub async fn calendars(&self) -> Result<Vec<AccountCalendars>> {
        let accounts = self.connector.accounts().await?;
        let mut listing = Vec::with_capacity(accounts.len());

        for account_email in accounts {
            let backend = self.connector.connect(&account_email).await?;
            let calendars: Vec<CalendarInfo> =
                backend.list_calendars().await?.into_iter().filter(|c| !c.deleted).collect();
            debug!(account = %account_email, count = calendars.len(), "calendars.listed");
            listing.push(AccountCalendars { account_email, calendars });
        }

        info!(accounts = listing.len(), "calendars.list.completed");
        Ok(listing)
    }
}
