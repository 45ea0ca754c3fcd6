//! SQLite-backed correlation store
//!
//! Persists source-to-destination event id mappings across runs.

use std::sync::Arc;

use async_trait::async_trait;
use calmirror_core::sync::CorrelationStore;
use calmirror_domain::{
    correlation_key, CalMirrorError, CorrelationRecord, EventIdentity, Result as DomainResult,
};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;
use tracing::debug;

use super::manager::{map_sql_error, DbManager, SqliteConnection};

/// Correlation store over a [`DbManager`] pool
pub struct SqliteCorrelationStore {
    db: Arc<DbManager>,
}

impl SqliteCorrelationStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Lock, open and migrate the database at `db_path`.
    pub fn open<P: AsRef<std::path::Path>>(db_path: P, pool_size: u32) -> DomainResult<Self> {
        let db = DbManager::new(db_path, pool_size)?;
        db.run_migrations()?;
        Ok(Self::new(Arc::new(db)))
    }
}

#[async_trait]
impl CorrelationStore for SqliteCorrelationStore {
    async fn insert(&self, record: &CorrelationRecord) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let record = record.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            upsert_record(&conn, &record).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find(
        &self,
        src: &EventIdentity,
        dst_account_email: &str,
        dst_calendar_id: &str,
    ) -> DomainResult<Option<CorrelationRecord>> {
        let db = Arc::clone(&self.db);
        let key = correlation_key(src, dst_account_email, dst_calendar_id);

        task::spawn_blocking(move || -> DomainResult<Option<CorrelationRecord>> {
            let conn = db.get_connection()?;
            query_by_key(&conn, &key).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, record: &CorrelationRecord) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let key = record.key();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let removed = conn
                .execute("DELETE FROM correlations WHERE key = ?1", params![key])
                .map_err(map_sql_error)?;
            debug!(removed, "correlation_store.deleted");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_by_destination(
        &self,
        account_email: &str,
        calendar_id: &str,
    ) -> DomainResult<Vec<CorrelationRecord>> {
        let db = Arc::clone(&self.db);
        let account_email = account_email.to_string();
        let calendar_id = calendar_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<CorrelationRecord>> {
            let conn = db.get_connection()?;
            query_by_destination(&conn, &account_email, &calendar_id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

const SELECT_COLUMNS: &str =
    "SELECT src_account, src_calendar, src_event, dst_account, dst_calendar, dst_event
     FROM correlations";

fn upsert_record(conn: &SqliteConnection, record: &CorrelationRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO correlations
            (key, src_account, src_calendar, src_event, dst_account, dst_calendar, dst_event, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(key) DO UPDATE SET
            dst_account = excluded.dst_account,
            dst_calendar = excluded.dst_calendar,
            dst_event = excluded.dst_event,
            created_at = excluded.created_at",
        params![
            record.key(),
            &record.src.account_email,
            &record.src.calendar_id,
            &record.src.event_id,
            &record.dst.account_email,
            &record.dst.calendar_id,
            &record.dst.event_id,
            Utc::now().timestamp(),
        ],
    )?;
    Ok(())
}

fn query_by_key(conn: &SqliteConnection, key: &str) -> rusqlite::Result<Option<CorrelationRecord>> {
    let sql = format!("{SELECT_COLUMNS} WHERE key = ?1");
    conn.query_row(&sql, params![key], map_record_row).optional()
}

fn query_by_destination(
    conn: &SqliteConnection,
    account_email: &str,
    calendar_id: &str,
) -> rusqlite::Result<Vec<CorrelationRecord>> {
    let sql = format!("{SELECT_COLUMNS} WHERE dst_account = ?1 AND dst_calendar = ?2 ORDER BY seq ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![account_email, calendar_id], map_record_row)?;
    rows.collect()
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<CorrelationRecord> {
    Ok(CorrelationRecord::new(
        EventIdentity::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?),
        EventIdentity::new(row.get::<_, String>(3)?, row.get::<_, String>(4)?, row.get::<_, String>(5)?),
    ))
}

// ============================================================================
// Error Mapping
// ============================================================================

fn map_join_error(err: task::JoinError) -> CalMirrorError {
    CalMirrorError::Internal(format!("correlation store task failed: {err}"))
}
