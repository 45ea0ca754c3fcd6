//! Database connection manager backed by an r2d2 SQLite pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use calmirror_domain::{CalMirrorError, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::info;

use crate::errors::InfraError;
use crate::instance_lock::InstanceLock;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Pooled SQLite connection.
pub type SqliteConnection = PooledConnection<SqliteConnectionManager>;

/// Database manager owning the pool and the single-process lock.
///
/// The lock is taken before the database file is touched and released when
/// the manager is dropped.
pub struct DbManager {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
    _lock: InstanceLock,
}

impl DbManager {
    /// Lock and open the database at `db_path` with up to `pool_size`
    /// connections.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let lock = InstanceLock::acquire(InstanceLock::path_for(&path))?;

        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
        });
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(Duration::from_secs(10))
            .build(manager)
            .map_err(map_pool_error)?;

        info!(db_path = %path.display(), max_connections = pool.max_size(), "correlation_store.opened");

        Ok(Self { pool, path, _lock: lock })
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqliteConnection> {
        self.pool.get().map_err(map_pool_error)
    }

    /// Ensure the full schema exists on the current database.
    ///
    /// Refuses databases written by a newer schema.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify the database answers a trivial query.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0)).map_err(map_sql_error)?;
        Ok(())
    }
}

fn create_schema(conn: &SqliteConnection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;

    let found: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", params![], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .optional()
        .map_err(map_sql_error)?
        .flatten();
    if let Some(found) = found.filter(|v| *v > SCHEMA_VERSION) {
        return Err(CalMirrorError::Database(format!(
            "schema version mismatch (expected {SCHEMA_VERSION}, found {found})"
        )));
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

pub(crate) fn map_sql_error(err: rusqlite::Error) -> CalMirrorError {
    CalMirrorError::from(InfraError::from(err))
}

fn map_pool_error(err: r2d2::Error) -> CalMirrorError {
    CalMirrorError::from(InfraError::from(err))
}
