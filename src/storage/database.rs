//! Database Layer with Connection Pooling
//!
//! SQLite store for sessions and the per-batch LLM cache:
//! - Connection pooling via r2d2
//! - WAL mode for concurrent readers alongside one writer
//! - Insert-or-replace cache writes keyed by `(session_id, batch_index)`

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use super::{SessionStore, next_session_id, session_id_prefix};
use crate::types::{
    ApiDocError, CacheEntry, CacheStatus, Result, ResultExt, Session, SessionStatus,
    log_filter_error,
};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

/// Current schema version, stored in `user_version`
const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    scenario TEXT NOT NULL,
    host TEXT NOT NULL,
    log_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS llm_cache (
    session_id TEXT NOT NULL,
    batch_index INTEGER NOT NULL,
    batch_key TEXT NOT NULL,
    status TEXT NOT NULL,
    raw_output TEXT NOT NULL,
    model TEXT NOT NULL,
    tokens_used INTEGER NOT NULL,
    error_msg TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (session_id, batch_index)
);
"#;

const SESSION_COLUMNS: &str =
    "id, source, scenario, host, log_count, status, created_at, updated_at";

const CACHE_COLUMNS: &str =
    "session_id, batch_index, batch_key, status, raw_output, model, tokens_used, error_msg, created_at";

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 2;
    const MAX_POOL_SIZE: u32 = 8;

    /// One connection per core, clamped; generation writes sequentially
    pub fn auto() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(Self::MIN_POOL_SIZE);
        let max_size = cores.clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE);
        Self {
            max_size,
            min_idle: 1,
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open (and initialize) the database at `path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| {
                ApiDocError::Storage(format!("Failed to create connection pool: {}", e))
            })?;

        let db = Self { pool };
        db.initialize()?;
        debug!(path = %path.display(), "Opened database");
        Ok(db)
    }

    /// Open an initialized in-memory database for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();

        // A single connection, since every in-memory connection is its own database
        let pool = Pool::builder().max_size(1).build(manager).map_err(|e| {
            ApiDocError::Storage(format!("Failed to create in-memory pool: {}", e))
        })?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA wal_autocheckpoint = 1000;
            "#,
        )?;
        Ok(())
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            ApiDocError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Create tables if missing. Idempotent.
    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;
        Ok(())
    }

    /// Get a raw connection for advanced operations.
    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.conn()
    }

    /// Run `f` inside a transaction; commits on `Ok`, rolls back otherwise.
    fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;
        let value = f(&tx)?;
        tx.commit().with_context("Failed to commit transaction")?;
        Ok(value)
    }

    // =========================================================================
    // Row Mapping
    // =========================================================================

    fn map_session(row: &Row<'_>) -> rusqlite::Result<Session> {
        let status: String = row.get(5)?;
        Ok(Session {
            id: row.get(0)?,
            source: row.get(1)?,
            scenario: row.get(2)?,
            host: row.get(3)?,
            log_count: row.get::<_, i64>(4)? as usize,
            status: SessionStatus::parse(&status),
            created_at: parse_timestamp(6, row.get(6)?)?,
            updated_at: parse_timestamp(7, row.get(7)?)?,
        })
    }

    fn map_cache_entry(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
        let status: String = row.get(3)?;
        Ok(CacheEntry {
            session_id: row.get(0)?,
            batch_index: row.get::<_, i64>(1)? as usize,
            batch_key: row.get(2)?,
            status: CacheStatus::parse(&status),
            raw_output: row.get(4)?,
            model: row.get(5)?,
            tokens_used: row.get::<_, i64>(6)? as usize,
            error_message: row.get(7)?,
            created_at: parse_timestamp(8, row.get(8)?)?,
        })
    }

    fn query_cache(&self, sql: &str, session_id: &str) -> Result<Vec<CacheEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let entries = stmt
            .query_map(params![session_id], Self::map_cache_entry)?
            .filter_map(|r| log_filter_error(r, "loading cache entries"))
            .collect();
        Ok(entries)
    }
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

// =============================================================================
// SessionStore
// =============================================================================

impl SessionStore for Database {
    fn create_session(
        &self,
        source: &str,
        scenario: &str,
        host: &str,
        log_count: usize,
    ) -> Result<Session> {
        let now = Utc::now();
        self.transaction(|conn| {
            let pattern = format!("{}%", session_id_prefix(now));
            let mut stmt = conn.prepare("SELECT id FROM sessions WHERE id LIKE ?1")?;
            let taken: Vec<String> = stmt
                .query_map(params![pattern], |row| row.get(0))?
                .filter_map(|r| log_filter_error(r, "allocating session id"))
                .collect();

            let session = Session {
                id: next_session_id(now, taken.iter().map(String::as_str)),
                source: source.to_string(),
                scenario: scenario.to_string(),
                host: host.to_string(),
                log_count,
                status: SessionStatus::Imported,
                created_at: now,
                updated_at: now,
            };

            conn.execute(
                &format!(
                    "INSERT INTO sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    SESSION_COLUMNS
                ),
                params![
                    session.id,
                    session.source,
                    session.scenario,
                    session.host,
                    session.log_count as i64,
                    session.status.as_str(),
                    session.created_at.to_rfc3339(),
                    session.updated_at.to_rfc3339(),
                ],
            )
            .with_context("Failed to create session")?;

            debug!(session = %session.id, "Created session");
            Ok(session)
        })
    }

    fn get_session(&self, id: &str) -> Result<Session> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
            params![id],
            Self::map_session,
        )
        .optional()?
        .ok_or_else(|| ApiDocError::SessionNotFound(id.to_string()))
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions ORDER BY created_at DESC, id DESC",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map([], Self::map_session)?
            .filter_map(|r| log_filter_error(r, "listing sessions"))
            .collect();
        Ok(sessions)
    }

    fn set_status(&self, id: &str, status: SessionStatus) -> Result<()> {
        let affected = self
            .conn()?
            .execute(
                "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), Utc::now().to_rfc3339(), id],
            )
            .with_context("Failed to update session status")?;

        if affected == 0 {
            return Err(ApiDocError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    fn batch_caches(&self, session_id: &str) -> Result<Vec<CacheEntry>> {
        self.query_cache(
            &format!(
                "SELECT {} FROM llm_cache WHERE session_id = ?1 ORDER BY batch_index ASC",
                CACHE_COLUMNS
            ),
            session_id,
        )
    }

    fn upsert_batch_cache(&self, entry: &CacheEntry) -> Result<()> {
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO llm_cache ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(session_id, batch_index) DO UPDATE SET
                        batch_key = excluded.batch_key,
                        status = excluded.status,
                        raw_output = excluded.raw_output,
                        model = excluded.model,
                        tokens_used = excluded.tokens_used,
                        error_msg = excluded.error_msg,
                        created_at = excluded.created_at",
                    CACHE_COLUMNS
                ),
                params![
                    entry.session_id,
                    entry.batch_index as i64,
                    entry.batch_key,
                    entry.status.as_str(),
                    entry.raw_output,
                    entry.model,
                    entry.tokens_used as i64,
                    entry.error_message,
                    entry.created_at.to_rfc3339(),
                ],
            )
            .with_context_fn(|| {
                format!(
                    "Failed to write cache for {} batch {}",
                    entry.session_id, entry.batch_index
                )
            })?;
        Ok(())
    }

    fn failed_batches(&self, session_id: &str) -> Result<Vec<CacheEntry>> {
        self.query_cache(
            &format!(
                "SELECT {} FROM llm_cache WHERE session_id = ?1 AND status = 'failed'
                 ORDER BY batch_index ASC",
                CACHE_COLUMNS
            ),
            session_id,
        )
    }

    fn clear_batch_caches(&self, session_id: &str) -> Result<()> {
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM llm_cache WHERE session_id = ?1",
                params![session_id],
            )
            .with_context("Failed to clear batch caches")?;
        debug!(session = session_id, removed, "Cleared batch caches");
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        self.transaction(|conn| {
            conn.execute("DELETE FROM llm_cache WHERE session_id = ?1", params![id])?;
            let affected = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            if affected == 0 {
                return Err(ApiDocError::SessionNotFound(id.to_string()));
            }
            Ok(())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
