//! Session and batch-cache persistence
//!
//! `SessionStore` is the seam the generator writes through. Two
//! implementations ship:
//! - `Database`: SQLite behind an r2d2 pool (the CLI default)
//! - `MemoryStore`: DashMap-backed, for tests and embedding

pub mod database;
pub mod memory;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::types::{CacheEntry, Result, Session, SessionStatus};

/// Persistence operations used by the generation pipeline and the CLI.
///
/// Cache entries are unique per `(session_id, batch_index)`; upserting an
/// existing key replaces it. Implementations serialize writers internally.
pub trait SessionStore: Send + Sync {
    /// Create a session with a fresh `sess_YYYYMMDD_NNN` id and status `imported`
    fn create_session(
        &self,
        source: &str,
        scenario: &str,
        host: &str,
        log_count: usize,
    ) -> Result<Session>;

    /// Fails with `SessionNotFound` for unknown ids
    fn get_session(&self, id: &str) -> Result<Session>;

    /// All sessions, newest first
    fn list_sessions(&self) -> Result<Vec<Session>>;

    fn set_status(&self, id: &str, status: SessionStatus) -> Result<()>;

    /// All cache entries of a session, ordered by batch index
    fn batch_caches(&self, session_id: &str) -> Result<Vec<CacheEntry>>;

    fn upsert_batch_cache(&self, entry: &CacheEntry) -> Result<()>;

    /// Failed cache entries of a session, ordered by batch index
    fn failed_batches(&self, session_id: &str) -> Result<Vec<CacheEntry>> {
        Ok(self
            .batch_caches(session_id)?
            .into_iter()
            .filter(|e| !e.is_ok())
            .collect())
    }

    fn clear_batch_caches(&self, session_id: &str) -> Result<()>;

    /// Remove the session together with its cache entries
    fn delete_session(&self, id: &str) -> Result<()>;
}

/// Shared store handle
pub type SharedStore = Arc<dyn SessionStore>;

/// Next id for `now` given the ids already taken: `sess_YYYYMMDD_NNN`,
/// numbered one past the highest sequence seen that day.
pub(crate) fn next_session_id<'a>(
    now: DateTime<Utc>,
    existing: impl IntoIterator<Item = &'a str>,
) -> String {
    let prefix = session_id_prefix(now);
    let max_seq = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(&prefix))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:03}", prefix, max_seq + 1)
}

pub(crate) fn session_id_prefix(now: DateTime<Utc>) -> String {
    format!("sess_{}_", now.format("%Y%m%d"))
}
