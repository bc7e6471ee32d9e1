//! In-memory session store
//!
//! DashMap-backed `SessionStore` with the same semantics as the SQLite
//! database. Cache entries live in a nested map keyed by batch index so reads
//! come back in index order.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{SessionStore, next_session_id};
use crate::types::{ApiDocError, CacheEntry, Result, Session, SessionStatus};

#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<String, Session>,
    caches: DashMap<String, BTreeMap<usize, CacheEntry>>,
    /// Serializes id allocation
    id_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn create_session(
        &self,
        source: &str,
        scenario: &str,
        host: &str,
        log_count: usize,
    ) -> Result<Session> {
        let _guard = self
            .id_lock
            .lock()
            .map_err(|_| ApiDocError::Storage("session id lock poisoned".to_string()))?;

        let now = Utc::now();
        let taken: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
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
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get_session(&self, id: &str) -> Result<Session> {
        self.sessions
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| ApiDocError::SessionNotFound(id.to_string()))
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.iter().map(|e| e.value().clone()).collect();
        sessions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(sessions)
    }

    fn set_status(&self, id: &str, status: SessionStatus) -> Result<()> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| ApiDocError::SessionNotFound(id.to_string()))?;
        session.status = status;
        session.updated_at = Utc::now();
        Ok(())
    }

    fn batch_caches(&self, session_id: &str) -> Result<Vec<CacheEntry>> {
        Ok(self
            .caches
            .get(session_id)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    fn upsert_batch_cache(&self, entry: &CacheEntry) -> Result<()> {
        self.caches
            .entry(entry.session_id.clone())
            .or_default()
            .insert(entry.batch_index, entry.clone());
        Ok(())
    }

    fn clear_batch_caches(&self, session_id: &str) -> Result<()> {
        self.caches.remove(session_id);
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        self.caches.remove(id);
        self.sessions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ApiDocError::SessionNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increment() {
        let store = MemoryStore::new();
        let a = store.create_session("har", "s", "h", 0).unwrap();
        let b = store.create_session("har", "s", "h", 0).unwrap();
        assert!(a.id.ends_with("_001"));
        assert!(b.id.ends_with("_002"));
    }

    #[test]
    fn test_cache_ordered_and_replaced() {
        let store = MemoryStore::new();
        let s = store.create_session("har", "s", "h", 0).unwrap();

        store
            .upsert_batch_cache(&CacheEntry::failed(&s.id, 2, "/c", "m", "x"))
            .unwrap();
        store
            .upsert_batch_cache(&CacheEntry::ok(&s.id, 0, "/a", "m", "{}"))
            .unwrap();
        store
            .upsert_batch_cache(&CacheEntry::ok(&s.id, 2, "/c", "m", "{}"))
            .unwrap();

        let entries = store.batch_caches(&s.id).unwrap();
        let indices: Vec<_> = entries.iter().map(|e| e.batch_index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert!(entries.iter().all(CacheEntry::is_ok));
        assert!(store.failed_batches(&s.id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_and_status() {
        let store = MemoryStore::new();
        let s = store.create_session("har", "s", "h", 0).unwrap();
        store.set_status(&s.id, SessionStatus::Failed).unwrap();
        assert_eq!(
            store.get_session(&s.id).unwrap().status,
            SessionStatus::Failed
        );

        store.delete_session(&s.id).unwrap();
        assert!(matches!(
            store.get_session(&s.id),
            Err(ApiDocError::SessionNotFound(_))
        ));
        assert!(store.set_status(&s.id, SessionStatus::Generated).is_err());
    }
}
