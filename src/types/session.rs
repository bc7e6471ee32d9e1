//! Session and batch-cache types
//!
//! - Session types: Session, SessionStatus
//! - Cache types: CacheEntry, CacheStatus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Types
// =============================================================================

/// One imported traffic session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Capture source, e.g. "har"
    pub source: String,
    /// User description of the scenario that produced the traffic
    pub scenario: String,
    pub host: String,
    pub log_count: usize,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Imported,
    Generating,
    Generated,
    /// At least one batch failed, the rest were merged
    PartialGenerated,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Imported => "imported",
            SessionStatus::Generating => "generating",
            SessionStatus::Generated => "generated",
            SessionStatus::PartialGenerated => "partial_generated",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "generating" => SessionStatus::Generating,
            "generated" => SessionStatus::Generated,
            "partial_generated" => SessionStatus::PartialGenerated,
            "failed" => SessionStatus::Failed,
            _ => SessionStatus::Imported,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cache Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Ok,
    Failed,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Ok => "ok",
            CacheStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ok" => CacheStatus::Ok,
            _ => CacheStatus::Failed,
        }
    }
}

/// Persisted outcome of one batch generation attempt.
///
/// Keyed by `(session_id, batch_index)`; stores replace on conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub session_id: String,
    pub batch_index: usize,
    pub batch_key: String,
    pub status: CacheStatus,
    /// Model output with code fences stripped (empty when failed)
    pub raw_output: String,
    /// Failure reason (empty when ok)
    pub error_message: String,
    pub model: String,
    /// Estimated prompt tokens sent for this batch
    pub tokens_used: usize,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn ok(
        session_id: impl Into<String>,
        batch_index: usize,
        batch_key: impl Into<String>,
        model: impl Into<String>,
        raw_output: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            batch_index,
            batch_key: batch_key.into(),
            status: CacheStatus::Ok,
            raw_output: raw_output.into(),
            error_message: String::new(),
            model: model.into(),
            tokens_used: 0,
            created_at: Utc::now(),
        }
    }

    pub fn failed(
        session_id: impl Into<String>,
        batch_index: usize,
        batch_key: impl Into<String>,
        model: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            batch_index,
            batch_key: batch_key.into(),
            status: CacheStatus::Failed,
            raw_output: String::new(),
            error_message: error_message.into(),
            model: model.into(),
            tokens_used: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_tokens_used(mut self, tokens: usize) -> Self {
        self.tokens_used = tokens;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == CacheStatus::Ok
    }
}
