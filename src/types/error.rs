//! Unified Error Type System
//!
//! Centralized error types for the generation pipeline.
//! Completion-endpoint failures carry a category that drives the gateway's
//! retry decisions.
//!
//! ## Error Categories
//!
//! - **Transport**: Connection/network failure or timeout (retry with backoff)
//! - **RateLimit**: HTTP 429 (retry, server may hint the wait)
//! - **Server**: HTTP 5xx (retry with backoff)
//! - **Client**: Any other non-2xx status (fail the batch)
//! - **MalformedResponse**: Undecodable body or zero choices (fail the batch)
//! - **Parse**: Model text is not a valid document (fail the batch)

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories for completion-endpoint failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS, body read or timeout failure
    Transport,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    Server,
    /// Non-2xx status other than 429/5xx
    Client,
    /// Response body could not be decoded, or carried no choices
    MalformedResponse,
    /// Model output is not a valid document
    Parse,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "TRANSPORT"),
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Server => write!(f, "SERVER"),
            Self::Client => write!(f, "CLIENT"),
            Self::MalformedResponse => write!(f, "MALFORMED_RESPONSE"),
            Self::Parse => write!(f, "PARSE_ERROR"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is retried by the gateway
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport | Self::RateLimit | Self::Server)
    }

    /// Classify an HTTP status code. Returns `None` for 2xx.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            429 => Some(Self::RateLimit),
            500.. => Some(Self::Server),
            _ => Some(Self::Client),
        }
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Completion-endpoint error with category and retry hints
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category for retry decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// HTTP status, when the endpoint answered
    pub status: Option<u16>,
    /// Server-suggested wait before retry (429 `Retry-After`)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{}:{}] {}", self.category, status, self.message),
            None => write!(f, "[{}] {}", self.category, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    /// Create a new LLM error
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Transport, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::MalformedResponse, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Parse, message)
    }

    /// Create an error from a non-2xx HTTP answer
    pub fn from_status(status: u16, body: &str) -> Self {
        let category = ErrorCategory::from_status(status).unwrap_or(ErrorCategory::Client);
        Self {
            category,
            message: format!("llm error status {}: {}", status, body.trim()),
            status: Some(status),
            retry_after: None,
        }
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Check if the gateway should try again
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ApiDocError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // LLM Errors
    // -------------------------------------------------------------------------
    #[error("LLM error: {0}")]
    Llm(LlmError),

    // -------------------------------------------------------------------------
    // Generation Errors
    // -------------------------------------------------------------------------
    /// Every batch of a run failed; nothing to merge
    #[error("all batches failed ({batches} attempted)")]
    AllBatchesFailed { batches: usize },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<LlmError> for ApiDocError {
    fn from(err: LlmError) -> Self {
        ApiDocError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, ApiDocError>;

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| ApiDocError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| ApiDocError::Storage(format!("{}: {}", f().into(), e)))
    }
}

/// Log and drop a row-mapping error while collecting query results.
pub fn log_filter_error<T, E: std::fmt::Display>(
    result: std::result::Result<T, E>,
    what: &str,
) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Skipping row while {}: {}", what, e);
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::Transport.to_string(), "TRANSPORT");
        assert_eq!(ErrorCategory::Parse.to_string(), "PARSE_ERROR");
    }

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Transport.is_retryable());
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::Client.is_retryable());
        assert!(!ErrorCategory::MalformedResponse.is_retryable());
        assert!(!ErrorCategory::Parse.is_retryable());
    }

    #[test]
    fn test_classify_http_status() {
        assert_eq!(ErrorCategory::from_status(200), None);
        assert_eq!(ErrorCategory::from_status(204), None);
        assert_eq!(
            ErrorCategory::from_status(429),
            Some(ErrorCategory::RateLimit)
        );
        assert_eq!(ErrorCategory::from_status(500), Some(ErrorCategory::Server));
        assert_eq!(ErrorCategory::from_status(503), Some(ErrorCategory::Server));
        assert_eq!(ErrorCategory::from_status(400), Some(ErrorCategory::Client));
        assert_eq!(ErrorCategory::from_status(401), Some(ErrorCategory::Client));
        assert_eq!(ErrorCategory::from_status(302), Some(ErrorCategory::Client));
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::from_status(503, " overloaded \n");
        assert_eq!(err.to_string(), "[SERVER:503] llm error status 503: overloaded");

        let err = LlmError::transport("connection refused");
        assert_eq!(err.to_string(), "[TRANSPORT] connection refused");
    }

    #[test]
    fn test_all_batches_failed_message() {
        let err = ApiDocError::AllBatchesFailed { batches: 3 };
        assert!(err.to_string().contains("all batches failed"));
    }
}
