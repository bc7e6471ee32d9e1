//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Completion gateway constants
pub mod gateway {
    /// Maximum retries after the first attempt
    pub const MAX_RETRIES: usize = 3;

    /// First backoff delay (seconds); doubles on every retry
    pub const BASE_DELAY_SECS: u64 = 1;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Upper bound for a single computed backoff delay (seconds)
    pub const MAX_DELAY_SECS: u64 = 60;

    /// Path appended to the configured base URL
    pub const COMPLETIONS_PATH: &str = "/chat/completions";
}

/// Batching constants
pub mod batching {
    /// Number of leading path segments forming a group key
    pub const PREFIX_SEGMENTS: usize = 3;

    /// Group key for paths without segments
    pub const ROOT_KEY: &str = "/";

    /// Batch key when records span several groups
    pub const MIXED_KEY: &str = "mixed";

    /// Batch key for a batch without records
    pub const EMPTY_KEY: &str = "empty";
}

/// Prompt size controls
pub mod prompt {
    /// Batches larger than this keep one record per distinct path
    pub const DEDUP_THRESHOLD: usize = 30;

    /// Request bodies longer than this (bytes) are shallow-truncated
    pub const MAX_BODY_BYTES: usize = 2000;

    /// String values longer than this (bytes) are truncated in large bodies
    pub const MAX_STRING_BYTES: usize = 200;

    /// Placeholder for truncated values
    pub const TRUNCATED: &str = "[truncated]";
}

/// HTTP/Network constants
pub mod network {
    /// Default LLM request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

/// LLM defaults
pub mod llm {
    pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &str = "gpt-4o";
    pub const DEFAULT_MAX_TOKENS: usize = 4096;
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;
}
