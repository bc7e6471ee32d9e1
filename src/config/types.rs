//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/apidoc/) and project (.apidoc/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{llm as llm_constants, network as net_constants};
use crate::types::{ApiDocError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM endpoint settings
    pub llm: LlmConfig,

    /// Session/cache store settings
    pub storage: StorageConfig,

    /// Logging settings
    pub log: LogConfig,
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ApiDocError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        self.llm.validate()
    }

    /// Validation for commands that call the completion endpoint
    pub fn validate_for_generate(&self) -> Result<()> {
        self.validate()?;
        if self.llm.api_key().is_none() {
            return Err(ApiDocError::Config(
                "llm.api_key cannot be empty (set APIDOC_LLM_API_KEY or edit the config file)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// Completion endpoint configuration.
///
/// Passed explicitly into the gateway and the generator. The API key is never
/// serialized and is redacted in debug output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model name
    pub model: String,

    /// Base URL; `/chat/completions` is appended
    pub base_url: String,

    /// Bearer credential
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Maximum output tokens, also the per-batch input budget (0 = unlimited)
    pub max_tokens: usize,

    /// Sampling temperature
    pub temperature: f32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: llm_constants::DEFAULT_MODEL.to_string(),
            base_url: llm_constants::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            max_tokens: llm_constants::DEFAULT_MAX_TOKENS,
            temperature: llm_constants::DEFAULT_TEMPERATURE,
            timeout_secs: net_constants::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    /// Configuration pointing at a custom endpoint, mostly for tests
    pub fn for_endpoint(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// The API key, if one is set and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full chat-completions URL
    pub fn completions_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            crate::constants::gateway::COMPLETIONS_PATH
        )
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ApiDocError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ApiDocError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ApiDocError::Config("LLM model cannot be empty".to_string()));
        }

        url::Url::parse(&self.base_url).map_err(|e| {
            ApiDocError::Config(format!("Invalid llm.base_url '{}': {}", self.base_url, e))
        })?;

        Ok(())
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path (relative paths resolve against the working directory)
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".apidoc/apidoc.db"),
        }
    }
}

// =============================================================================
// Log Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
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
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.llm.timeout_secs, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generate_requires_api_key() {
        let mut config = Config::default();
        assert!(config.validate_for_generate().is_err());

        config.llm.api_key = Some("   ".to_string());
        assert!(config.validate_for_generate().is_err());

        config.llm.api_key = Some("sk-test".to_string());
        assert!(config.validate_for_generate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut llm = LlmConfig::default();
        llm.temperature = 3.0;
        assert!(llm.validate().is_err());

        let mut llm = LlmConfig::default();
        llm.timeout_secs = 0;
        assert!(llm.validate().is_err());

        let llm = LlmConfig::for_endpoint("not a url", "gpt-4o");
        assert!(llm.validate().is_err());
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let llm = LlmConfig::for_endpoint("http://localhost:8080/v1/", "m");
        assert_eq!(llm.completions_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_api_key_never_serialized_or_printed() {
        let mut llm = LlmConfig::default();
        llm.api_key = Some("sk-secret".to_string());

        let toml = toml::to_string(&llm).unwrap();
        assert!(!toml.contains("sk-secret"));

        let debug = format!("{:?}", llm);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
