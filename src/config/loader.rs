//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/apidoc/config.toml)
//! 3. Project config (.apidoc/config.toml)
//! 4. Environment variables (APIDOC_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{ApiDocError, Result};

/// Top-level config sections reachable from the environment
const ENV_SECTIONS: &[&str] = &["llm", "storage", "log"];

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_from(
            Self::global_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Load with explicit global/project file locations
    pub fn load_from(global: Option<&Path>, project: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Merge global config
        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        // Merge project config
        if project.exists() {
            debug!("Loading project config from: {}", project.display());
            figment = figment.merge(Toml::file(project));
        }

        figment = Self::merge_env(figment);

        let config: Config = figment
            .extract()
            .map_err(|e| ApiDocError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file, then environment overrides
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(ApiDocError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::load_from(None, path)
    }

    /// Environment variables map section-first: `APIDOC_LLM_API_KEY` -> `llm.api_key`.
    ///
    /// Only the first underscore after the section separates levels, so field
    /// names keep their own underscores.
    fn merge_env(mut figment: Figment) -> Figment {
        for section in ENV_SECTIONS {
            let prefix = format!("APIDOC_{}_", section.to_uppercase());
            let section = section.to_string();
            figment = figment.merge(
                Env::prefixed(&prefix)
                    .map(move |key| format!("{}.{}", section, key.as_str()).into()),
            );
        }
        figment
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/apidoc/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("apidoc"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".apidoc")
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Write a default config file into `dir`; existing files are kept unless `force`
    pub fn init_in(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config_toml()?)?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Initialize project configuration (.apidoc/config.toml)
    pub fn init_project(force: bool) -> Result<PathBuf> {
        Self::init_in(&Self::project_dir(), force)
    }

    /// Render the effective configuration as TOML (API key omitted)
    pub fn render(config: &Config) -> Result<String> {
        toml::to_string_pretty(config).map_err(|e| ApiDocError::Config(e.to_string()))
    }

    fn default_config_toml() -> Result<String> {
        let body = Self::render(&Config::default())?;
        Ok(format!(
            "# apidoc configuration\n\
             # Set the API key here as llm.api_key, or export APIDOC_LLM_API_KEY.\n\n{}",
            body
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_without_files() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            ConfigLoader::load_from(None, &temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_project_file_overrides_global() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        let project = temp_dir.path().join("project.toml");
        fs::write(
            &global,
            "[llm]\nmax_tokens = 1000\nbase_url = \"http://global.local/v1\"\n",
        )
        .unwrap();
        fs::write(&project, "[llm]\nmax_tokens = 2000\n").unwrap();

        let config = ConfigLoader::load_from(Some(&global), &project).unwrap();
        assert_eq!(config.llm.max_tokens, 2000);
        assert_eq!(config.llm.base_url, "http://global.local/v1");
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path().join("config.toml");
        fs::write(&project, "[llm]\ntemperature = 9.5\n").unwrap();

        let err = ConfigLoader::load_from(None, &project).unwrap_err();
        assert!(matches!(err, ApiDocError::Config(_)));
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigLoader::init_in(temp_dir.path(), false).unwrap();
        assert!(path.exists());

        fs::write(&path, "[llm]\nmodel = \"custom\"\n").unwrap();
        ConfigLoader::init_in(temp_dir.path(), false).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("custom"));

        ConfigLoader::init_in(temp_dir.path(), true).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("model = \"gpt-4o\""));
        assert!(!written.contains("provider"));
        assert!(!written.contains("api_key ="));
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.llm.timeout_secs, 120);
    }

    #[test]
    fn test_env_override() {
        let temp_dir = TempDir::new().unwrap();
        // SAFETY: This test is the only one touching these variables
        unsafe {
            std::env::set_var("APIDOC_LLM_API_KEY", "sk-from-env");
            std::env::set_var("APIDOC_STORAGE_DB_PATH", "/tmp/apidoc-env.db");
        }
        let config = ConfigLoader::load_from(None, &temp_dir.path().join("none.toml")).unwrap();
        unsafe {
            std::env::remove_var("APIDOC_LLM_API_KEY");
            std::env::remove_var("APIDOC_STORAGE_DB_PATH");
        }
        assert_eq!(config.llm.api_key(), Some("sk-from-env"));
        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/apidoc-env.db"));
    }
}
