//! CLI Common Utilities
//!
//! Shared context for command handlers: loaded configuration plus the
//! session database it points at.

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::storage::{Database, SharedDatabase};
use crate::types::{ApiDocError, Result, ResultExt, TrafficRecord};

/// Command execution context
#[derive(Clone)]
pub struct CommandContext {
    /// Loaded configuration
    pub config: Config,
    /// Shared database handle
    pub db: SharedDatabase,
}

impl CommandContext {
    /// Open the database named by `config.storage.db_path`, creating it if needed
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.storage.db_path)?;
        Ok(Self {
            config,
            db: Arc::new(db),
        })
    }
}

/// Read a JSON array of traffic records
pub fn read_records(path: &Path) -> Result<Vec<TrafficRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context_fn(|| format!("Failed to read records from {}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| {
        ApiDocError::Config(format!(
            "{} is not a JSON array of traffic records: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.json");
        std::fs::write(
            &path,
            r#"[{"method":"GET","path":"/a","status_code":200},{"method":"POST","path":"/b"}]"#,
        )
        .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].method, "POST");

        std::fs::write(&path, "{\"method\":\"GET\"}").unwrap();
        assert!(matches!(read_records(&path), Err(ApiDocError::Config(_))));

        assert!(read_records(&temp_dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_open_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.db_path = temp_dir.path().join("data").join("apidoc.db");

        let ctx = CommandContext::open(config).unwrap();
        assert!(ctx.config.storage.db_path.exists());
    }
}
