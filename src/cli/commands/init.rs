//! Init Command
//!
//! Write the project config and create the session database.

use crate::config::{ConfigLoader, StorageConfig};
use crate::storage::Database;
use crate::types::Result;

pub fn run(force: bool) -> Result<()> {
    let config_path = ConfigLoader::init_project(force)?;

    let db_path = StorageConfig::default().db_path;
    Database::open(&db_path)?;

    println!("✓ Initialized apidoc in {}/", ConfigLoader::project_dir().display());
    println!("  Config:   {}", config_path.display());
    println!("  Database: {}", db_path.display());
    println!();
    println!("Next steps:");
    println!("  1. export APIDOC_LLM_API_KEY=...");
    println!("  2. apidoc generate --records traffic.json --scenario \"what the user did\"");

    Ok(())
}
