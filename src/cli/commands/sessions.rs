//! Sessions Command
//!
//! List stored sessions, newest first.

use crate::cli::util::CommandContext;
use crate::storage::SessionStore;
use crate::types::Result;

pub fn run(ctx: &CommandContext, format: &str) -> Result<()> {
    let sessions = ctx.db.list_sessions()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    for session in &sessions {
        println!(
            "{}  {:<17}  {:>5} records  {}",
            session.id,
            session.status.as_str(),
            session.log_count,
            session.scenario
        );
    }

    Ok(())
}
