//! Status Command
//!
//! Show one session and the state of its cached batches.

use crate::cli::util::CommandContext;
use crate::storage::SessionStore;
use crate::types::Result;

pub fn run(ctx: &CommandContext, session_id: &str, format: &str) -> Result<()> {
    let session = ctx.db.get_session(session_id)?;
    let entries = ctx.db.batch_caches(session_id)?;

    if format == "json" {
        let status = serde_json::json!({
            "session": session,
            "batches": entries,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Session {}", session.id);
    println!("══════════════════════════════════════");
    println!("Status:   {}", session.status);
    println!("Scenario: {}", session.scenario);
    if !session.host.is_empty() {
        println!("Host:     {}", session.host);
    }
    println!("Records:  {}", session.log_count);
    println!("Updated:  {}", session.updated_at.to_rfc3339());
    println!();

    if entries.is_empty() {
        println!("No cached batches.");
        return Ok(());
    }

    println!("Batches:");
    for entry in &entries {
        if entry.is_ok() {
            println!(
                "  #{:<3} ok      {} (~{} tokens, {})",
                entry.batch_index, entry.batch_key, entry.tokens_used, entry.model
            );
        } else {
            println!(
                "  #{:<3} failed  {}: {}",
                entry.batch_index, entry.batch_key, entry.error_message
            );
        }
    }

    let failed = entries.iter().filter(|e| !e.is_ok()).count();
    if failed > 0 {
        println!();
        println!(
            "{} failed batch(es). Run 'apidoc generate --session {} --resume' to retry them.",
            failed, session.id
        );
    }

    Ok(())
}
