//! Clean Command
//!
//! Remove a session, or only its cached batches.

use crate::cli::util::CommandContext;
use crate::storage::SessionStore;
use crate::types::Result;

pub fn run(ctx: &CommandContext, session_id: &str, cache_only: bool) -> Result<()> {
    if cache_only {
        // Surfaces SessionNotFound for typos
        ctx.db.get_session(session_id)?;
        ctx.db.clear_batch_caches(session_id)?;
        println!("✓ Cleared cached batches of {}", session_id);
        return Ok(());
    }

    ctx.db.delete_session(session_id)?;
    println!("✓ Removed session {}", session_id);
    Ok(())
}
