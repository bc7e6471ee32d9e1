//! Generate Command
//!
//! Run the generation pipeline over a JSON file of traffic records and print
//! the merged document.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::ai::ChatCompletionClient;
use crate::cli::util::{CommandContext, read_records};
use crate::generator::{GenerateRequest, Generator};
use crate::storage::SessionStore;
use crate::types::{ApiDocError, Result, Session, TrafficRecord};

/// Source label recorded for sessions created from a records file
const SOURCE_JSON: &str = "json";

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub records: PathBuf,
    pub scenario: Option<String>,
    pub session: Option<String>,
    pub output: Option<PathBuf>,
    pub no_cache: bool,
    pub resume: bool,
}

pub async fn run(ctx: CommandContext, options: GenerateOptions) -> Result<()> {
    ctx.config.validate_for_generate()?;

    let records = read_records(&options.records)?;
    let session = resolve_session(&ctx, &options, &records)?;
    let scenario = options
        .scenario
        .clone()
        .unwrap_or_else(|| session.scenario.clone());

    info!(session = %session.id, records = records.len(), "Generating documentation");

    let gateway = Arc::new(ChatCompletionClient::new(&ctx.config.llm)?);
    let generator = Generator::new(ctx.config.llm.clone(), gateway, ctx.db.clone())
        .with_progress(Arc::new(|message: &str| eprintln!("  {}", message)));

    let request = GenerateRequest::new(&session.id, scenario, records)
        .with_no_cache(options.no_cache)
        .with_resume(options.resume);
    let output = generator.generate(&request).await?;

    let json = serde_json::to_string_pretty(&output.document)?;
    match &options.output {
        Some(path) => {
            std::fs::write(path, &json)?;
            eprintln!("✓ Wrote {}", path.display());
        }
        None => println!("{}", json),
    }

    let report = &output.report;
    eprintln!(
        "✓ Session {} {}: {} endpoints, {}/{} batches ok ({} cached, {} called, {} failed)",
        report.session_id,
        report.status,
        output.document.endpoints.len(),
        report.succeeded(),
        report.batches,
        report.cache_hits,
        report.gateway_calls,
        report.failed_batches.len()
    );

    Ok(())
}

/// Reuse the named session, or create one for this records file
fn resolve_session(
    ctx: &CommandContext,
    options: &GenerateOptions,
    records: &[TrafficRecord],
) -> Result<Session> {
    if let Some(id) = &options.session {
        return ctx.db.get_session(id);
    }

    let scenario = options.scenario.as_deref().ok_or_else(|| {
        ApiDocError::Config("--scenario is required when no --session is given".to_string())
    })?;
    let host = records
        .iter()
        .map(|r| r.host.as_str())
        .find(|h| !h.is_empty())
        .unwrap_or_default();
    ctx.db
        .create_session(SOURCE_JSON, scenario, host, records.len())
}
