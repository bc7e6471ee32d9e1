//! Documentation Generator
//!
//! Drives traffic records through the model batch by batch and merges the
//! results into a single `GeneratedDocument`.
//!
//! ## Run
//!
//! 1. Mark the session `generating`; with `no_cache`, drop its cached batches
//! 2. Plan batches against the token budget
//! 3. Per batch, in order: reuse an `ok` cache entry when resuming, otherwise
//!    prompt the gateway, decode, and record the outcome in the cache
//! 4. Merge successful batches; the session ends `generated`,
//!    `partial_generated` or `failed`
//!
//! Batches run strictly one after another. A failed batch never aborts the
//! run; a failed cache write does.

pub mod batcher;
pub mod merge;

pub use batcher::{Batch, batch_key, path_prefix, plan_batches, split_batches};
pub use merge::merge_documents;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::ai::gateway::SharedGateway;
use crate::ai::prompt::{system_prompt, user_prompt};
use crate::ai::tokenizer::estimate_tokens;
use crate::ai::validation::decode_document;
use crate::config::LlmConfig;
use crate::storage::SharedStore;
use crate::types::{
    ApiDocError, CacheEntry, GeneratedDocument, LlmError, Result, SessionStatus, TrafficRecord,
};

/// Progress callback, invoked with short human-readable stage messages
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

// =============================================================================
// Request / Result
// =============================================================================

/// Inputs for one generation run
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub session_id: String,
    /// Scenario description given to the model and used for blank documents
    pub scenario: String,
    /// Sanitized records in capture order
    pub records: Vec<TrafficRecord>,
    /// Drop the session's cached batches before running
    pub no_cache: bool,
    /// Reuse `ok` cached batches instead of calling the model
    pub resume: bool,
}

impl GenerateRequest {
    pub fn new(
        session_id: impl Into<String>,
        scenario: impl Into<String>,
        records: Vec<TrafficRecord>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            scenario: scenario.into(),
            records,
            no_cache: false,
            resume: false,
        }
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }
}

/// What happened during a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub session_id: String,
    pub batches: usize,
    pub cache_hits: usize,
    pub gateway_calls: usize,
    /// Indices of batches that produced no document
    pub failed_batches: Vec<usize>,
    pub status: SessionStatus,
    pub elapsed_ms: u64,
}

impl GenerationReport {
    pub fn succeeded(&self) -> usize {
        self.batches - self.failed_batches.len()
    }
}

/// Merged document plus run report
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub document: GeneratedDocument,
    pub report: GenerationReport,
}

// =============================================================================
// Generator
// =============================================================================

/// Cache-aware orchestrator over a completion gateway and a session store
pub struct Generator {
    config: LlmConfig,
    gateway: SharedGateway,
    store: SharedStore,
    progress: Option<ProgressFn>,
}

impl Generator {
    pub fn new(config: LlmConfig, gateway: SharedGateway, store: SharedStore) -> Self {
        Self {
            config,
            gateway,
            store,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report_progress(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress(message);
        }
    }

    /// Run the pipeline for one session.
    ///
    /// Fails with `AllBatchesFailed` when no batch yields a document, and with
    /// a storage error when the session or its cache cannot be written.
    #[instrument(skip_all, fields(session = %request.session_id, records = request.records.len()))]
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerationOutput> {
        let start = Instant::now();
        let session_id = request.session_id.as_str();

        self.store.set_status(session_id, SessionStatus::Generating)?;

        if request.no_cache {
            self.report_progress("clearing cache");
            self.store.clear_batch_caches(session_id)?;
        }

        let batches = plan_batches(&request.records, self.config.max_tokens);
        if batches.len() > 1 {
            self.report_progress(&format!("split into {} batches", batches.len()));
        }
        info!(
            batches = batches.len(),
            max_tokens = self.config.max_tokens,
            resume = request.resume,
            no_cache = request.no_cache,
            "Starting generation"
        );

        let cached: HashMap<usize, CacheEntry> = if request.resume {
            self.store
                .batch_caches(session_id)?
                .into_iter()
                .map(|entry| (entry.batch_index, entry))
                .collect()
        } else {
            HashMap::new()
        };

        let mut report = GenerationReport {
            session_id: session_id.to_string(),
            batches: batches.len(),
            ..Default::default()
        };
        let mut documents: Vec<Option<GeneratedDocument>> = Vec::with_capacity(batches.len());
        let total = batches.len();

        for batch in &batches {
            let position = batch.index + 1;

            if let Some(entry) = cached.get(&batch.index).filter(|e| e.is_ok()) {
                match decode_cached(entry) {
                    Ok(doc) => {
                        self.report_progress(&format!(
                            "batch {}/{}: using cache",
                            position, total
                        ));
                        debug!(batch = batch.index, key = %batch.key, "Cache hit");
                        report.cache_hits += 1;
                        documents.push(Some(doc));
                        continue;
                    }
                    Err(reason) => {
                        warn!(
                            batch = batch.index,
                            reason = %reason,
                            "Cached output unusable, regenerating"
                        );
                    }
                }
            }

            self.report_progress(&format!("batch {}/{}: calling LLM", position, total));
            report.gateway_calls += 1;

            let user = user_prompt(&request.scenario, &batch.records);
            let tokens_used = estimate_tokens(system_prompt()) + estimate_tokens(&user);

            let entry = match self.run_batch(&request.scenario, &user).await {
                Ok((doc, raw)) => {
                    info!(
                        batch = batch.index,
                        key = %batch.key,
                        endpoints = doc.endpoints.len(),
                        "Batch generated"
                    );
                    documents.push(Some(doc));
                    CacheEntry::ok(session_id, batch.index, &batch.key, &self.config.model, raw)
                }
                Err(err) => {
                    warn!(batch = batch.index, key = %batch.key, error = %err, "Batch failed");
                    report.failed_batches.push(batch.index);
                    documents.push(None);
                    CacheEntry::failed(
                        session_id,
                        batch.index,
                        &batch.key,
                        &self.config.model,
                        err.to_string(),
                    )
                }
            };

            self.store
                .upsert_batch_cache(&entry.with_tokens_used(tokens_used))?;
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;

        if documents.iter().all(Option::is_none) {
            report.status = SessionStatus::Failed;
            if let Err(e) = self.store.set_status(session_id, SessionStatus::Failed) {
                warn!("Failed to mark session failed: {}", e);
            }
            warn!(batches = total, "All batches failed");
            return Err(ApiDocError::AllBatchesFailed { batches: total });
        }

        let document = merge_documents(documents.iter().map(Option::as_ref));

        report.status = if report.failed_batches.is_empty() {
            SessionStatus::Generated
        } else {
            SessionStatus::PartialGenerated
        };
        self.store.set_status(session_id, report.status)?;

        info!(
            status = %report.status,
            endpoints = document.endpoints.len(),
            cache_hits = report.cache_hits,
            gateway_calls = report.gateway_calls,
            failed = report.failed_batches.len(),
            elapsed_ms = report.elapsed_ms,
            "Generation finished"
        );

        Ok(GenerationOutput { document, report })
    }

    /// Prompt the gateway and decode its answer; returns the document and the
    /// raw text to cache.
    async fn run_batch(
        &self,
        scenario: &str,
        user: &str,
    ) -> std::result::Result<(GeneratedDocument, String), LlmError> {
        let raw = self.gateway.complete(system_prompt(), user).await?;
        let mut doc = decode_document(&raw)?;
        if doc.scenario.is_empty() {
            doc.scenario = scenario.to_string();
        }
        Ok((doc, raw))
    }
}

/// Decode an `ok` cache entry; empty or undecodable output is unusable
fn decode_cached(entry: &CacheEntry) -> std::result::Result<GeneratedDocument, String> {
    if entry.raw_output.trim().is_empty() {
        return Err("empty cache output".to_string());
    }
    decode_document(&entry.raw_output).map_err(|e| e.to_string())
}

// =============================================================================
// Tests
// =============================================================================
