//! apidoc - LLM-Driven API Documentation from Captured Traffic
//!
//! Turns a sequence of captured HTTP request/response records into a
//! structured API document by delegating analysis to a chat-completions
//! model.
//!
//! ## Core Features
//!
//! - **Token-Aware Batching**: records grouped by path prefix and packed
//!   under the model's token budget
//! - **Resumable Runs**: every batch outcome is cached per session; resumed
//!   runs only call the model for batches without a usable result
//! - **Partial Failure Tolerance**: failed batches are recorded and the rest
//!   merged
//! - **Resilient Gateway**: exponential backoff on transport errors, 429 and 5xx
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use apidoc::{ChatCompletionClient, Config, Database, GenerateRequest, Generator, SessionStore};
//!
//! let config = Config::default();
//! let db = Arc::new(Database::open(&config.storage.db_path)?);
//! let session = db.create_session("har", "user signs in", "api.example.com", records.len())?;
//! let gateway = Arc::new(ChatCompletionClient::new(&config.llm)?);
//! let generator = Generator::new(config.llm.clone(), gateway, db);
//! let output = generator
//!     .generate(&GenerateRequest::new(&session.id, "user signs in", records))
//!     .await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: token estimation, prompts, completion gateway, output validation
//! - [`generator`]: batch splitting, cache-aware orchestration, merge
//! - [`storage`]: session and batch-cache persistence
//! - [`config`]: layered configuration
//! - [`types`]: records, documents, sessions, errors

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod generator;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, LlmConfig};

// Error Types
pub use types::error::{ApiDocError, ErrorCategory, LlmError, Result, ResultExt};

// Data
pub use types::{GeneratedDocument, Session, SessionStatus, TrafficRecord};

// Storage
pub use storage::{Database, MemoryStore, SessionStore, SharedStore};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use ai::{ChatCompletionClient, CompletionGateway, SharedGateway};
pub use generator::{GenerateRequest, GenerationOutput, GenerationReport, Generator};
