//! Completion Gateway
//!
//! Sends one system/user prompt pair to a chat-completions endpoint and
//! returns the model's text, retrying transient failures.
//!
//! ## Modules
//!
//! - `client`: `ChatCompletionClient`, the wire protocol and retry loop
//! - `retry`: `RetryPolicy` (exponential backoff) and the `Sleeper` seam
//! - `transport`: `HttpTransport` seam with the reqwest implementation

mod client;
mod retry;
mod transport;

pub use client::ChatCompletionClient;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use transport::{HttpTransport, RawResponse, ReqwestTransport};

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::LlmError;

/// Anything that turns a prompt pair into model text
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Returns the first choice's content with any code fence stripped
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Shared gateway handle
pub type SharedGateway = Arc<dyn CompletionGateway>;
