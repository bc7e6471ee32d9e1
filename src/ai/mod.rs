//! AI Integration Layer
//!
//! Everything between traffic records and model output:
//! token estimation, prompt building, the completion gateway and
//! output validation.

pub mod gateway;
pub mod prompt;
pub mod tokenizer;
pub mod validation;

pub use gateway::{
    ChatCompletionClient, CompletionGateway, HttpTransport, RawResponse, ReqwestTransport,
    RetryPolicy, SharedGateway, Sleeper, TokioSleeper,
};
pub use prompt::{system_prompt, user_prompt};
pub use tokenizer::{estimate_json, estimate_records, estimate_tokens, should_batch};
pub use validation::{decode_document, strip_code_fence};
