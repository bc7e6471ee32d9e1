//! Chat-completions client
//!
//! One request per attempt against `{base_url}/chat/completions`:
//!
//! 1. POST `{model, max_tokens, temperature, messages}`
//! 2. 2xx: first choice's content, code fence stripped
//! 3. Transport failure, 429 or 5xx: wait and retry (429 honours `Retry-After`)
//! 4. Any other status, an undecodable body or zero choices: fail immediately
//!
//! Exhausted retries return the last error seen.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::CompletionGateway;
use super::retry::{RetryPolicy, Sleeper, TokioSleeper, parse_retry_after};
use super::transport::{HttpTransport, RawResponse, ReqwestTransport};
use crate::ai::validation::strip_code_fence;
use crate::config::LlmConfig;
use crate::types::{ErrorCategory, LlmError, Result};

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: ChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// Completion gateway over the chat-completions protocol
pub struct ChatCompletionClient {
    url: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    /// Never exposed in logs or debug output
    api_key: Option<SecretString>,
    transport: Arc<dyn HttpTransport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("policy", &self.policy)
            .finish()
    }
}

impl ChatCompletionClient {
    /// Client over reqwest with the configured timeout and tokio sleeping
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: &LlmConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            url: config.completions_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            api_key: config.api_key().map(|k| SecretString::from(k.to_string())),
            transport,
            sleeper: Arc::new(TokioSleeper),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn build_body(&self, system: &str, user: &str) -> std::result::Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        serde_json::to_string(&request)
            .map_err(|e| LlmError::new(ErrorCategory::Client, format!("encode request: {}", e)))
    }

    /// One HTTP exchange, classified
    async fn attempt(&self, body: &str) -> std::result::Result<String, LlmError> {
        let bearer = self.api_key.as_ref().map(|k| k.expose_secret());
        let response = self
            .transport
            .post_json(&self.url, bearer, body.to_string())
            .await?;
        interpret(response)
    }
}

/// Map an HTTP answer to model text or a categorized error
fn interpret(response: RawResponse) -> std::result::Result<String, LlmError> {
    if let Some(category) = ErrorCategory::from_status(response.status) {
        let mut err = LlmError::from_status(response.status, &response.body);
        if category == ErrorCategory::RateLimit
            && let Some(wait) = response.retry_after.as_deref().and_then(parse_retry_after)
        {
            err = err.retry_after(wait);
        }
        return Err(err);
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(&response.body)
        .map_err(|e| LlmError::malformed(format!("undecodable response body: {}", e)))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::malformed("no choices"))?;

    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl CompletionGateway for ChatCompletionClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> std::result::Result<String, LlmError> {
        let body = self.build_body(system, user)?;
        let mut delays = self.policy.backoff();
        let start = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            debug!(attempt, url = %self.url, bytes = body.len(), "Sending completion request");

            let err = match self.attempt(&body).await {
                Ok(content) => {
                    info!(
                        attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Completion succeeded"
                    );
                    return Ok(strip_code_fence(&content));
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                warn!(attempt, error = %err, "Completion failed, not retryable");
                return Err(err);
            }

            let Some(computed) = delays.next() else {
                warn!(attempt, error = %err, "Completion failed, retries exhausted");
                return Err(err);
            };

            let wait = self.policy.wait_for(&err, computed);
            warn!(
                attempt,
                wait_ms = wait.as_millis() as u64,
                category = %err.category,
                error = %err,
                "Completion failed, retrying"
            );
            self.sleeper.sleep(wait).await;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    type Answer = std::result::Result<RawResponse, LlmError>;

    #[derive(Debug, Clone)]
    struct SentRequest {
        url: String,
        bearer: Option<String>,
        body: String,
    }

    /// Plays back scripted answers in order and records each request
    #[derive(Default)]
    struct ScriptedTransport {
        answers: Mutex<VecDeque<Answer>>,
        sent: Mutex<Vec<SentRequest>>,
    }

    impl ScriptedTransport {
        fn new(answers: Vec<Answer>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn post_json(&self, url: &str, bearer: Option<&str>, body: String) -> Answer {
            self.sent.lock().unwrap().push(SentRequest {
                url: url.to_string(),
                bearer: bearer.map(str::to_string),
                body,
            });
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::transport("script exhausted")))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    fn ok_body(content: &str) -> RawResponse {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        });
        RawResponse::new(200, body.to_string())
    }

    fn client(
        transport: Arc<ScriptedTransport>,
        api_key: Option<&str>,
    ) -> (ChatCompletionClient, Arc<RecordingSleeper>) {
        let mut config = LlmConfig::for_endpoint("http://llm.local/v1/", "test-model");
        config.api_key = api_key.map(str::to_string);
        let sleeper = Arc::new(RecordingSleeper::default());
        let client =
            ChatCompletionClient::with_transport(&config, transport).with_sleeper(sleeper.clone());
        (client, sleeper)
    }

    #[tokio::test]
    async fn test_server_error_then_success_takes_two_attempts() {
        let transport = ScriptedTransport::new(vec![
            Ok(RawResponse::new(500, "oops")),
            Ok(ok_body("{\"scenario\":\"s\"}")),
        ]);
        let (client, sleeper) = client(transport.clone(), None);

        let content = client.complete("sys", "user").await.unwrap();
        assert_eq!(content, "{\"scenario\":\"s\"}");
        assert_eq!(transport.calls(), 2);
        assert_eq!(*sleeper.waits.lock().unwrap(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn test_rate_limit_waits_hinted_time() {
        let transport = ScriptedTransport::new(vec![
            Ok(RawResponse::new(429, "slow down").with_retry_after("5")),
            Ok(ok_body("{}")),
        ]);
        let (client, sleeper) = client(transport.clone(), None);

        client.complete("sys", "user").await.unwrap();
        assert_eq!(*sleeper.waits.lock().unwrap(), vec![Duration::from_secs(5)]);
    }

    #[tokio::test]
    async fn test_rate_limit_without_hint_uses_backoff() {
        let transport = ScriptedTransport::new(vec![
            Ok(RawResponse::new(429, "").with_retry_after("soon")),
            Ok(RawResponse::new(429, "")),
            Ok(ok_body("{}")),
        ]);
        let (client, sleeper) = client(transport.clone(), None);

        client.complete("sys", "user").await.unwrap();
        assert_eq!(
            *sleeper.waits.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(400, "bad request"))]);
        let (client, sleeper) = client(transport.clone(), None);

        let err = client.complete("sys", "user").await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Client);
        assert_eq!(err.status, Some(400));
        assert!(err.message.contains("bad request"));
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_error() {
        let transport = ScriptedTransport::new(vec![
            Ok(RawResponse::new(500, "first")),
            Ok(RawResponse::new(502, "second")),
            Err(LlmError::transport("reset")),
            Ok(RawResponse::new(503, "last")),
        ]);
        let (client, sleeper) = client(transport.clone(), None);

        let err = client.complete("sys", "user").await.unwrap_err();
        assert_eq!(transport.calls(), 4);
        assert_eq!(err.status, Some(503));
        assert!(err.message.contains("last"));
        assert_eq!(
            *sleeper.waits.lock().unwrap(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(LlmError::transport("request timed out")),
            Ok(ok_body("done")),
        ]);
        let (client, _) = client(transport.clone(), None);

        assert_eq!(client.complete("sys", "user").await.unwrap(), "done");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_choices_is_malformed() {
        let transport =
            ScriptedTransport::new(vec![Ok(RawResponse::new(200, "{\"choices\":[]}"))]);
        let (client, _) = client(transport.clone(), None);

        let err = client.complete("sys", "user").await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::MalformedResponse);
        assert_eq!(err.message, "no choices");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_malformed() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(200, "<html>"))]);
        let (client, _) = client(transport, None);

        let err = client.complete("sys", "user").await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::MalformedResponse);
    }

    #[tokio::test]
    async fn test_null_content_is_empty_string() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(200, body))]);
        let (client, _) = client(transport, None);

        assert_eq!(client.complete("sys", "user").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_fenced_content_is_stripped() {
        let transport = ScriptedTransport::new(vec![Ok(ok_body(
            "```json\n{\"scenario\":\"s\"}\n```",
        ))]);
        let (client, _) = client(transport, None);

        assert_eq!(
            client.complete("sys", "user").await.unwrap(),
            "{\"scenario\":\"s\"}"
        );
    }

    #[tokio::test]
    async fn test_request_shape_and_auth() {
        let transport = ScriptedTransport::new(vec![Ok(ok_body("{}")), Ok(ok_body("{}"))]);
        let (with_key, _) = client(transport.clone(), Some("sk-test"));
        with_key.complete("be terse", "document this").await.unwrap();

        let (without_key, _) = client(transport.clone(), None);
        without_key.complete("s", "u").await.unwrap();

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent[0].url, "http://llm.local/v1/chat/completions");
        assert_eq!(sent[0].bearer.as_deref(), Some("sk-test"));
        assert_eq!(sent[1].bearer, None);

        let body: serde_json::Value = serde_json::from_str(&sent[0].body).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be terse");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "document this");
    }

    #[test]
    fn test_debug_redacts_key() {
        let transport = ScriptedTransport::new(vec![]);
        let (client, _) = client(transport, Some("sk-secret"));
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
