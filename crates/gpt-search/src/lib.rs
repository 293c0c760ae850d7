//! Answer questions with a language model grounded in web search results.
//!
//! `gpt-search` asks a chat model which topics to search for, pulls one web
//! page per topic, squeezes the retrieved text under the model's context
//! ceiling, and asks the model for a final answer with citations. The hard
//! part is the middle step: the [`ContextReducer`](context::ContextReducer)
//! turns an unbounded amount of page text into a context that is guaranteed
//! to fit, first by cutting oversized pages and then by asking the model to
//! summarize them.
//!
//! Every expensive call (completion, search, page fetch) goes through the
//! [`cache`] layer, so re-running the same question replays stored results
//! instead of paying for them again.
//!
//! # Getting started
//!
//! ```ignore
//! use gpt_search::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SearchError> {
//!     let config = SearchConfig::default();
//!     let client = ChatClient::from_env(&config.api_url)?;
//!     let store = DiskStore::new(".cache")?;
//!     let search = DuckDuckGo::new()?;
//!     let fetcher = HttpFetcher::new()?;
//!
//!     let report = Pipeline::new(&client, &search, &fetcher, &store, &config)
//!         .run("What year did the Berlin Wall fall?")
//!         .await?;
//!     print!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | [`CallStore`](cache::CallStore) trait, [`memoize`](cache::memoize), disk and memory stores |
//! | [`context`] | Token estimation, the [`Background`](context::Background) map, truncation and summarization |
//! | [`web`] | Search provider, page fetcher, first-hit [`SourceResolver`](web::SourceResolver) |
//! | [`pipeline`] | [`Pipeline`](pipeline::Pipeline) orchestration, per-run [`Session`](pipeline::Session), report |
//! | [`config`] | [`SearchConfig`](config::SearchConfig) and [`ModelProfile`](config::ModelProfile) |

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod prelude;
pub mod web;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub use error::{Result, SearchError};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Environment variable holding the API credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unset optional fields are omitted from
/// serialization so the server applies its own defaults.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from [`ChatClient::chat()`].
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Language model seam ────────────────────────────────────────────

/// Boxed future returned by [`LanguageModel::complete`].
pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// A single-prompt completion service.
///
/// The pipeline only ever sends one user-role message and reads back one
/// text reply, so this is the whole contract. [`ChatClient`] is the HTTP
/// implementation; tests plug in scripted fakes.
pub trait LanguageModel: Send + Sync {
    fn complete<'a>(&'a self, model: &'a str, prompt: &'a str) -> LlmFuture<'a>;
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible chat completions endpoint.
pub struct ChatClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) url: String,
}

impl ChatClient {
    /// Create a client for the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_url(api_key, OPENAI_URL)
    }

    /// Create a client for a custom endpoint (proxies, compatible servers, tests).
    pub fn with_url(api_key: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("gpt-search/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| SearchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: url.into(),
        })
    }

    /// Create a client for `url`, reading the key from `OPENAI_API_KEY`.
    pub fn from_env(url: impl Into<String>) -> Result<Self> {
        let api_key =
            std::env::var(API_KEY_VAR).map_err(|_| SearchError::MissingCredential(API_KEY_VAR))?;
        Self::with_url(api_key, url)
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion> {
        debug!(
            "LLM request: model={}, messages={}",
            body.model,
            body.messages.len()
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SearchError::Request(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(SearchError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: RawChatResponse =
            serde_json::from_str(&text).map_err(|e| SearchError::Decode(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(SearchError::ApiMessage(err.message));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        match parsed.choices.and_then(|c| c.into_iter().next()) {
            Some(c) => Ok(ChatCompletion {
                content: c.message.content,
                usage: parsed.usage,
                finish_reason: c.finish_reason,
            }),
            None => {
                debug!("LLM output: empty (no choices)");
                Ok(ChatCompletion {
                    content: None,
                    usage: parsed.usage,
                    finish_reason: None,
                })
            }
        }
    }
}

impl LanguageModel for ChatClient {
    fn complete<'a>(&'a self, model: &'a str, prompt: &'a str) -> LlmFuture<'a> {
        Box::pin(async move {
            let body = ChatRequest {
                model: model.to_string(),
                messages: vec![Message::user(prompt)],
                ..Default::default()
            };
            let completion = self.chat(&body).await?;
            completion
                .content
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| SearchError::EmptyCompletion(model.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn chat_request_skips_unset_fields() {
        let req = ChatRequest {
            model: "gpt-3.5-turbo".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn complete_returns_first_choice_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "1989."},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 2, "total_tokens": 14}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ChatClient::with_url("sk-test", format!("{}/v1/chat/completions", server.uri()))
                .unwrap();
        let text = client
            .complete("gpt-3.5-turbo", "When did the wall fall?")
            .await
            .unwrap();
        assert_eq!(text, "1989.");
    }

    #[tokio::test]
    async fn http_error_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = ChatClient::with_url("sk-bad", server.uri()).unwrap();
        let err = client.complete("gpt-4", "anything at all").await.unwrap_err();
        match err {
            SearchError::Api { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_choices_is_an_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": []
            })))
            .mount(&server)
            .await;

        let client = ChatClient::with_url("sk-test", server.uri()).unwrap();
        let err = client.complete("gpt-4", "anything at all").await.unwrap_err();
        assert!(matches!(err, SearchError::EmptyCompletion(ref m) if m == "gpt-4"));
    }
}
