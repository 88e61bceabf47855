//! Chat completion client for OpenAI and Azure OpenAI.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{LlmError, LlmResult};
use super::prompt::normalize_whitespace;
use super::repair::parse_lenient;
use crate::settings::ProviderSettings;

/// Base URL used for OpenAI when no endpoint is configured.
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";

/// API version sent to Azure OpenAI deployments.
pub const AZURE_API_VERSION: &str = "2023-05-15";

/// Models rotated through for prompts that fit the small context window.
pub const SMALL_CONTEXT_MODELS: &[&str] = &["gpt-3.5-turbo-0301", "gpt-3.5-turbo-0613"];

/// Models used for prompts that need the large context window.
pub const LARGE_CONTEXT_MODELS: &[&str] = &["gpt-3.5-turbo-16k-0613"];

/// Rough characters-per-token ratio used for context estimation.
const CHARS_PER_TOKEN: usize = 4;

/// Token budget of the small context window.
const SMALL_CONTEXT_TOKENS: usize = 4_000;

/// Which hosted API the client talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Azure,
}

/// Context window a prompt needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSize {
    /// 4K tokens
    Small,
    /// 16K tokens
    Large,
}

/// Length of `text` as the provider's character heuristics count it: UTF-16
/// code units, so a character outside the Basic Multilingual Plane counts
/// twice.
pub fn text_length(text: &str) -> usize {
    text.encode_utf16().count()
}

impl ContextSize {
    /// Estimates the window needed for `prompt_chars` characters of prompt
    /// plus `max_tokens` tokens of completion.
    pub fn estimate(prompt_chars: usize, max_tokens: u32) -> Self {
        let response_chars = max_tokens as usize * CHARS_PER_TOKEN;
        if prompt_chars + response_chars < SMALL_CONTEXT_TOKENS * CHARS_PER_TOKEN {
            ContextSize::Small
        } else {
            ContextSize::Large
        }
    }

    /// Models available for this window.
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            ContextSize::Small => SMALL_CONTEXT_MODELS,
            ContextSize::Large => LARGE_CONTEXT_MODELS,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContextSize::Small => "4K",
            ContextSize::Large => "16K",
        }
    }
}

/// Measurements recorded for one completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub prompt_chars: usize,
    pub completion_chars: usize,
    pub latency_millis: u64,
    pub model_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// Parsed model answer plus analytics.
///
/// `response` is `None` when the model returned nothing or something that
/// could not be recovered as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub response: Option<Value>,
    pub analytics: Analytics,
}

/// Anything that can turn a prompt into a [`Completion`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> LlmResult<Completion>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

/// HTTP client for the chat completion API.
///
/// Requests rotate round-robin through the models of the estimated context
/// window, spreading load across per-model rate limits.
#[derive(Debug)]
pub struct LlmClient {
    settings: ProviderSettings,
    http: reqwest::Client,
    rotation: AtomicUsize,
}

impl LlmClient {
    /// Creates a client with a default HTTP client.
    pub fn new(settings: ProviderSettings) -> LlmResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("simple-llm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_http_client(settings, http)
    }

    /// Creates a client around an existing HTTP client.
    pub fn with_http_client(settings: ProviderSettings, http: reqwest::Client) -> LlmResult<Self> {
        if settings.kind == Provider::Azure && settings.endpoint.is_none() {
            return Err(LlmError::MissingEndpoint);
        }
        Ok(Self {
            settings,
            http,
            rotation: AtomicUsize::new(0),
        })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Picks the next model for `size`.
    pub fn next_model(&self, size: ContextSize) -> &'static str {
        let models = size.models();
        if models.len() == 1 {
            return models[0];
        }
        let turn = self.rotation.fetch_add(1, Ordering::Relaxed);
        models[turn % models.len()]
    }

    fn url(&self, model: &str) -> String {
        let endpoint = self
            .settings
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_ENDPOINT)
            .trim_end_matches('/');
        match self.settings.kind {
            Provider::OpenAi => format!("{}/v1/chat/completions", endpoint),
            Provider::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, model, AZURE_API_VERSION
            ),
        }
    }

    /// Sends `prompt` as a single user message and parses the answer.
    pub async fn complete(&self, prompt: &str) -> LlmResult<Completion> {
        let started = Instant::now();
        let prompt_chars = text_length(prompt);
        let content = normalize_whitespace(prompt);
        let size = ContextSize::estimate(prompt_chars, self.settings.max_tokens);
        let model = self.next_model(size);

        let body = ChatRequest {
            model: (self.settings.kind == Provider::OpenAi).then_some(model),
            messages: vec![ChatMessage {
                role: "user",
                content: &content,
            }],
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            max_tokens: self.settings.max_tokens,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        debug!(model, context = size.label(), prompt_chars, "sending chat completion");

        let request = self.http.post(self.url(model)).json(&body);
        let request = match self.settings.kind {
            Provider::OpenAi => request.bearer_auth(&self.settings.api_key),
            Provider::Azure => request.header("api-key", &self.settings.api_key),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&response.text().await?)?;
        let latency_millis = started.elapsed().as_millis() as u64;

        let text = parsed
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.and_then(|message| message.content))
            .collect::<Vec<_>>()
            .join(" ");

        let analytics = Analytics {
            prompt_chars,
            completion_chars: text_length(&text),
            latency_millis,
            model_id: model.to_string(),
            prompt_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
            completion_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
            total_tokens: parsed.usage.as_ref().and_then(|u| u.total_tokens),
        };

        debug!(
            model,
            latency_millis,
            completion_chars = analytics.completion_chars,
            "chat completion received"
        );

        if text.is_empty() {
            return Ok(Completion {
                response: None,
                analytics,
            });
        }

        let response = match parse_lenient(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(model, error = %err, completion = %text, "discarding unparseable completion");
                None
            }
        };

        Ok(Completion {
            response,
            analytics,
        })
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(&self, prompt: &str) -> LlmResult<Completion> {
        LlmClient::complete(self, prompt).await
    }
}
