//! Text-completion capability and its HTTP binding.
//!
//! [`CompletionBackend`] is the seam the pipeline depends on: one prompt
//! in, generated text out. [`LlmClient`] implements it over plain HTTP for
//! OpenAI (legacy completions and chat) and Anthropic. No agent framework,
//! no retries: a failed call is reported to the caller as-is.

use crate::config::LlmConfig;
use crate::types::error::{ChatError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

/// Completion API family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// OpenAI `/v1/completions` (instruct models)
    OpenAiCompletions,
    /// OpenAI `/v1/chat/completions`
    OpenAiChat,
    /// Anthropic `/v1/messages`
    Anthropic,
}

impl LlmProvider {
    /// Infer the provider from a model name.
    ///
    /// # Examples
    ///
    /// - "gpt-3.5-turbo-instruct" → OpenAiCompletions
    /// - "davinci-002" → OpenAiCompletions
    /// - "gpt-4o-mini" → OpenAiChat
    /// - "claude-3-5-haiku-latest" → Anthropic
    pub fn detect(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        if model.starts_with("claude") || model.starts_with("anthropic") {
            Self::Anthropic
        } else if model.ends_with("-instruct")
            || model.starts_with("text-")
            || model.starts_with("davinci")
            || model.starts_with("babbage")
        {
            Self::OpenAiCompletions
        } else {
            Self::OpenAiChat
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAiCompletions | Self::OpenAiChat => "OPENAI_API_KEY",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAiCompletions | Self::OpenAiChat => "https://api.openai.com",
        }
    }

    fn path(&self) -> &'static str {
        match self {
            Self::OpenAiCompletions => "/v1/completions",
            Self::OpenAiChat => "/v1/chat/completions",
            Self::Anthropic => "/v1/messages",
        }
    }
}

/// Decoding parameters for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Generation halts when this sequence is produced (it is not returned)
    pub stop: Option<String>,
}

impl DecodingParams {
    /// Fully deterministic decoding that stops at the first `;`.
    pub fn deterministic(max_tokens: u32) -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            max_tokens,
            stop: Some(";".to_string()),
        }
    }

    /// Sampled decoding without a stop sequence.
    pub fn sampled(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            top_p: 1.0,
            max_tokens,
            stop: None,
        }
    }
}

/// Single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub params: DecodingParams,
}

/// Completion call failure.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("empty completion")]
    Empty,
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, LlmError>;
}

/// OpenAI legacy completions response.
#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    choices: Vec<CompletionsChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionsChoice {
    text: String,
}

/// OpenAI chat completions response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Anthropic messages response.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP completion client.
///
/// Uses the reqwest defaults; no explicit timeout is configured.
pub struct LlmClient {
    api_key: String,
    model: String,
    provider: LlmProvider,
    base_url: String,
    client: Client,
}

impl LlmClient {
    /// Create client, detecting the provider from the model name.
    pub fn new(api_key: String, model: String) -> Self {
        let provider = LlmProvider::detect(&model);
        Self {
            api_key,
            model,
            provider,
            base_url: provider.default_base_url().to_string(),
            client: Client::new(),
        }
    }

    /// Override the detected provider (keeps a custom base URL).
    pub fn with_provider(mut self, provider: LlmProvider) -> Self {
        if self.base_url == self.provider.default_base_url() {
            self.base_url = provider.default_base_url().to_string();
        }
        self.provider = provider;
        self
    }

    /// Send requests to a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Config` if no API key is configured
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = config.resolved_provider();
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ChatError::Config(format!("{} environment variable not set", provider.api_key_var()))
            })?;

        let mut client = Self::new(api_key, config.model.clone()).with_provider(provider);
        if let Some(base_url) = &config.base_url {
            client = client.with_base_url(base_url.clone());
        }
        Ok(client)
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.provider.path())
    }

    /// Request body for the configured provider.
    fn request_body(&self, request: &CompletionRequest) -> JsonValue {
        let params = &request.params;
        let stop: Vec<&str> = params.stop.iter().map(String::as_str).collect();

        match self.provider {
            LlmProvider::OpenAiCompletions => {
                let mut body = json!({
                    "model": self.model,
                    "prompt": request.prompt,
                    "temperature": params.temperature,
                    "top_p": params.top_p,
                    "max_tokens": params.max_tokens,
                });
                if !stop.is_empty() {
                    body["stop"] = json!(stop);
                }
                body
            }
            LlmProvider::OpenAiChat => {
                let mut body = json!({
                    "model": self.model,
                    "messages": [
                        {"role": "user", "content": request.prompt}
                    ],
                    "temperature": params.temperature,
                    "top_p": params.top_p,
                    "max_tokens": params.max_tokens,
                });
                if !stop.is_empty() {
                    body["stop"] = json!(stop);
                }
                body
            }
            LlmProvider::Anthropic => {
                let mut body = json!({
                    "model": self.model,
                    "max_tokens": params.max_tokens,
                    "messages": [
                        {"role": "user", "content": request.prompt}
                    ],
                    "temperature": params.temperature,
                });
                // Anthropic rejects temperature and top_p together on newer models
                if params.top_p < 1.0 {
                    body["top_p"] = json!(params.top_p);
                }
                if !stop.is_empty() {
                    body["stop_sequences"] = json!(stop);
                }
                body
            }
        }
    }

    /// Pull the generated text out of a provider response body.
    fn extract_text(provider: LlmProvider, body: &str) -> std::result::Result<String, LlmError> {
        let text = match provider {
            LlmProvider::OpenAiCompletions => {
                let parsed: CompletionsResponse = serde_json::from_str(body)
                    .map_err(|e| LlmError::Malformed(format!("completions response: {}", e)))?;
                parsed.choices.into_iter().next().map(|c| c.text)
            }
            LlmProvider::OpenAiChat => {
                let parsed: ChatResponse = serde_json::from_str(body)
                    .map_err(|e| LlmError::Malformed(format!("chat response: {}", e)))?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
            }
            LlmProvider::Anthropic => {
                let parsed: AnthropicResponse = serde_json::from_str(body)
                    .map_err(|e| LlmError::Malformed(format!("messages response: {}", e)))?;
                parsed.content.into_iter().find_map(|c| c.text)
            }
        };

        text.ok_or(LlmError::Empty)
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, LlmError> {
        let mut http = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json");

        http = match self.provider {
            LlmProvider::Anthropic => http
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
            LlmProvider::OpenAiCompletions | LlmProvider::OpenAiChat => {
                http.header("Authorization", format!("Bearer {}", self.api_key))
            }
        };

        let response = http
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = Self::extract_text(self.provider, &body)?;
        tracing::debug!(model = %self.model, chars = text.len(), "Completion received");
        Ok(text)
    }
}
