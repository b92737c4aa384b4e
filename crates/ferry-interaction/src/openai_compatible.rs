//! OpenAiCompatibleGenerator - chat completions over the OpenAI wire format.
//!
//! DeepSeek, ChatGLM and OpenAI all speak this format; they differ only in
//! base URL, key and default model.

use crate::config::{ProviderConfig, ProviderKind};
use crate::prompt::PromptRenderer;
use crate::reply::parse_reply;
use async_trait::async_trait;
use ferry_core::{Draft, FerryError, GenerationRequest, ResponseGenerator, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const TEMPERATURE: f32 = 0.8;
const TOP_P: f32 = 0.95;

/// Generator that talks to an OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompatibleGenerator {
    client: Client,
    kind: ProviderKind,
    endpoint: String,
    api_key: String,
    model: String,
    renderer: PromptRenderer,
}

impl OpenAiCompatibleGenerator {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config.api_key.ok_or_else(|| {
            FerryError::config(format!("{} requires an API key", config.kind))
        })?;
        Ok(Self {
            client: Client::new(),
            kind: config.kind,
            endpoint: completions_url(&config.base_url),
            api_key,
            model: config.model,
            renderer: PromptRenderer::new(),
        })
    }

    /// Loads the provider from ~/.config/ferry/secret.json or environment variables.
    pub fn try_from_env(kind: ProviderKind) -> Result<Self> {
        Self::new(ProviderConfig::resolve(kind)?)
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_renderer(mut self, renderer: PromptRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    fn build_request(&self, request: &GenerationRequest) -> Result<ChatCompletionRequest> {
        Ok(ChatCompletionRequest {
            model: self.model.clone(),
            temperature: TEMPERATURE,
            top_p: TOP_P,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.renderer.system_prompt(request)?,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: self.renderer.user_message(request),
                },
            ],
        })
    }

    async fn send_request(&self, body: &ChatCompletionRequest) -> Result<String> {
        let provider = self.kind.to_string();
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| {
                FerryError::generation(
                    &provider,
                    format!("request failed: {err}"),
                    err.is_connect() || err.is_timeout(),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(&provider, status, body_text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            FerryError::generation(&provider, format!("failed to parse response: {err}"), false)
        })?;

        extract_text_response(&provider, parsed)
    }
}

#[async_trait]
impl ResponseGenerator for OpenAiCompatibleGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<Draft>> {
        let body = self.build_request(request)?;
        let raw = self.send_request(&body).await?;
        tracing::debug!(provider = %self.kind, model = %self.model, response = %raw, "Model replied");
        Ok(parse_reply(&raw, &request.persona))
    }

    fn name(&self) -> &str {
        match self.kind {
            ProviderKind::Deepseek => "deepseek",
            ProviderKind::Chatglm => "chatglm",
            ProviderKind::Openai => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    top_p: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn extract_text_response(provider: &str, response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| FerryError::generation(provider, "no content in the response", false))
}

fn map_http_error(provider: &str, status: StatusCode, body: String) -> FerryError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    let retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    FerryError::generation(provider, format!("HTTP {}: {}", status.as_u16(), message), retryable)
}
