//! OllamaGenerator - local models served by Ollama.

use crate::config::{ProviderConfig, ProviderKind};
use crate::prompt::PromptRenderer;
use crate::reply::parse_reply;
use async_trait::async_trait;
use ferry_core::{Draft, FerryError, GenerationRequest, ResponseGenerator, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Generator backed by the Ollama `/api/chat` endpoint (non-streaming).
pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    model: String,
    renderer: PromptRenderer,
}

impl OllamaGenerator {
    pub fn new(host: impl AsRef<str>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/api/chat", host.as_ref().trim_end_matches('/')),
            model: model.into(),
            renderer: PromptRenderer::new(),
        }
    }

    pub fn from_config(config: ProviderConfig) -> Self {
        Self::new(config.base_url, config.model)
    }

    /// Loads the host and model from ~/.config/ferry/secret.json or environment variables.
    pub fn try_from_env() -> Result<Self> {
        Ok(Self::from_config(ProviderConfig::resolve(ProviderKind::Ollama)?))
    }

    pub fn with_renderer(mut self, renderer: PromptRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    fn build_request(&self, request: &GenerationRequest) -> Result<OllamaChatRequest> {
        Ok(OllamaChatRequest {
            model: self.model.clone(),
            stream: false,
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: self.renderer.system_prompt(request)?,
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: self.renderer.user_message(request),
                },
            ],
        })
    }
}

#[async_trait]
impl ResponseGenerator for OllamaGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<Draft>> {
        let body = self.build_request(request)?;
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                FerryError::generation(
                    "ollama",
                    format!("request failed: {err}"),
                    err.is_connect() || err.is_timeout(),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            return Err(FerryError::generation(
                "ollama",
                format!("HTTP {}: {}", status.as_u16(), body_text),
                status.is_server_error(),
            ));
        }

        let parsed: OllamaChatResponse = response.json().await.map_err(|err| {
            FerryError::generation("ollama", format!("failed to parse response: {err}"), false)
        })?;

        tracing::debug!(model = %self.model, response = %parsed.message.content, "Model replied");
        Ok(parse_reply(&parsed.message.content, &request.persona))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    stream: bool,
    messages: Vec<OllamaMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}
