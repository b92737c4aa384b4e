//! Generation backends for FERRY.
//!
//! Every backend implements [`ferry_core::ResponseGenerator`]. Network
//! backends render their prompt with [`PromptRenderer`] and post-process the
//! raw reply with [`reply::parse_reply`].

pub mod config;
pub mod ollama;
pub mod openai_compatible;
pub mod prompt;
pub mod reply;
pub mod scripted;

pub use config::{ProviderConfig, ProviderKind};
pub use ollama::OllamaGenerator;
pub use openai_compatible::OpenAiCompatibleGenerator;
pub use prompt::PromptRenderer;
pub use scripted::ScriptedGenerator;

use ferry_core::{ResponseGenerator, Result};
use std::sync::Arc;

/// Builds the generator for a resolved provider configuration.
pub fn build_generator(config: ProviderConfig) -> Result<Arc<dyn ResponseGenerator>> {
    tracing::info!(provider = %config.kind, model = %config.model, "Using generation backend");
    match config.kind {
        ProviderKind::Ollama => Ok(Arc::new(OllamaGenerator::from_config(config))),
        _ => Ok(Arc::new(OpenAiCompatibleGenerator::new(config)?)),
    }
}
