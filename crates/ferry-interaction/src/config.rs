//! Provider configuration.
//!
//! Credentials are read from `~/.config/ferry/secret.json` when present and
//! fall back to environment variables otherwise.

use ferry_core::{FerryError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

/// Environment variable that overrides the model of any provider.
pub const MODEL_ENV: &str = "FERRY_MODEL";

/// The generation backends FERRY knows how to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    Deepseek,
    Chatglm,
    Openai,
    Ollama,
}

impl ProviderKind {
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Deepseek => "deepseek-chat",
            ProviderKind::Chatglm => "glm-4-flash",
            ProviderKind::Openai => "gpt-4o",
            ProviderKind::Ollama => "deepseek-r1:7b",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Deepseek => "https://api.deepseek.com",
            ProviderKind::Chatglm => "https://open.bigmodel.cn/api/paas/v4",
            ProviderKind::Openai => "https://api.openai.com/v1",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    /// Environment variable holding the API key, or the host for Ollama.
    pub fn env_var(self) -> &'static str {
        match self {
            ProviderKind::Deepseek => "DEEPSEEK_KEY",
            ProviderKind::Chatglm => "CHATGLM_KEY",
            ProviderKind::Openai => "OPENAI_API_KEY",
            ProviderKind::Ollama => "OLLAMA_HOST",
        }
    }

    pub fn requires_key(self) -> bool {
        self != ProviderKind::Ollama
    }
}

/// Root structure of `secret.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretConfig {
    #[serde(default)]
    pub deepseek: Option<ApiKeyConfig>,
    #[serde(default)]
    pub chatglm: Option<ApiKeyConfig>,
    #[serde(default)]
    pub openai: Option<ApiKeyConfig>,
    #[serde(default)]
    pub ollama: Option<OllamaConfig>,
}

/// Settings of a key-authenticated provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyConfig {
    pub api_key: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Ollama settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
}

/// Everything needed to reach one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl ProviderConfig {
    /// Resolves the provider from `secret.json`, then from the environment.
    pub fn resolve(kind: ProviderKind) -> Result<Self> {
        match load_secret_config() {
            Ok(secret) => {
                if let Some(config) = Self::from_secret(kind, &secret) {
                    tracing::debug!(provider = %kind, "Using provider settings from secret.json");
                    return Ok(config);
                }
            }
            Err(e) => tracing::debug!("No usable secret.json: {}", e),
        }
        Self::from_lookup(kind, |name| env::var(name).ok())
    }

    /// Reads the provider section of an already loaded `secret.json`.
    pub fn from_secret(kind: ProviderKind, secret: &SecretConfig) -> Option<Self> {
        let (api_key, model, base_url) = match kind {
            ProviderKind::Deepseek => key_section(secret.deepseek.as_ref())?,
            ProviderKind::Chatglm => key_section(secret.chatglm.as_ref())?,
            ProviderKind::Openai => key_section(secret.openai.as_ref())?,
            ProviderKind::Ollama => {
                let ollama = secret.ollama.as_ref()?;
                (None, ollama.model_name.clone(), ollama.host.clone())
            }
        };
        Some(Self {
            kind,
            base_url: base_url.unwrap_or_else(|| kind.default_base_url().to_string()),
            api_key,
            model: model.unwrap_or_else(|| kind.default_model().to_string()),
        })
    }

    /// Builds the configuration from variables provided by `lookup`.
    pub fn from_lookup(kind: ProviderKind, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let model = lookup(MODEL_ENV)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_string());

        if kind.requires_key() {
            let api_key = lookup(kind.env_var())
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    FerryError::config(format!(
                        "{} not found in ~/.config/ferry/secret.json or environment variables",
                        kind.env_var()
                    ))
                })?;
            Ok(Self {
                kind,
                base_url: kind.default_base_url().to_string(),
                api_key: Some(api_key),
                model,
            })
        } else {
            Ok(Self {
                kind,
                base_url: lookup(kind.env_var())
                    .unwrap_or_else(|| kind.default_base_url().to_string()),
                api_key: None,
                model,
            })
        }
    }
}

fn key_section(
    section: Option<&ApiKeyConfig>,
) -> Option<(Option<String>, Option<String>, Option<String>)> {
    let section = section?;
    Some((
        Some(section.api_key.clone()),
        section.model_name.clone(),
        section.base_url.clone(),
    ))
}

/// Loads `~/.config/ferry/secret.json`.
pub fn load_secret_config() -> Result<SecretConfig> {
    load_secret_config_from(secret_config_path()?)
}

/// Loads a secret configuration file from an explicit path.
pub fn load_secret_config_from(path: impl AsRef<Path>) -> Result<SecretConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(FerryError::config(format!(
            "Configuration file not found at: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        FerryError::io(format!(
            "Failed to read configuration file at {}: {}",
            path.display(),
            e
        ))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        FerryError::config(format!(
            "Failed to parse configuration file at {}: {}",
            path.display(),
            e
        ))
    })
}

/// Returns the path to the secret file: ~/.config/ferry/secret.json
pub fn secret_config_path() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| FerryError::config("Could not determine home directory"))?;
    Ok(home.join(".config").join("ferry").join("secret.json"))
}
