/*!
 * Provider implementations for the translation backends.
 *
 * This module contains client implementations for the supported LLM
 * providers:
 * - Ollama: local LLM server
 * - OpenAI: OpenAI chat completions API
 *
 * The translation engine only sees the [`ChatProvider`] trait; tests swap in
 * mock implementations behind the same seam.
 */

pub mod ollama;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::app_settings::{ModelProvider, SettingsStore};
use crate::errors::ProviderError;
use ollama::OllamaClient;
use openai::OpenAiClient;

/// A chat-completion capability: one system prompt, one user prompt, one
/// text answer. Stateless; retries and timeouts are the implementation's
/// concern.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one chat completion and return the raw response text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Provider that re-reads the settings on every call and dispatches to the
/// configured backend, so a provider or model switch takes effect without a
/// restart.
pub struct ConfiguredProvider {
    settings: Arc<SettingsStore>,
    http: reqwest::Client,
}

impl ConfiguredProvider {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        ConfiguredProvider {
            settings,
            http: ollama::build_http_client(),
        }
    }
}

#[async_trait]
impl ChatProvider for ConfiguredProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let settings = self.settings.snapshot();
        match settings.model_provider {
            ModelProvider::Ollama => {
                if settings.ollama_model.is_empty() {
                    return Err(ProviderError::NotConfigured(
                        "no Ollama model selected".to_string(),
                    ));
                }
                let client = OllamaClient::new(&settings.ollama_base_url, self.http.clone());
                client.chat(&settings.ollama_model, system, user).await
            }
            ModelProvider::OpenAI => {
                if settings.open_ai_api_key.is_empty() {
                    return Err(ProviderError::NotConfigured(
                        "OpenAI API key is not set".to_string(),
                    ));
                }
                let client = OpenAiClient::new(&settings.open_ai_api_key, self.http.clone());
                client.chat(&settings.open_ai_model, system, user).await
            }
        }
    }

    fn name(&self) -> &str {
        "configured"
    }
}
