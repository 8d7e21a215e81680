/*!
 * Ollama client for the local LLM server.
 *
 * Covers the three endpoints the proxy needs: `/api/chat` for translation,
 * `/api/tags` for the model picker, and `/api/pull` for installing a model
 * from the settings page.
 */

use std::time::Duration;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ProviderError;

/// Chat requests can run for minutes on modest hardware.
const CHAT_TIMEOUT: Duration = Duration::from_secs(300);

/// Shared HTTP client for provider calls
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(CHAT_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, or assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// Chat response from the Ollama API
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// One installed model as reported by `/api/tags`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Client for one Ollama server
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        OllamaClient {
            base_url: normalize_endpoint(base_url),
            client,
        }
    }

    /// Run one chat completion against `/api/chat`.
    pub async fn chat(
        &self,
        model: &str,
        system: &str,
        user: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            stream: false,
            options: ChatOptions { temperature: 0.3 },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(connection_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        // Non-streaming responses are a single JSON object; a misconfigured
        // server may still answer in JSONL, so fall back to concatenating
        // the streamed message fragments.
        match serde_json::from_str::<ChatResponse>(&body) {
            Ok(parsed) => Ok(parsed.message.content),
            Err(e) => {
                debug!("Ollama chat response was not a single object: {}", e);
                let mut content = String::new();
                for line in body.lines().filter(|line| !line.is_empty()) {
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                        if let Some(part) = value
                            .get("message")
                            .and_then(|m| m.get("content"))
                            .and_then(|c| c.as_str())
                        {
                            content.push_str(part);
                        }
                    }
                }
                if content.is_empty() {
                    Err(ProviderError::ParseError(format!(
                        "unparseable Ollama chat response: {}",
                        e
                    )))
                } else {
                    Ok(content)
                }
            }
        }
    }

    /// List installed models via `/api/tags`.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(connection_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: format!("listing models failed with status {}", status),
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(tags.models)
    }

    /// Pull a model via `/api/pull`. Blocks until the pull finishes, which
    /// is why callers run it on a background task.
    pub async fn pull_model(&self, name: &str) -> Result<(), ProviderError> {
        let url = format!("{}/api/pull", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "name": name, "stream": false }))
            .send()
            .await
            .map_err(connection_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: error_text,
            });
        }
        Ok(())
    }
}

/// Accept endpoints written as `host:port` as well as full URLs; the
/// Ollama default port applies when none is given.
fn normalize_endpoint(endpoint: &str) -> String {
    let with_scheme = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };

    match Url::parse(&with_scheme) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("localhost");
            let port = url.port().unwrap_or(11434);
            format!("{}://{}:{}", url.scheme(), host, port)
        }
        Err(e) => {
            warn!("Could not parse Ollama endpoint '{}': {}", endpoint, e);
            with_scheme.trim_end_matches('/').to_string()
        }
    }
}

fn connection_error(e: reqwest::Error) -> ProviderError {
    if e.is_connect() || e.is_timeout() {
        ProviderError::ConnectionError(e.to_string())
    } else {
        ProviderError::RequestFailed(e.to_string())
    }
}
