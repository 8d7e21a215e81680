/*!
 * OpenSubtitles.com REST client.
 *
 * The proxy fetches English subtitles from the real catalog and serves the
 * translated result under its own surface. The bearer token is obtained on
 * first use and cached for the process lifetime; a 401 triggers one
 * re-login and retry.
 */

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, info, warn};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::app_settings::SettingsStore;
use crate::errors::AppError;

const DEFAULT_BASE_URL: &str = "https://api.opensubtitles.com/api/v1";
const USER_AGENT: &str = "subrelay v1.0";

/// Search filters accepted by the catalog
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub movie_hash: Option<String>,
    pub page: Option<u32>,
}

/// Result of downloading one subtitle file
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Raw subtitle content (SRT or VTT)
    pub content: String,
    /// File name suggested by the catalog
    pub file_name: String,
}

/// The external subtitle catalog, reduced to the two calls the proxy makes.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Search for English subtitles; returns the catalog's raw paged
    /// response document.
    async fn search(&self, query: &SearchQuery) -> Result<Value, AppError>;

    /// Resolve a download link for a file id and fetch the content.
    async fn download(&self, file_id: i64) -> Result<DownloadResult, AppError>;
}

/// reqwest-backed client for the real OpenSubtitles API
pub struct OpenSubtitlesClient {
    base_url: String,
    settings: Arc<SettingsStore>,
    client: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl OpenSubtitlesClient {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self::with_base_url(settings, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(settings: Arc<SettingsStore>, base_url: &str) -> Self {
        OpenSubtitlesClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            token: Mutex::new(None),
        }
    }

    /// Authenticate and cache the bearer token.
    async fn login(&self) -> Result<String, AppError> {
        let settings = self.settings.snapshot();
        if settings.open_subtitles_username.is_empty() {
            return Err(AppError::NotConfigured(
                "OpenSubtitles username is not set".to_string(),
            ));
        }
        info!(
            "Logging in to OpenSubtitles as user: {}",
            settings.open_subtitles_username
        );

        let response = self
            .client
            .post(format!("{}/login", self.base_url))
            .header("Api-Key", &settings.open_subtitles_api_key)
            .header("Accept", "application/json")
            .json(&json!({
                "username": settings.open_subtitles_username,
                "password": settings.open_subtitles_password,
            }))
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("OpenSubtitles login failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("OpenSubtitles login parse failed: {}", e)))?;
        if !status.is_success() {
            error!("OpenSubtitles login rejected ({}): {}", status, body);
            return Err(AppError::UpstreamUnavailable(format!(
                "OpenSubtitles login rejected with status {}",
                status
            )));
        }

        let token = body
            .get("token")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        if token.is_empty() {
            return Err(AppError::UpstreamUnavailable(
                "OpenSubtitles login returned no token".to_string(),
            ));
        }

        info!("Successfully logged in to OpenSubtitles");
        *self.token.lock().await = Some(token.clone());
        Ok(token)
    }

    async fn ensure_token(&self) -> Result<Option<String>, AppError> {
        if let Some(token) = self.token.lock().await.clone() {
            return Ok(Some(token));
        }
        // Anonymous search works with only the API key; login is attempted
        // when credentials exist.
        let settings = self.settings.snapshot();
        if settings.open_subtitles_username.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.login().await?))
    }

    /// Run an authenticated request; on a 401, re-login once and retry.
    async fn send_authed(
        &self,
        build: impl Fn(Option<&str>) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AppError> {
        let token = self.ensure_token().await?;
        let response = build(token.as_deref())
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("OpenSubtitles request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!("OpenSubtitles token rejected, re-authenticating");
            *self.token.lock().await = None;
            let token = self.login().await?;
            return build(Some(&token))
                .send()
                .await
                .map_err(|e| AppError::UpstreamUnavailable(format!("OpenSubtitles retry failed: {}", e)));
        }
        Ok(response)
    }

    fn apply_headers(
        &self,
        builder: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let settings = self.settings.snapshot();
        let mut builder = builder
            .header("Accept", "application/json")
            .header("Api-Key", settings.open_subtitles_api_key);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

#[async_trait]
impl Catalog for OpenSubtitlesClient {
    async fn search(&self, query: &SearchQuery) -> Result<Value, AppError> {
        let mut params: Vec<(String, String)> = vec![("languages".to_string(), "en".to_string())];
        if let Some(q) = &query.query {
            if !q.is_empty() {
                params.push(("query".to_string(), q.clone()));
            }
        }
        if let Some(imdb) = &query.imdb_id {
            if !imdb.is_empty() {
                params.push(("imdb_id".to_string(), imdb.replace("tt", "")));
            }
        }
        if let Some(tmdb) = &query.tmdb_id {
            if !tmdb.is_empty() {
                params.push(("tmdb_id".to_string(), tmdb.clone()));
            }
        }
        if let Some(hash) = &query.movie_hash {
            if !hash.is_empty() {
                params.push(("moviehash".to_string(), hash.clone()));
            }
        }
        if let Some(page) = query.page {
            if page > 0 {
                params.push(("page".to_string(), page.to_string()));
            }
        }

        info!("Searching OpenSubtitles: {:?}", params);
        let url = format!("{}/subtitles", self.base_url);
        let response = self
            .send_authed(|token| {
                self.apply_headers(self.client.get(&url).query(&params), token)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "OpenSubtitles search failed with status {}",
                status
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("OpenSubtitles search parse failed: {}", e)))
    }

    async fn download(&self, file_id: i64) -> Result<DownloadResult, AppError> {
        info!("Requesting download link for file_id: {}", file_id);
        let url = format!("{}/download", self.base_url);
        let response = self
            .send_authed(|token| {
                self.apply_headers(
                    self.client.post(&url).json(&json!({ "file_id": file_id })),
                    token,
                )
            })
            .await?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("OpenSubtitles download parse failed: {}", e)))?;
        if !status.is_success() {
            error!("OpenSubtitles download rejected ({}): {}", status, body);
            return Err(AppError::UpstreamUnavailable(format!(
                "OpenSubtitles download rejected with status {}",
                status
            )));
        }

        let link = body
            .get("link")
            .and_then(|l| l.as_str())
            .unwrap_or_default()
            .to_string();
        if link.is_empty() {
            return Err(AppError::UpstreamUnavailable(
                "no download link in OpenSubtitles response".to_string(),
            ));
        }
        let file_name = body
            .get("file_name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();

        info!("Downloading subtitle '{}' from catalog", file_name);
        let content = self
            .client
            .get(&link)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("subtitle download failed: {}", e)))?
            .text()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("subtitle body read failed: {}", e)))?;

        Ok(DownloadResult { content, file_name })
    }
}
