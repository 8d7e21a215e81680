/*!
 * HTTP adapter: the OpenSubtitles-compatible surface plus the browse,
 * settings, and dashboard data endpoints, wired as one axum router over
 * shared application state.
 */

pub mod browse_api;
pub mod catalog_api;
pub mod error;
pub mod settings_api;
pub mod status_api;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::app_settings::SettingsStore;
use crate::batch::BatchOrchestrator;
use crate::cache_store::CacheStore;
use crate::demuxer::Demuxer;
use crate::orchestrator::SubtitleProxy;
use crate::progress::ProgressRegistry;
use crate::vfs::VfsSelector;

/// State of an Ollama model pull started from the settings page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullStatus {
    pub status: String,
    pub model: String,
    pub message: String,
}

impl Default for PullStatus {
    fn default() -> Self {
        PullStatus {
            status: "idle".to_string(),
            model: String::new(),
            message: String::new(),
        }
    }
}

/// Shared application state available to all handlers via `State<AppState>`.
/// Cheap to clone; all inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<SettingsStore>,
    pub proxy: Arc<SubtitleProxy>,
    pub batch: Arc<BatchOrchestrator>,
    pub vfs: Arc<VfsSelector>,
    pub demuxer: Arc<dyn Demuxer>,
    pub progress: Arc<ProgressRegistry>,
    pub cache: Arc<CacheStore>,
    /// Opaque tokens minted by `/api/v1/login`
    pub tokens: Arc<Mutex<HashMap<String, String>>>,
    pub pull_status: Arc<Mutex<PullStatus>>,
    /// Public base URL of this server, used in self-referential links
    pub base_url: String,
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // OpenSubtitles-compatible surface
        .route("/api/v1/login", post(catalog_api::login))
        .route("/api/v1/logout", delete(catalog_api::logout))
        .route("/api/v1/subtitles", get(catalog_api::search_subtitles))
        .route("/api/v1/download", post(catalog_api::request_download))
        .route(
            "/api/v1/download/:file_id/:file_name",
            get(catalog_api::download_file),
        )
        .route("/api/v1/upload", post(catalog_api::upload_subtitle))
        .route("/api/v1/infos/user", get(catalog_api::user_info))
        .route("/api/v1/infos/languages", get(catalog_api::languages_info))
        .route("/api/v1/infos/formats", get(catalog_api::formats_info))
        // File browser
        .route("/api/browse", get(browse_api::list_directory))
        .route("/api/browse/search", get(browse_api::search_for_video))
        .route("/api/browse/search-manual", get(browse_api::search_manual))
        .route("/api/browse/translate", post(browse_api::translate_and_save))
        .route(
            "/api/browse/translate-local",
            post(browse_api::translate_local),
        )
        .route(
            "/api/browse/translate-embedded",
            post(browse_api::translate_embedded),
        )
        .route(
            "/api/browse/embedded-tracks",
            get(browse_api::embedded_tracks),
        )
        .route("/api/browse/progress", get(browse_api::translation_progress))
        .route("/api/browse/batch-analyze", post(browse_api::batch_analyze))
        .route("/api/browse/batch-start", post(browse_api::batch_start))
        .route("/api/browse/batch-progress", get(browse_api::batch_progress))
        .route("/api/browse/batch-cancel", post(browse_api::batch_cancel))
        .route(
            "/api/browse/settings",
            get(browse_api::get_browse_settings).post(browse_api::update_smb_settings),
        )
        .route("/api/browse/mode", post(browse_api::update_browse_mode))
        .route("/api/browse/test", post(browse_api::test_connection))
        .route("/api/browse/discover", get(browse_api::discover_nas))
        // Settings
        .route(
            "/api/settings",
            get(settings_api::get_settings).post(settings_api::update_settings),
        )
        .route(
            "/api/settings/ollama/models",
            get(settings_api::ollama_models),
        )
        .route("/api/settings/ollama/pull", post(settings_api::ollama_pull))
        .route(
            "/api/settings/ollama/pull/status",
            get(settings_api::ollama_pull_status),
        )
        // Dashboards and cache management
        .route("/status", get(status_api::status))
        .route("/language", post(status_api::change_language))
        .route(
            "/cache",
            get(status_api::list_cache).delete(status_api::clear_cache),
        )
        .route("/cache/:fingerprint", delete(status_api::delete_cache_entry))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
