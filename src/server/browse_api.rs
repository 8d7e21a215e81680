/*!
 * Handlers for the file-browser UI under `/api/browse`.
 *
 * These endpoints drive the interactive workflows: browsing the tree,
 * searching the catalog for a video, translating sidecar and embedded
 * subtitles, and running the folder batch.
 */

use axum::extract::{Query, State};
use axum::Json;
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_settings::BrowseMode;
use crate::catalog::SearchQuery;
use crate::discovery;
use crate::errors::AppError;
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;
use crate::subtitle_codec::SubtitleFormat;
use crate::vfs;

#[derive(Debug, Deserialize)]
pub struct PathParams {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct VideoPathParams {
    #[serde(rename = "videoPath")]
    pub video_path: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub file_id: i64,
    pub video_path: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateLocalRequest {
    pub subtitle_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateEmbeddedRequest {
    pub video_path: String,
    pub track_index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmbSettingsRequest {
    pub host: Option<String>,
    pub share: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: String,
    #[serde(rename = "localRootPath")]
    pub local_root_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchAnalyzeRequest {
    #[serde(rename = "folderPath")]
    pub folder_path: String,
}

/// GET /api/browse
pub async fn list_directory(
    State(state): State<AppState>,
    Query(params): Query<PathParams>,
) -> ApiResult<Json<Value>> {
    let entries = state.vfs.current().list(&params.path).await?;
    Ok(Json(json!({ "path": params.path, "entries": entries })))
}

/// GET /api/browse/search: search the catalog using a title derived from
/// the video file name.
pub async fn search_for_video(
    State(state): State<AppState>,
    Query(params): Query<VideoPathParams>,
) -> ApiResult<Json<Value>> {
    let title = vfs::extract_video_title(&params.video_path);
    info!("Searching subtitles for: {} (extracted: {})", params.video_path, title);
    let response = state
        .proxy
        .proxy_search(&SearchQuery {
            query: Some(title),
            page: Some(1),
            ..Default::default()
        })
        .await?;
    Ok(Json(response))
}

/// GET /api/browse/search-manual
pub async fn search_manual(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    info!("Manual subtitle search: {}", params.query);
    let response = state
        .proxy
        .proxy_search(&SearchQuery {
            query: Some(params.query),
            page: Some(1),
            ..Default::default()
        })
        .await?;
    Ok(Json(response))
}

/// POST /api/browse/translate: fetch a catalog subtitle, translate it, and
/// save it next to the video.
pub async fn translate_and_save(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<Json<Value>> {
    info!(
        "Translating subtitle {} for video {}",
        request.file_id, request.video_path
    );
    let translated = state
        .proxy
        .proxy_download_and_translate(
            request.file_id,
            SubtitleFormat::Srt,
            request.file_name.as_deref(),
        )
        .await?;

    let settings = state.settings.snapshot();
    let path = state
        .vfs
        .current()
        .write_subtitle(&request.video_path, &translated, &settings.target_language_code())
        .await?;

    info!("Subtitle saved to: {}", path);
    Ok(Json(json!({
        "success": true,
        "path": path,
        "language": settings.target_language,
    })))
}

/// POST /api/browse/translate-local: translate an existing sidecar
/// subtitle in place, writing `{base}.{lang}.srt` next to it.
pub async fn translate_local(
    State(state): State<AppState>,
    Json(request): Json<TranslateLocalRequest>,
) -> ApiResult<Json<Value>> {
    info!("Translating local subtitle: {}", request.subtitle_path);
    let filesystem = state.vfs.current();
    let original = filesystem.read_subtitle(&request.subtitle_path).await?;

    let file_name = request
        .subtitle_path
        .rsplit('/')
        .next()
        .unwrap_or(&request.subtitle_path);
    let translated = state.proxy.translate_content(&original, file_name).await?;

    let settings = state.settings.snapshot();
    let output_path = translated_sibling_path(
        &request.subtitle_path,
        &settings.target_language_code(),
    );
    filesystem
        .write_subtitle_direct(&output_path, &translated)
        .await?;

    info!("Translated subtitle saved to: {}", output_path);
    Ok(Json(json!({
        "success": true,
        "path": output_path,
        "language": settings.target_language,
    })))
}

/// GET /api/browse/embedded-tracks: header-only track listing for one
/// video. The header temp file is deleted before the response goes out.
pub async fn embedded_tracks(
    State(state): State<AppState>,
    Query(params): Query<VideoPathParams>,
) -> ApiResult<Json<Value>> {
    if !state.demuxer.is_available() {
        return Ok(Json(json!({
            "available": false,
            "message": "FFmpeg not installed on server",
        })));
    }

    info!("Checking embedded subtitles in: {}", params.video_path);
    let header = state
        .vfs
        .current()
        .download_header_to_temp(&params.video_path, vfs::HEADER_BYTES)
        .await?;
    let tracks = state.demuxer.subtitle_tracks(&header).await;
    vfs::cleanup_temp(&header);

    Ok(Json(json!({ "available": true, "tracks": tracks? })))
}

/// POST /api/browse/translate-embedded: extract a track, translate it, and
/// save the result next to the video. Cached translations skip the full
/// video download entirely.
pub async fn translate_embedded(
    State(state): State<AppState>,
    Json(request): Json<TranslateEmbeddedRequest>,
) -> ApiResult<Json<Value>> {
    info!(
        "Extracting embedded subtitle track {} from: {}",
        request.track_index, request.video_path
    );
    let video_file_name = request
        .video_path
        .rsplit('/')
        .next()
        .unwrap_or(&request.video_path)
        .to_string();
    let filesystem = state.vfs.current();

    let translated = match state
        .proxy
        .cached_embedded(&video_file_name, request.track_index)
    {
        Some(cached) => cached,
        None => {
            let temp = filesystem.download_to_temp(&request.video_path).await?;
            let result = async {
                let extracted = state
                    .demuxer
                    .extract_track(&temp, request.track_index)
                    .await?;
                state
                    .proxy
                    .translate_embedded_content(
                        &request.video_path,
                        &video_file_name,
                        request.track_index,
                        &extracted,
                    )
                    .await
            }
            .await;
            vfs::cleanup_temp(&temp);
            result?
        }
    };

    let settings = state.settings.snapshot();
    let path = filesystem
        .write_subtitle(&request.video_path, &translated, &settings.target_language_code())
        .await?;

    info!("Embedded subtitle translated and saved to: {}", path);
    Ok(Json(json!({
        "success": true,
        "path": path,
        "language": settings.target_language,
    })))
}

/// GET /api/browse/progress
pub async fn translation_progress(State(state): State<AppState>) -> Json<Value> {
    let translations = state.progress.snapshot();
    let batch = state.batch.progress();
    Json(json!({
        "translations": translations,
        "batch": batch,
    }))
}

/// POST /api/browse/batch-analyze
pub async fn batch_analyze(
    State(state): State<AppState>,
    Json(request): Json<BatchAnalyzeRequest>,
) -> ApiResult<Json<Value>> {
    if request.folder_path.is_empty() {
        return Err(ApiError(AppError::BadInput(
            "folderPath is required".to_string(),
        )));
    }
    info!("Starting batch analysis for folder: {}", request.folder_path);
    let record = state.batch.analyze(&request.folder_path).await?;
    Ok(Json(json!({
        "success": true,
        "totalVideos": record.total_videos,
        "videos": record.videos,
    })))
}

/// POST /api/browse/batch-start
pub async fn batch_start(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let target_language = state.settings.snapshot().target_language;
    info!("Starting batch translation to: {}", target_language);
    state.batch.start(&target_language)?;
    Ok(Json(json!({
        "success": true,
        "message": "Batch translation started",
    })))
}

/// GET /api/browse/batch-progress
pub async fn batch_progress(State(state): State<AppState>) -> Json<Value> {
    match state.batch.progress() {
        None => Json(json!({ "active": false })),
        Some(record) => Json(json!({
            "active": true,
            "batchId": record.batch_id,
            "folderPath": record.folder_path,
            "totalVideos": record.total_videos,
            "completedVideos": record.completed_videos,
            "currentVideo": record.current_video.unwrap_or_default(),
            "progressPercent": record.progress_percent,
            "status": record.status,
            "error": record.error.unwrap_or_default(),
        })),
    }
}

/// POST /api/browse/batch-cancel
pub async fn batch_cancel(State(state): State<AppState>) -> Json<Value> {
    state.batch.cancel();
    Json(json!({ "success": true, "message": "Batch cancelled" }))
}

/// GET /api/browse/settings
pub async fn get_browse_settings(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings.snapshot();
    Json(json!({
        "browseMode": settings.browse_mode,
        "localRootPath": settings.local_root_path,
        "smb": {
            "host": settings.smb_host,
            "share": settings.smb_share,
            "username": settings.smb_username,
            "domain": settings.smb_domain,
            "configured": !settings.smb_host.is_empty(),
        },
    }))
}

/// POST /api/browse/settings: SMB connection settings; an empty password
/// keeps the stored one.
pub async fn update_smb_settings(
    State(state): State<AppState>,
    Json(request): Json<SmbSettingsRequest>,
) -> ApiResult<Json<Value>> {
    state
        .settings
        .update(|s| {
            if let Some(host) = request.host {
                s.smb_host = host;
            }
            if let Some(share) = request.share {
                s.smb_share = share;
            }
            if let Some(username) = request.username {
                s.smb_username = username;
            }
            if let Some(password) = request.password {
                if !password.is_empty() {
                    s.smb_password = password;
                }
            }
            if let Some(domain) = request.domain {
                s.smb_domain = domain;
            }
        })
        .map_err(|e| ApiError(AppError::Internal(e.to_string())))?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/browse/mode
pub async fn update_browse_mode(
    State(state): State<AppState>,
    Json(request): Json<ModeRequest>,
) -> ApiResult<Json<Value>> {
    let mode = if request.mode.eq_ignore_ascii_case("smb") {
        BrowseMode::Smb
    } else {
        BrowseMode::Local
    };
    state
        .settings
        .update(|s| {
            s.browse_mode = mode;
            if let Some(root) = request.local_root_path {
                s.local_root_path = root;
            }
        })
        .map_err(|e| ApiError(AppError::Internal(e.to_string())))?;
    Ok(Json(json!({ "success": true, "mode": mode })))
}

/// POST /api/browse/test: probe the selected filesystem adapter.
pub async fn test_connection(
    State(state): State<AppState>,
    body: Option<Json<ModeRequest>>,
) -> Json<Value> {
    let filesystem = match body {
        Some(Json(request)) if request.mode.eq_ignore_ascii_case("smb") => {
            state.vfs.for_mode(BrowseMode::Smb)
        }
        Some(Json(request)) if request.mode.eq_ignore_ascii_case("local") => {
            state.vfs.for_mode(BrowseMode::Local)
        }
        _ => state.vfs.current(),
    };
    match filesystem.test_connection().await {
        Ok(()) => Json(json!({ "success": true })),
        Err(e) => Json(json!({ "success": false, "message": e.to_string() })),
    }
}

/// GET /api/browse/discover
pub async fn discover_nas() -> Json<Value> {
    let devices = discovery::discover_smb_hosts().await;
    Json(json!({ "devices": devices }))
}

/// Sibling path for a translated sidecar: strip any existing language code
/// and extension, then add the target code and `.srt`.
fn translated_sibling_path(original_path: &str, lang_code: &str) -> String {
    let (mut base, ext) = match original_path.rfind('.') {
        Some(dot) if dot > 0 => (
            original_path[..dot].to_string(),
            original_path[dot..].to_string(),
        ),
        _ => (original_path.to_string(), ".srt".to_string()),
    };

    // Drop a trailing ".en" / ".eng" / ".hebrew" style language marker.
    if let Some(dot) = base.rfind('.') {
        let candidate = &base[dot + 1..];
        if !candidate.is_empty()
            && candidate.len() <= 7
            && candidate.chars().all(|c| c.is_ascii_lowercase())
        {
            base.truncate(dot);
        }
    }

    format!("{}.{}{}", base, lang_code, ext)
}
