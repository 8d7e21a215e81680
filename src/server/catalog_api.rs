/*!
 * Handlers for the OpenSubtitles-compatible surface under `/api/v1`.
 *
 * Subtitle-capable clients treat this server as the real catalog; search
 * results are relabeled to the target language and downloads deliver the
 * translated artifact.
 */

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use log::{error, info};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::catalog::SearchQuery;
use crate::errors::AppError;
use crate::language;
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;
use crate::subtitle_codec::SubtitleFormat;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[allow(dead_code)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub parent_imdb_id: Option<String>,
    pub parent_tmdb_id: Option<String>,
    pub moviehash: Option<String>,
    #[allow(dead_code)]
    pub languages: Option<String>,
    #[allow(dead_code)]
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub file_id: i64,
    pub sub_format: Option<String>,
}

/// POST /api/v1/login
///
/// Any credentials are accepted; the token only exists so catalog clients
/// complete their login handshake against this server.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Json<Value> {
    info!("Login attempt for user: {}", request.username);
    let token = Uuid::new_v4().to_string();
    state
        .tokens
        .lock()
        .unwrap()
        .insert(token.clone(), request.username.clone());

    Json(json!({
        "user": {
            "allowed_downloads": 1000,
            "allowed_translations": 1000,
            "level": "translator",
            "user_id": 1,
            "ext_installed": false,
            "vip": true,
        },
        "base_url": state.base_url,
        "token": token,
        "status": 200,
    }))
}

/// DELETE /api/v1/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    if let Some(token) = bearer_token(&headers) {
        if let Some(username) = state.tokens.lock().unwrap().remove(&token) {
            info!("Logged out user: {}", username);
        }
    }
    Json(json!({ "message": "Logged out successfully", "status": 200 }))
}

/// GET /api/v1/subtitles
///
/// Search errors degrade to an empty result page so add-on clients keep
/// working when the upstream catalog is down.
pub async fn search_subtitles(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Value> {
    let query = SearchQuery {
        query: params.query,
        imdb_id: params.imdb_id.or(params.parent_imdb_id),
        tmdb_id: params.tmdb_id.or(params.parent_tmdb_id),
        movie_hash: params.moviehash,
        page: params.page,
    };

    match state.proxy.proxy_search(&query).await {
        Ok(response) => Json(response),
        Err(e) => {
            error!("Proxy search failed: {}", e);
            Json(json!({
                "total_pages": 0,
                "total_count": 0,
                "per_page": 20,
                "page": 1,
                "data": [],
            }))
        }
    }
}

/// POST /api/v1/download
///
/// Returns a link pointing back at this server; the translation itself runs
/// when the link is fetched.
pub async fn request_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Json<Value> {
    info!("Download request for file_id: {}", request.file_id);
    let format = request.sub_format.as_deref().unwrap_or("srt");
    let target_language = state.settings.snapshot().target_language;

    let link = format!(
        "{}/api/v1/download/{}/subtitle.{}",
        state.base_url, request.file_id, format
    );
    let cached = state.proxy.is_cached(request.file_id);
    let message = if cached {
        format!("{} translation ready (cached)", target_language)
    } else {
        format!("{} translation will be generated on download", target_language)
    };
    let reset_time = (Utc::now() + Duration::days(1)).to_rfc3339();

    Json(json!({
        "link": link,
        "file_name": format!("subtitle_{}_{}.{}", request.file_id, target_language.to_lowercase(), format),
        "requests": 1,
        "remaining": 999,
        "message": message,
        "reset_time": reset_time,
        "reset_time_utc": reset_time,
    }))
}

/// GET /api/v1/download/{file_id}/{file_name}
///
/// Runs the proxy download-translate flow and returns the subtitle bytes.
/// The output format is chosen by the requested file name's extension.
pub async fn download_file(
    State(state): State<AppState>,
    Path((file_id, file_name)): Path<(i64, String)>,
) -> ApiResult<Response> {
    info!("File download for file_id: {}", file_id);
    let format = if file_name.to_lowercase().ends_with(".vtt") {
        SubtitleFormat::Vtt
    } else {
        SubtitleFormat::Srt
    };

    let content = state
        .proxy
        .proxy_download_and_translate(file_id, format, Some(&file_name))
        .await?;

    let headers = [
        (CONTENT_TYPE, format.content_type().to_string()),
        (
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
    ];
    Ok((headers, content).into_response())
}

/// POST /api/v1/upload (multipart)
pub async fn upload_subtitle(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(AppError::BadInput(format!("invalid multipart body: {}", e))))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .unwrap_or("uploaded.srt")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError(AppError::BadInput(format!("upload read failed: {}", e))))?;
        let content = String::from_utf8_lossy(&bytes).to_string();

        info!("Uploading subtitle file: {}", file_name);
        let file_id = state.proxy.add_local_subtitle(&file_name, &content);
        return Ok(Json(json!({
            "message": "Subtitle uploaded successfully",
            "file_id": file_id,
            "file_name": file_name,
            "status": 200,
        })));
    }
    Err(ApiError(AppError::BadInput(
        "multipart body had no 'file' field".to_string(),
    )))
}

/// GET /api/v1/infos/user
pub async fn user_info() -> Json<Value> {
    Json(json!({
        "data": {
            "allowed_downloads": 1000,
            "allowed_translations": 1000,
            "level": "translator",
            "user_id": 1,
            "ext_installed": false,
            "vip": true,
            "downloads_count": 0,
            "remaining_downloads": 1000,
        }
    }))
}

/// GET /api/v1/infos/languages
pub async fn languages_info() -> Json<Value> {
    let languages: Vec<Value> = language::supported_languages()
        .iter()
        .map(|(name, code)| json!({ "language_code": code, "language_name": name }))
        .collect();
    Json(json!({ "data": languages }))
}

/// GET /api/v1/infos/formats
pub async fn formats_info() -> Json<Value> {
    Json(json!({ "data": { "output_formats": ["srt", "vtt"] } }))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}
