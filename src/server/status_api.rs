/*!
 * Dashboard data and cache management endpoints.
 */

use axum::extract::{Path, Query, State};
use axum::Json;
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LanguageParams {
    pub language: String,
}

/// GET /status: active and pending jobs plus a cache overview.
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let settings = state.settings.snapshot();
    let jobs = state.progress.snapshot();
    let cache = state.cache.list()?;
    Ok(Json(json!({
        "targetLanguage": settings.target_language,
        "modelProvider": settings.model_provider,
        "activeModel": settings.active_model(),
        "configured": settings.is_configured(),
        "translations": jobs,
        "cache": cache,
        "batch": state.batch.progress(),
    })))
}

/// POST /language?language=French
pub async fn change_language(
    State(state): State<AppState>,
    Query(params): Query<LanguageParams>,
) -> ApiResult<Json<Value>> {
    let accepted = state
        .settings
        .set_target_language(&params.language)
        .map_err(|e| ApiError(AppError::Internal(e.to_string())))?;
    if !accepted {
        return Err(ApiError(AppError::BadInput(format!(
            "unsupported language: {}",
            params.language
        ))));
    }
    Ok(Json(json!({
        "success": true,
        "targetLanguage": params.language,
    })))
}

/// GET /cache
pub async fn list_cache(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let entries = state.cache.list()?;
    Ok(Json(json!({ "entries": entries })))
}

/// DELETE /cache/{fingerprint}
pub async fn delete_cache_entry(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> ApiResult<Json<Value>> {
    state.cache.delete(&fingerprint)?;
    info!("Cache entry deleted: {}", fingerprint);
    Ok(Json(json!({ "success": true, "deleted": fingerprint })))
}

/// DELETE /cache
pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let removed = state.cache.clear()?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}
