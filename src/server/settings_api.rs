/*!
 * Handlers for `/api/settings`, including the Ollama model management
 * endpoints used by the settings page.
 */

use axum::extract::State;
use axum::Json;
use log::{error, info};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::errors::AppError;
use crate::providers::ollama::{build_http_client, OllamaClient};
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub model: String,
}

/// GET /api/settings: keys masked, passwords reduced to flags.
pub async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    Json(state.settings.masked_view())
}

/// POST /api/settings: merge-update; masked keys and empty passwords keep
/// their stored values.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(updates): Json<Map<String, Value>>,
) -> ApiResult<Json<Value>> {
    state
        .settings
        .apply_update(&updates)
        .map_err(|e| ApiError(AppError::Internal(e.to_string())))?;
    Ok(Json(json!({ "success": true, "message": "Settings saved" })))
}

/// GET /api/settings/ollama/models
pub async fn ollama_models(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let settings = state.settings.snapshot();
    let client = OllamaClient::new(&settings.ollama_base_url, build_http_client());
    let models = client
        .list_models()
        .await
        .map_err(|e| ApiError(AppError::UpstreamUnavailable(e.to_string())))?;
    Ok(Json(json!({ "models": models })))
}

/// POST /api/settings/ollama/pull: start a model pull on a background
/// task; progress is polled via the status endpoint.
pub async fn ollama_pull(
    State(state): State<AppState>,
    Json(request): Json<PullRequest>,
) -> ApiResult<Json<Value>> {
    if request.model.is_empty() {
        return Err(ApiError(AppError::BadInput("model is required".to_string())));
    }
    {
        let status = state.pull_status.lock().unwrap();
        if status.status == "pulling" {
            return Err(ApiError(AppError::Busy(format!(
                "already pulling {}",
                status.model
            ))));
        }
    }

    let settings = state.settings.snapshot();
    let model = request.model.clone();
    {
        let mut status = state.pull_status.lock().unwrap();
        status.status = "pulling".to_string();
        status.model = model.clone();
        status.message = String::new();
    }

    let pull_status = state.pull_status.clone();
    tokio::spawn(async move {
        info!("Pulling Ollama model: {}", model);
        let client = OllamaClient::new(&settings.ollama_base_url, build_http_client());
        let result = client.pull_model(&model).await;
        let mut status = pull_status.lock().unwrap();
        match result {
            Ok(()) => {
                info!("Model pull complete: {}", model);
                status.status = "success".to_string();
                status.message = format!("Model {} installed", model);
            }
            Err(e) => {
                error!("Model pull failed: {}", e);
                status.status = "error".to_string();
                status.message = e.to_string();
            }
        }
    });

    Ok(Json(json!({ "success": true, "message": "Pull started" })))
}

/// GET /api/settings/ollama/pull/status
pub async fn ollama_pull_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.pull_status.lock().unwrap().clone();
    Json(json!(status))
}
