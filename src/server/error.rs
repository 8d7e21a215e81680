/*!
 * HTTP error mapping for the axum adapter.
 */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::errors::AppError;

/// Handler-level error that renders domain errors as consistent JSON
/// responses.
#[derive(Debug)]
pub struct ApiError(pub AppError);

/// Convenience alias for handler return values
pub type ApiResult<T> = Result<T, ApiError>;

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            AppError::NotConfigured(msg) => {
                (StatusCode::BAD_REQUEST, "NOT_CONFIGURED", msg.clone())
            }
            AppError::BadInput(msg) => (StatusCode::BAD_REQUEST, "BAD_INPUT", msg.clone()),
            AppError::Empty(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY", msg.clone()),
            AppError::Busy(msg) => (StatusCode::CONFLICT, "BUSY", msg.clone()),
            AppError::UpstreamUnavailable(msg) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", msg.clone())
            }
            AppError::Internal(msg) => {
                log::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });
        (status, axum::Json(body)).into_response()
    }
}
