use axum::Json;
use axum::http::StatusCode;
use gs_core::error::CallbackError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
    pub request_id: Option<String>,
}

pub fn map_error(
    err: &CallbackError,
    request_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    let (status, code) = match err {
        CallbackError::MissingParameter { .. } => (StatusCode::BAD_REQUEST, "invalid_input"),
        CallbackError::UnknownState => (StatusCode::NOT_FOUND, "not_found"),
        CallbackError::Exchange { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
        CallbackError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    // Exchange errors carry the provider's reason; keep that out of the page.
    let message = match err {
        CallbackError::Exchange { .. } => "failed to connect the GitHub account".to_string(),
        CallbackError::Store(_) => "failed to save the credential".to_string(),
        _ => err.to_string(),
    };

    (
        status,
        Json(ErrorEnvelope {
            code,
            message,
            request_id,
        }),
    )
}
