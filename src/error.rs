use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::media::MediaError;

/// Error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::BadInput(msg) => AppError::BadRequest(msg),
            MediaError::NotFound(msg) => AppError::NotFound(msg),
            MediaError::Decode(msg) => AppError::Unprocessable(format!("Error decoding image: {msg}")),
            // Detail was already logged by the service.
            MediaError::Upstream { stage, .. } => AppError::InternalServerError(stage.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::media::Stage;

    #[test]
    fn upstream_detail_is_not_exposed() {
        let err: AppError = MediaError::Upstream {
            stage: Stage::RecordingCatalog,
            detail: "duplicate key value violates unique constraint".to_string(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn media_errors_map_to_status_codes() {
        let cases = [
            (MediaError::BadInput("bad".into()), StatusCode::BAD_REQUEST),
            (MediaError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (MediaError::Decode("junk".into()), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
