use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::model::ModelError;

/// Per-request error taxonomy. Everything recoverable surfaces to the
/// caller as structured JSON with a status reflecting client vs.
/// server fault; nothing is retried.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No image file uploaded")]
    MissingImage,
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error("could not decode image: {0}")]
    BadImage(String),
    #[error("failed to persist upload: {0}")]
    Upload(#[from] std::io::Error),
    #[error("inference failed: {0}")]
    Inference(String),
}

impl From<ModelError> for ServiceError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Decode(inner) => ServiceError::BadImage(inner.to_string()),
            other => ServiceError::Inference(other.to_string()),
        }
    }
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            ServiceError::MissingImage | ServiceError::Multipart(_) => StatusCode::BAD_REQUEST,
            ServiceError::BadImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Upload(_) | ServiceError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
