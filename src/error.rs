use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("upload exceeds {0} bytes")]
    PayloadTooLarge(usize),
    #[error("image too large: {0}")]
    ImageTooLarge(String),
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("image has {actual} pixels, expected {expected}")]
    Shape { expected: usize, actual: usize },
    #[error("model execution failed: {0}")]
    Inference(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) | ServiceError::Decode(_) => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge(_) | ServiceError::ImageTooLarge(_) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServiceError::Shape { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Config(_)
            | ServiceError::ModelLoad(_)
            | ServiceError::Inference(_)
            | ServiceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<image::ImageError> for ServiceError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Limits(limit) => ServiceError::ImageTooLarge(limit.to_string()),
            other => ServiceError::Decode(other.to_string()),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "rejected request");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
