use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    routing::post,
};
use tower_http::trace::TraceLayer;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{ModelRegistry, PredictResponse},
};

/// Multipart field that carries the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ModelRegistry>,
}

pub fn build_router(config: Arc<AppConfig>, registry: Arc<ModelRegistry>) -> Router {
    let body_limit = config.max_upload_bytes;
    let state = AppState { config, registry };

    Router::new()
        .route("/predict", post(predict))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ServiceError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, &state))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e, &state))?;
            upload = Some(bytes);
            break;
        }
    }

    let image = upload.ok_or_else(|| {
        ServiceError::BadRequest(format!("multipart field '{UPLOAD_FIELD}' is required"))
    })?;
    if image.is_empty() {
        return Err(ServiceError::BadRequest("uploaded file is empty".into()));
    }

    let response = state.registry.predict(image).await?;
    Ok(Json(response))
}

fn multipart_error(err: MultipartError, state: &AppState) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(state.config.max_upload_bytes)
    } else {
        ServiceError::BadRequest(err.body_text())
    }
}
