use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use framelens_proto::data_url;
use framelens_proto::proto::{AnalyzeFrameRequest, AnalyzeFrameResponse, ANALYZE_FRAME_PATH};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::error::ProxyError;
use crate::extract::extract_caption;
use crate::upstream::UpstreamClient;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Immutable state shared by every request.
#[derive(Clone)]
pub struct AppState {
    upstream: Arc<UpstreamClient>,
}

impl AppState {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self {
            upstream: Arc::new(upstream),
        }
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(ANALYZE_FRAME_PATH, post(analyze_frame))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn analyze_frame(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeFrameRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!(limit = MAX_BODY_BYTES, "rejecting oversized request body");
            return rejection.into_response();
        }
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejecting unreadable request body");
            return ProxyError::BadRequest(rejection.body_text()).failure_response(None);
        }
    };
    let frame_index = request.frame_index;
    let image = data_url::strip_prefix(&request.image_data);
    if image.is_empty() {
        info!(?frame_index, "rejecting request without image data");
        return ProxyError::MissingImage.failure_response(frame_index);
    }

    info!(?frame_index, style = %request.prompt_style, bytes = image.len(), "analyzing frame");

    match state.upstream.describe(image, &request.prompt_style).await {
        Ok(body) => {
            let prompt = extract_caption(&body);
            let request_id = body.id.unwrap_or_else(|| "unknown".to_string());
            info!(?frame_index, %request_id, chars = prompt.chars().count(), "frame analyzed");
            Json(AnalyzeFrameResponse::succeeded(
                prompt,
                state.upstream.config().model.clone(),
                frame_index,
                request_id,
            ))
            .into_response()
        }
        Err(err) => {
            error!(?frame_index, error = %err, "frame analysis failed");
            err.failure_response(frame_index)
        }
    }
}
