use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use framelens_proto::proto::{AnalyzeFrameResponse, ErrorBody};
use thiserror::Error;

/// `error` field of every 500 reply.
pub const FAILURE_MESSAGE: &str = "AI service processing failed";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no image data provided")]
    MissingImage,

    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream returned status {status}")]
    Status { status: u16, message: Option<String> },

    #[error("malformed upstream response: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::Timeout
        } else {
            ProxyError::Transport(err)
        }
    }
}

impl ProxyError {
    /// Text for the `detail` field: the upstream's own message when it sent
    /// one, otherwise this error's description.
    pub fn detail(&self) -> String {
        match self {
            ProxyError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP reply for a failed `/api/analyze-frame` call.
    pub fn failure_response(self, frame_index: Option<u64>) -> Response {
        match self {
            ProxyError::MissingImage | ProxyError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: self.to_string(),
                }),
            )
                .into_response(),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AnalyzeFrameResponse::failed(
                    FAILURE_MESSAGE.to_string(),
                    Some(other.detail()),
                    frame_index,
                )),
            )
                .into_response(),
        }
    }
}
