use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Everything that can end a relay exchange early.
///
/// Malformed backend lines are not represented here: they are downgraded to
/// warnings by the event mapper and never terminate a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Could not connect to inference backend: {0}")]
    BackendUnreachable(String),

    #[error("Inference backend returned {status}: {message}")]
    BackendRejected { status: u16, message: String },

    #[error("Inference backend timed out: {0}")]
    BackendTimeout(String),

    #[error("Inference backend stream interrupted: {0}")]
    BackendStreamInterrupted(String),

    #[error("Backend frame exceeded {limit} bytes without a line terminator")]
    FrameTooLarge { limit: usize },
}

impl RelayError {
    /// Classify a reqwest failure raised while talking to the backend.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::BackendTimeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            RelayError::BackendUnreachable(err.to_string())
        } else {
            RelayError::BackendStreamInterrupted(err.to_string())
        }
    }
}

impl ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidModel(_) | RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
