use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fusedchat_proto::protocol::ErrorBody;
use thiserror::Error;

/// Everything a gateway handler can fail with. Each variant maps to one
/// status code and a `{"message": ...}` body.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// No usable provider credential. Answered with 400, not 403.
    #[error("{0}")]
    Authorization(String),

    /// Missing or unknown `x-user-id`.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// The AI service address is not configured.
    #[error("AI Service is unavailable.")]
    ServiceUnavailable,

    /// The AI service answered with an error status.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    /// The AI service could not be reached; the detail is logged, never sent.
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) | GatewayError::Authorization(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::Transport { .. } | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
