use axum::{
    Json,
    body::{Body, Bytes},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// RelayError
///
/// Request-time failures. Each variant maps to one HTTP status; nothing here
/// is retried, the caller decides how to react.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No session cookie, a cookie that fails verification, or a session that
    /// no longer exists in the store.
    #[error("unauthorized")]
    Unauthenticated,

    /// Identity resolved but the role set does not satisfy the gated action.
    #[error("forbidden")]
    Forbidden,

    /// The provider callback could not be accepted (bad state, provider error).
    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    /// The provider token endpoint refused the authorization code.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// Backend answered with a non-success status. The body is kept so it can
    /// be relayed unchanged.
    #[error("upstream responded with {status}")]
    Upstream {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    /// Backend answered successfully but the payload did not match the
    /// expected shape.
    #[error("unexpected upstream payload: {0}")]
    Decode(String),

    /// Failure inside this service (e.g. signing a cookie).
    #[error("internal error: {0}")]
    Internal(String),

    /// The upstream or provider could not be reached at all.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            RelayError::Upstream {
                status,
                content_type,
                body,
            } => {
                let content_type = content_type
                    .unwrap_or_else(|| HeaderValue::from_static("application/json"));
                return (status, [(header::CONTENT_TYPE, content_type)], Body::from(body))
                    .into_response();
            }
            RelayError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            RelayError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string()),
            RelayError::InvalidCallback(reason) => (StatusCode::BAD_REQUEST, reason),
            RelayError::TokenExchange(reason) => {
                tracing::warn!(%reason, "Provider rejected the authorization code");
                (StatusCode::UNAUTHORIZED, "token exchange failed".to_string())
            }
            RelayError::Internal(reason) => {
                tracing::error!(%reason, "Internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            RelayError::Decode(reason) => {
                tracing::error!(%reason, "Upstream payload did not decode");
                (StatusCode::BAD_GATEWAY, "bad gateway".to_string())
            }
            RelayError::Transport(e) => {
                tracing::error!(error = %e, "Transport failure contacting upstream");
                (StatusCode::BAD_GATEWAY, "bad gateway".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
