use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use paysync_core::{AuthError, ErrorKind, PeerError, ReconcileError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    UpstreamError(String),
    #[error("{0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::UpstreamError(msg) => {
                tracing::error!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "upstream service error".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match (err.kind(), err) {
            (_, ReconcileError::Auth(AuthError::Malformed(msg))) => AppError::AuthenticationError(msg),
            (_, ReconcileError::Auth(AuthError::Rejected(_))) => {
                AppError::AuthenticationError("Invalid or expired token".to_string())
            }
            (_, ReconcileError::Auth(AuthError::Forbidden(_))) => {
                AppError::AuthorizationError("Insufficient permissions".to_string())
            }
            (_, ReconcileError::ValidationError(msg)) => AppError::ValidationError(msg),
            (ErrorKind::Validation, other) => AppError::ValidationError(other.to_string()),
            (ErrorKind::NotFound, other) => AppError::NotFoundError(other.to_string()),
            (ErrorKind::Upstream, other) => AppError::UpstreamError(other.to_string()),
            (ErrorKind::Authentication, other) => AppError::AuthenticationError(other.to_string()),
            (ErrorKind::Authorization, other) => AppError::AuthorizationError(other.to_string()),
            (ErrorKind::Internal, other) => AppError::InternalServerError(other.to_string()),
        }
    }
}

/// Order lookups pass a peer 404 through; everything else is an upstream failure.
impl From<PeerError> for AppError {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::Rejected { status: 404, .. } => AppError::NotFoundError("order not found".to_string()),
            other => ReconcileError::from(other).into(),
        }
    }
}
