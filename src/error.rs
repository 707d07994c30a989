use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::{error, warn};

/// Every failure a handler can surface. Rendered as `{"message": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    MissingField(String),

    #[error("{0}")]
    InvalidIdentifier(String),

    #[error("{0}")]
    ValidationFailure(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFoundOrUnauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingField(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::ValidationFailure(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFoundOrUnauthorized(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_)
            | ApiError::InvalidIdentifier(_)
            | ApiError::ValidationFailure(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFoundOrUnauthorized(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = ?e, "unhandled error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        let kind = e
            .downcast_ref::<sqlx::Error>()
            .and_then(|err| err.as_database_error())
            .map(|db| db.kind());
        match kind {
            Some(ErrorKind::UniqueViolation) => ApiError::Conflict("Resource already exists".into()),
            Some(ErrorKind::CheckViolation | ErrorKind::NotNullViolation) => {
                warn!(error = %e, "constraint rejected write");
                ApiError::ValidationFailure("Validation failed".into())
            }
            Some(ErrorKind::ForeignKeyViolation) => {
                ApiError::ValidationFailure("Referenced user does not exist".into())
            }
            _ => ApiError::Internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge("Request body too large".into());
        }
        warn!(error = %rejection.body_text(), "rejected request body");
        ApiError::ValidationFailure(rejection.body_text())
    }
}

/// `Json` whose rejections go through [`ApiError`] instead of axum's plain-text 4xx.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
