use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    /// The service being purchased is unpublished or missing.
    #[error("Service unavailable for booking: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The payment provider could not be reached or rejected the call.
    /// Always retryable.
    #[error("Payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Refund failed: {0}")]
    RefundFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
            AppError::Validation(ref msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.as_str()),
            AppError::ServiceUnavailable(ref msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg.as_str())
            }
            AppError::InvalidPackage(ref msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.as_str()),
            AppError::InvalidSchedule(ref msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg.as_str())
            }
            AppError::ProviderUnavailable(ref msg) => {
                tracing::error!("Payment provider error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment provider unavailable")
            }
            AppError::InvalidSignature => (StatusCode::BAD_REQUEST, "Invalid signature"),
            AppError::RefundFailed(ref msg) => {
                tracing::error!("Refund failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "Refund failed, please retry")
            }
            AppError::InvalidState(ref msg) => (StatusCode::CONFLICT, msg.as_str()),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<stripe::StripeError> for AppError {
    fn from(err: stripe::StripeError) -> Self {
        AppError::ProviderUnavailable(err.to_string())
    }
}
