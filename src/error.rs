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

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payment already in a terminal state")]
    PaymentAlreadyTerminal,

    #[error("OTP has expired")]
    OtpExpired,

    #[error("OTP did not match; {attempts_remaining} attempts remaining")]
    OtpMismatch { attempts_remaining: i32 },

    #[error("OTP attempt limit exceeded")]
    OtpAttemptsExceeded,

    #[error("Resend limit exceeded")]
    ResendLimitExceeded,

    #[error("Resend requested too soon; retry in {retry_after_secs}s")]
    ResendTooSoon { retry_after_secs: i64 },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DatabaseError",
            AppError::NotFound(_) => "NotFound",
            AppError::Validation(_) => "ValidationError",
            AppError::PaymentAlreadyTerminal => "PaymentAlreadyTerminal",
            AppError::OtpExpired => "OtpExpired",
            AppError::OtpMismatch { .. } => "OtpMismatch",
            AppError::OtpAttemptsExceeded => "OtpAttemptsExceeded",
            AppError::ResendLimitExceeded => "ResendLimitExceeded",
            AppError::ResendTooSoon { .. } => "ResendTooSoon",
            AppError::Gateway(_) => "GatewayError",
            AppError::Delivery(_) => "DeliveryError",
            AppError::Conflict(_) => "ConcurrencyConflict",
            AppError::Internal(_) => "InternalError",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PaymentAlreadyTerminal => StatusCode::CONFLICT,
            AppError::OtpExpired => StatusCode::GONE,
            AppError::OtpMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::OtpAttemptsExceeded => StatusCode::LOCKED,
            AppError::ResendLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::ResendTooSoon { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Gateway(ref msg) => {
                tracing::error!("Gateway error: {}", msg);
                StatusCode::BAD_GATEWAY
            }
            AppError::Delivery(ref msg) => {
                tracing::error!("Delivery error: {}", msg);
                StatusCode::BAD_GATEWAY
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        match self {
            AppError::OtpMismatch { attempts_remaining } => {
                body["attempts_remaining"] = json!(attempts_remaining);
            }
            AppError::ResendTooSoon { retry_after_secs } => {
                body["retry_after_secs"] = json!(retry_after_secs);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}
