use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use thiserror::Error;

/// Expected business outcomes. These are not faults: callers render a
/// specific message for each code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Rejection {
    CouponNotFound,
    CouponExhausted,
    CouponExpired,
    AlreadyRedeemed,
    InsufficientCredits,
    InvalidKey,
    KeyAlreadyUsed,
    KeyExpired,
    OwnerMismatch,
}

impl Rejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::CouponNotFound => "Coupon not found",
            Self::CouponExhausted => "This coupon has no uses left",
            Self::CouponExpired => "This coupon has expired",
            Self::AlreadyRedeemed => "You have already redeemed this coupon",
            Self::InsufficientCredits => "Insufficient credits",
            Self::InvalidKey => "Invalid activation key",
            Self::KeyAlreadyUsed => "This key has already been used",
            Self::KeyExpired => "This key has expired",
            Self::OwnerMismatch => "This key was issued to a different shop",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::CouponNotFound | Self::InvalidKey => StatusCode::NOT_FOUND,
            Self::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            Self::OwnerMismatch => StatusCode::FORBIDDEN,
            _ => StatusCode::CONFLICT,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Rejected(Rejection),

    /// Storage busy or unreachable. Always safe to retry.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                AppError::Unavailable("database is busy".into())
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        AppError::Unavailable(format!("connection pool: {}", err))
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        AppError::Rejected(rejection)
    }
}

impl AppError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Unavailable(_))
    }

    fn code(&self) -> &str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Rejected(r) => r.as_ref(),
            AppError::Unavailable(_) => "UNAVAILABLE",
            AppError::Internal(_) | AppError::Database(_) | AppError::Serialization(_) => {
                "INTERNAL"
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Rejected(r) => (r.status(), r.message().to_string()),
            AppError::Unavailable(msg) => {
                tracing::warn!("Unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable, please retry".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Serialization(err) => {
                tracing::error!("Serialization error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let mut response = (
            status,
            Json(ErrorBody {
                error: message,
                code: self.code(),
            }),
        )
            .into_response();

        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
