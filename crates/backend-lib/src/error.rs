// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
//!
//! This is where the internal auth taxonomy is flattened: callers only ever
//! learn "not authenticated", "invalid credentials", "locked" or "rate limited".
use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::error;

/// Granularity of the retry hint on locked accounts
const LOCK_BUCKET_MINUTES: i64 = 10;

/// Application error types with error codes and context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Too many login attempts")]
    RateLimited { remaining_attempts: u32 },

    #[error("Account locked")]
    AccountLocked { retry_after_minutes: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Round a remaining lock time up to the next bucket, so the exact unlock instant is not leaked
pub fn lock_bucket_minutes(locked_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (locked_until - now).num_seconds().max(1);
    let minutes = (seconds + 59) / 60;
    ((minutes + LOCK_BUCKET_MINUTES - 1) / LOCK_BUCKET_MINUTES) * LOCK_BUCKET_MINUTES
}

impl AppError {
    /// Map an internal auth failure onto what the caller may see
    pub fn from_auth(err: AuthError, now: DateTime<Utc>) -> Self {
        match err {
            AuthError::RateLimited {
                remaining_attempts, ..
            } => AppError::RateLimited { remaining_attempts },
            AuthError::AccountLocked { locked_until } => AppError::AccountLocked {
                retry_after_minutes: lock_bucket_minutes(locked_until, now),
            },
            // Fail closed, indistinguishable from a bad password.
            AuthError::InvalidCredentials | AuthError::DirectoryUnavailable => {
                AppError::InvalidCredentials
            },
            AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::TokenMalformed
            | AuthError::TokenWrongType => AppError::NotAuthenticated,
            AuthError::InsufficientRole => AppError::Forbidden,
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotAuthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::AccountLocked { .. } => StatusCode::LOCKED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotAuthenticated => "AUTH_001",
            AppError::InvalidCredentials => "AUTH_002",
            AppError::RateLimited { .. } => "AUTH_003",
            AppError::AccountLocked { .. } => "AUTH_004",
            AppError::Forbidden => "AUTH_005",
            AppError::NotFound(_) => "NF_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Message safe to show a client
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::NotAuthenticated => "Authentication required".to_string(),
            AppError::InvalidCredentials => "Invalid email or password".to_string(),
            AppError::RateLimited { .. } => {
                "Too many login attempts, please try again later".to_string()
            },
            AppError::AccountLocked { .. } => {
                "Account temporarily locked, please try again later".to_string()
            },
            AppError::Forbidden => "You do not have access to this resource".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::from_auth(err, Utc::now())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            error!(detail = %detail, "internal error");
        }

        let status = self.status_code();
        let mut body = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.sanitized_message(),
            }
        });

        match &self {
            AppError::RateLimited { remaining_attempts } => {
                body["remaining_attempts"] = serde_json::json!(remaining_attempts);
            },
            AppError::AccountLocked {
                retry_after_minutes,
            } => {
                body["locked"] = serde_json::json!(true);
                body["retry_after_minutes"] = serde_json::json!(retry_after_minutes);
            },
            _ => {},
        }

        (status, axum::Json(body)).into_response()
    }
}
