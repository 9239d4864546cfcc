//! Internal auth failure taxonomy.
//!
//! These variants are precise on purpose: callers use them to decide between
//! refreshing, forcing re-login, or telling the client to wait. They are
//! flattened at the HTTP boundary (see [`crate::error::AppError::from_auth`]).
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("too many login attempts from this address")]
    RateLimited {
        remaining_attempts: u32,
        reset_at: DateTime<Utc>,
    },

    #[error("account temporarily locked")]
    AccountLocked { locked_until: DateTime<Utc> },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token expired")]
    TokenExpired,

    #[error("token revoked")]
    TokenRevoked,

    #[error("token malformed or forged")]
    TokenMalformed,

    #[error("token of the wrong type")]
    TokenWrongType,

    #[error("insufficient role")]
    InsufficientRole,

    #[error("user directory unavailable")]
    DirectoryUnavailable,

    #[error("internal auth error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether this is one of the token verification failures
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::TokenExpired
                | AuthError::TokenRevoked
                | AuthError::TokenMalformed
                | AuthError::TokenWrongType
        )
    }

    /// Short label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::RateLimited { .. } => "rate_limited",
            AuthError::AccountLocked { .. } => "account_locked",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::TokenMalformed => "token_malformed",
            AuthError::TokenWrongType => "token_wrong_type",
            AuthError::InsufficientRole => "insufficient_role",
            AuthError::DirectoryUnavailable => "directory_unavailable",
            AuthError::Internal(_) => "internal",
        }
    }
}
