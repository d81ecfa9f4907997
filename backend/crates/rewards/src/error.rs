//! Rewards Error Types
//!
//! Rewards-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::jwt::JwtError;
use thiserror::Error;

use crate::domain::single_use::ConsumeRejection;

pub type RewardsResult<T> = Result<T, RewardsError>;

#[derive(Debug, Error)]
pub enum RewardsError {
    /// Record missing, or owned by someone else where ownership must stay opaque
    #[error("Resource not found")]
    NotFound,

    /// Single-use credential was already consumed (store level)
    #[error("Credential already consumed")]
    AlreadyConsumed,

    /// Credential past its expiry (store level)
    #[error("Credential expired")]
    Expired,

    #[error("Invalid or expired credential")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    /// Redeem token expired or item already redeemed
    #[error("Redeem token expired or already used")]
    Gone,

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Not enough energy")]
    InsufficientEnergy,

    /// Prize catalog empty or every weight zero
    #[error("No prizes configured")]
    NoPrizesConfigured,

    #[error("Game session already completed")]
    SessionCompleted,

    /// Freshly generated token value already exists in the store
    #[error("Token value collision")]
    TokenCollision,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RewardsError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RewardsError::NotFound => ErrorKind::NotFound,
            // Store-level rejections are translated by use cases; if one leaks
            // it still reads as "this credential is no longer usable".
            RewardsError::AlreadyConsumed | RewardsError::Expired | RewardsError::Gone => {
                ErrorKind::Gone
            }
            RewardsError::Unauthorized => ErrorKind::Unauthorized,
            RewardsError::Forbidden => ErrorKind::Forbidden,
            RewardsError::InsufficientFunds => ErrorKind::PaymentRequired,
            RewardsError::InsufficientEnergy | RewardsError::InvalidInput(_) => {
                ErrorKind::BadRequest
            }
            RewardsError::SessionCompleted => ErrorKind::Conflict,
            RewardsError::NoPrizesConfigured
            | RewardsError::TokenCollision
            | RewardsError::Database(_)
            | RewardsError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            RewardsError::NotFound => "not_found",
            RewardsError::AlreadyConsumed => "already_consumed",
            RewardsError::Expired => "expired",
            RewardsError::Unauthorized => "unauthorized",
            RewardsError::Forbidden => "forbidden",
            RewardsError::Gone => "gone",
            RewardsError::InsufficientFunds => "insufficient_funds",
            RewardsError::InsufficientEnergy => "insufficient_energy",
            RewardsError::NoPrizesConfigured => "no_prizes_configured",
            RewardsError::SessionCompleted => "session_completed",
            RewardsError::TokenCollision => "token_collision",
            RewardsError::InvalidInput(_) => "invalid_input",
            RewardsError::Database(_) => "database_error",
            RewardsError::Internal(_) => "internal_error",
        }
    }

    fn log(&self) {
        match self {
            RewardsError::Database(e) => {
                tracing::error!(error = %e, "Rewards database error");
            }
            RewardsError::Internal(msg) => {
                tracing::error!(message = %msg, "Rewards internal error");
            }
            RewardsError::NoPrizesConfigured => {
                tracing::error!("Prize catalog has no drawable entries");
            }
            RewardsError::TokenCollision => {
                tracing::error!("Token issuance kept colliding");
            }
            RewardsError::Unauthorized | RewardsError::Forbidden => {
                tracing::warn!(error = %self, "Rewards access rejected");
            }
            _ => {
                tracing::debug!(error = %self, "Rewards error");
            }
        }
    }
}

impl From<ConsumeRejection> for RewardsError {
    fn from(rejection: ConsumeRejection) -> Self {
        match rejection {
            ConsumeRejection::NotFound => RewardsError::NotFound,
            ConsumeRejection::AlreadyConsumed => RewardsError::AlreadyConsumed,
            ConsumeRejection::Expired => RewardsError::Expired,
        }
    }
}

impl From<JwtError> for RewardsError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Sign(e) => RewardsError::Internal(format!("failed to sign access token: {e}")),
            JwtError::Invalid(_) | JwtError::Expired | JwtError::WrongType(_) => {
                RewardsError::Unauthorized
            }
        }
    }
}

impl From<RewardsError> for AppError {
    fn from(err: RewardsError) -> Self {
        let kind = err.kind();
        let code = err.code();
        match err {
            RewardsError::Database(e) => AppError::from(e).with_code(code),
            // Server faults never echo internals to the client
            other if kind.is_server_error() => {
                AppError::new(kind, kind.as_str()).with_code(code).with_source(other)
            }
            other => AppError::new(kind, other.to_string()).with_code(code),
        }
    }
}

impl IntoResponse for RewardsError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}
