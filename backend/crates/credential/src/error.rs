//! Credential Error Types
//!
//! Domain-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use crate::domain::value_objects::FailureClass;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use std::time::Duration;
use thiserror::Error;

/// Credential-specific result type alias
pub type CredentialResult<T> = Result<T, CredentialError>;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// No identity is eligible (all cooling down, at their usage cap, or
    /// already tried). Not a per-identity failure.
    #[error("No identity available, try again later")]
    PoolExhausted { last_error: Option<String> },

    /// Every attempt failed with a retryable platform failure
    #[error("Platform request failed after {attempts} attempts: {message}")]
    Platform {
        class: FailureClass,
        message: String,
        attempts: u32,
    },

    /// Malformed or permanently invalid target reference
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Inbound caller is over its own quota
    #[error("Request quota exceeded")]
    QuotaExceeded { retry_after_ms: i64 },

    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Task not found")]
    TaskNotFound,

    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    /// Identity file name or contents rejected
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Identity file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CredentialError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CredentialError::PoolExhausted { .. }
            | CredentialError::StoreUnavailable(_)
            | CredentialError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            CredentialError::Platform { .. } => StatusCode::BAD_GATEWAY,
            CredentialError::InvalidTarget(_) | CredentialError::InvalidIdentity(_) => {
                StatusCode::BAD_REQUEST
            }
            CredentialError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            CredentialError::TaskNotFound | CredentialError::IdentityNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            CredentialError::Unauthorized => StatusCode::UNAUTHORIZED,
            CredentialError::Io(_) | CredentialError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CredentialError::PoolExhausted { .. }
            | CredentialError::StoreUnavailable(_)
            | CredentialError::Database(_) => ErrorKind::ServiceUnavailable,
            CredentialError::Platform { .. } => ErrorKind::BadGateway,
            CredentialError::InvalidTarget(_) | CredentialError::InvalidIdentity(_) => {
                ErrorKind::BadRequest
            }
            CredentialError::QuotaExceeded { .. } => ErrorKind::TooManyRequests,
            CredentialError::TaskNotFound | CredentialError::IdentityNotFound(_) => {
                ErrorKind::NotFound
            }
            CredentialError::Unauthorized => ErrorKind::Unauthorized,
            CredentialError::Io(_) | CredentialError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Stable machine-readable code, stored on failed tasks
    pub fn code(&self) -> &'static str {
        match self {
            CredentialError::PoolExhausted { .. } => "pool_exhausted",
            CredentialError::Platform { .. } => "platform_error",
            CredentialError::InvalidTarget(_) => "invalid_target",
            CredentialError::QuotaExceeded { .. } => "quota_exceeded",
            CredentialError::StoreUnavailable(_) | CredentialError::Database(_) => {
                "store_unavailable"
            }
            CredentialError::TaskNotFound => "task_not_found",
            CredentialError::IdentityNotFound(_) => "identity_not_found",
            CredentialError::InvalidIdentity(_) => "invalid_identity",
            CredentialError::Unauthorized => "unauthorized",
            CredentialError::Io(_) | CredentialError::Internal(_) => "internal",
        }
    }

    /// Message safe to show to callers; infrastructure details stay in the logs
    pub fn public_message(&self) -> String {
        match self {
            CredentialError::StoreUnavailable(_) | CredentialError::Database(_) => {
                "Credential store unavailable".to_string()
            }
            CredentialError::Io(_) | CredentialError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            CredentialError::Database(e) => {
                tracing::error!(error = %e, "Credential database error");
            }
            CredentialError::StoreUnavailable(msg) => {
                tracing::error!(message = %msg, "Credential store unavailable");
            }
            CredentialError::Io(e) => {
                tracing::error!(error = %e, "Identity file error");
            }
            CredentialError::Internal(msg) => {
                tracing::error!(message = %msg, "Credential internal error");
            }
            CredentialError::PoolExhausted { last_error } => {
                tracing::warn!(last_error = ?last_error, "Identity pool exhausted");
            }
            CredentialError::QuotaExceeded { retry_after_ms } => {
                tracing::warn!(retry_after_ms, "Client quota exceeded");
            }
            CredentialError::Unauthorized => {
                tracing::warn!("Unauthorized admin request");
            }
            _ => {
                tracing::debug!(error = %self, "Credential error");
            }
        }
    }
}

impl From<platform::rate_limit::RateLimitError> for CredentialError {
    fn from(err: platform::rate_limit::RateLimitError) -> Self {
        CredentialError::StoreUnavailable(err.to_string())
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        let kind = err.kind();
        let message = err.public_message();
        let app_err = AppError::new(kind, message);
        match err {
            CredentialError::QuotaExceeded { retry_after_ms } => {
                let secs = u64::try_from(retry_after_ms).unwrap_or(0).div_ceil(1000);
                app_err.with_retry_after(Duration::from_secs(secs.max(1)))
            }
            CredentialError::Database(e) => app_err.with_source(e),
            CredentialError::Io(e) => app_err.with_source(e),
            _ => app_err,
        }
    }
}

impl IntoResponse for CredentialError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_kind_agree() {
        let errors = [
            CredentialError::PoolExhausted { last_error: None },
            CredentialError::Platform {
                class: FailureClass::Transient,
                message: "boom".into(),
                attempts: 5,
            },
            CredentialError::InvalidTarget("x".into()),
            CredentialError::QuotaExceeded { retry_after_ms: 1 },
            CredentialError::StoreUnavailable("down".into()),
            CredentialError::TaskNotFound,
            CredentialError::IdentityNotFound("a".into()),
            CredentialError::Unauthorized,
            CredentialError::Internal("bug".into()),
        ];
        for err in errors {
            assert_eq!(err.status_code().as_u16(), err.kind().status_code());
        }
    }

    #[test]
    fn test_public_message_hides_infrastructure_details() {
        let err = CredentialError::StoreUnavailable("connection refused 10.0.0.5:5432".into());
        assert_eq!(err.public_message(), "Credential store unavailable");

        let err = CredentialError::Platform {
            class: FailureClass::RateLimited,
            message: "Please wait a few minutes".into(),
            attempts: 3,
        };
        assert!(err.public_message().contains("Please wait"));
    }

    #[test]
    fn test_quota_exceeded_sets_retry_after() {
        let app: AppError = CredentialError::QuotaExceeded {
            retry_after_ms: 1_500,
        }
        .into();
        assert_eq!(app.status_code(), 429);
        assert_eq!(app.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_pool_exhausted_is_distinct_from_platform_failure() {
        let exhausted = CredentialError::PoolExhausted {
            last_error: Some("challenge_required".into()),
        };
        assert_eq!(exhausted.code(), "pool_exhausted");
        assert_eq!(exhausted.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
