//! Identity Error Types
//!
//! Store-layer failures are typed so handlers can pick a user-facing status.
//! Anything unexpected renders as an opaque 500 and is logged in full.

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::crypto::EntropyError;
use thiserror::Error;

pub type IdentityResult<T> = Result<T, IdentityError>;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid credentials";
pub const INVALID_AUTHENTICATION_TOKEN_MESSAGE: &str = "invalid or expired authentication token";
pub const AUTHENTICATION_REQUIRED_MESSAGE: &str =
    "you must be authenticated to access this resource";
pub const RATE_LIMIT_EXCEEDED_MESSAGE: &str = "rate limit exceeded";
const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

#[derive(Debug, Error)]
pub enum IdentityError {
    /// No matching row
    #[error("record not found")]
    NotFound,

    /// Row exists but is past its expiry
    #[error("token expired")]
    Expired,

    /// No such user, or wrong password. Deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("a user with this email address already exists")]
    DuplicateEmail,

    /// Optimistic concurrency miss
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("token generation failed: {0}")]
    GenerationFailure(#[from] EntropyError),

    #[error("invalid or expired authentication token")]
    InvalidAuthenticationToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid verification token")]
    VerificationTokenInvalid,

    #[error("{0}")]
    VerificationTokenExpired(&'static str),

    /// Request rejected before reaching a use case, e.g. an unreadable body
    #[error("{0}")]
    Rejected(AppError),

    #[error("store call exceeded {0:?}")]
    StoreTimeout(std::time::Duration),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        IdentityError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::NotFound => ErrorKind::NotFound,
            IdentityError::Expired
            | IdentityError::InvalidCredentials
            | IdentityError::InvalidAuthenticationToken
            | IdentityError::AuthenticationRequired
            | IdentityError::VerificationTokenInvalid
            | IdentityError::VerificationTokenExpired(_) => ErrorKind::Unauthorized,
            IdentityError::DuplicateEmail | IdentityError::EditConflict => ErrorKind::Conflict,
            IdentityError::Validation { .. } => ErrorKind::UnprocessableEntity,
            IdentityError::RateLimitExceeded => ErrorKind::TooManyRequests,
            IdentityError::Rejected(e) => e.kind(),
            IdentityError::GenerationFailure(_)
            | IdentityError::StoreTimeout(_)
            | IdentityError::Database(_)
            | IdentityError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Client-facing view. Server errors never expose their cause.
    pub fn to_app_error(&self) -> AppError {
        let kind = self.kind();
        if kind.is_server_error() {
            return AppError::new(kind, SERVER_ERROR_MESSAGE);
        }
        let app_error = match self {
            IdentityError::Rejected(e) => AppError::new(kind, e.message().to_owned()),
            _ => AppError::new(kind, self.to_string()),
        };
        match self {
            IdentityError::VerificationTokenExpired(_) => {
                app_error.with_action("Request a new verification email")
            }
            IdentityError::EditConflict => app_error.with_action("Reload and try again"),
            _ => app_error,
        }
    }

    fn log(&self) {
        match self {
            IdentityError::Database(e) => {
                tracing::error!(error = %e, "Identity database error");
            }
            IdentityError::GenerationFailure(e) => {
                tracing::error!(error = %e, "Token generation failed");
            }
            IdentityError::StoreTimeout(limit) => {
                tracing::error!(timeout = ?limit, "Identity store call timed out");
            }
            IdentityError::Internal(msg) => {
                tracing::error!(message = %msg, "Identity internal error");
            }
            IdentityError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            IdentityError::InvalidAuthenticationToken => {
                tracing::warn!("Invalid authentication token presented");
            }
            IdentityError::RateLimitExceeded => {
                tracing::warn!("Rate limit exceeded");
            }
            _ => {
                tracing::debug!(error = %self, "Identity error");
            }
        }
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        self.log();
        let mut response = self.to_app_error().into_response();
        if matches!(self, IdentityError::InvalidAuthenticationToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<AppError> for IdentityError {
    fn from(err: AppError) -> Self {
        IdentityError::Rejected(err)
    }
}

impl From<JsonRejection> for IdentityError {
    fn from(rejection: JsonRejection) -> Self {
        IdentityError::Rejected(AppError::from(rejection))
    }
}

impl From<tokio::task::JoinError> for IdentityError {
    fn from(err: tokio::task::JoinError) -> Self {
        IdentityError::Internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_kinds() {
        assert_eq!(IdentityError::InvalidCredentials.kind(), ErrorKind::Unauthorized);
        assert_eq!(IdentityError::EditConflict.kind(), ErrorKind::Conflict);
        assert_eq!(
            IdentityError::validation("email", "must be provided").kind(),
            ErrorKind::UnprocessableEntity
        );
        assert_eq!(IdentityError::RateLimitExceeded.kind(), ErrorKind::TooManyRequests);
        assert_eq!(
            IdentityError::StoreTimeout(std::time::Duration::from_secs(3)).kind(),
            ErrorKind::InternalServerError
        );
    }

    #[test]
    fn test_server_errors_are_opaque() {
        let err = IdentityError::Internal("connection string leaked here".to_string());
        let app_err = err.to_app_error();
        assert_eq!(app_err.status_code(), 500);
        assert!(!app_err.message().contains("leaked"));
    }

    #[test]
    fn test_client_messages() {
        assert_eq!(
            IdentityError::InvalidCredentials.to_app_error().message(),
            INVALID_CREDENTIALS_MESSAGE
        );
        assert_eq!(
            IdentityError::AuthenticationRequired.to_app_error().message(),
            AUTHENTICATION_REQUIRED_MESSAGE
        );
        assert_eq!(
            IdentityError::VerificationTokenExpired("Expired token. Please signup again.")
                .to_app_error()
                .message(),
            "Expired token. Please signup again."
        );
    }

    #[test]
    fn test_rejection_keeps_client_detail() {
        let err = IdentityError::from(AppError::bad_request("body must not be empty"));
        let app_err = err.to_app_error();
        assert_eq!(app_err.status_code(), 400);
        assert_eq!(app_err.message(), "body must not be empty");
    }

    #[test]
    fn test_invalid_token_sets_www_authenticate() {
        let response = IdentityError::InvalidAuthenticationToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let response = IdentityError::AuthenticationRequired.into_response();
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
